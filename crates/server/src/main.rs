//! prompthub server entry point.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use fred::interfaces::ClientLike;
use prompthub_api::{AppState, app};
use prompthub_common::{
    CacheStore, Config, MemoryCacheStore, ReadThroughCache, RedisCacheStore, StorageConfig,
    build_storage,
};
use tokio::signal;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use url::Url;

/// Key prefix when running without Redis.
const LOCAL_CACHE_PREFIX: &str = "prompthub";

/// Waits for a shutdown signal (SIGINT or SIGTERM).
///
/// On Unix systems, this listens for both SIGINT (Ctrl+C) and SIGTERM.
/// On Windows, this only listens for Ctrl+C.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received SIGINT, initiating graceful shutdown...");
        },
        () = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown...");
        },
    }
}

/// Connect the cache backend: Redis when configured, in-process otherwise.
async fn connect_cache(
    config: &Config,
) -> Result<ReadThroughCache, Box<dyn std::error::Error>> {
    let Some(redis) = &config.redis else {
        warn!("No Redis configured, using in-process cache");
        let store: Arc<dyn CacheStore> = Arc::new(MemoryCacheStore::new());
        return Ok(ReadThroughCache::new(store, LOCAL_CACHE_PREFIX));
    };

    info!("Connecting to Redis...");
    let fred_config = fred::types::config::Config::from_url(&redis.url)?;
    let client = fred::clients::Client::new(fred_config, None, None, None);
    client.connect();
    client.wait_for_connect().await?;
    info!("Connected to Redis");

    let store: Arc<dyn CacheStore> = Arc::new(RedisCacheStore::new(Arc::new(client)));
    Ok(ReadThroughCache::new(store, redis.prefix.clone()))
}

/// URL path and directory to serve uploads from, for local storage.
fn local_files_route(storage: &StorageConfig) -> Option<(String, PathBuf)> {
    let StorageConfig::Local {
        base_path,
        base_url,
    } = storage
    else {
        return None;
    };

    let path = if base_url.starts_with('/') {
        base_url.clone()
    } else {
        Url::parse(base_url).ok()?.path().to_string()
    };
    let path = path.trim_end_matches('/');
    if path.is_empty() {
        return None;
    }
    Some((path.to_string(), base_path.clone()))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "prompthub=debug,tower_http=debug".into()),
        )
        .init();

    info!("Starting prompthub server...");

    // Load configuration
    let config = Config::load()?;

    let db = prompthub_db::init(&config).await?;
    info!("Connected to database");

    info!("Running database migrations...");
    prompthub_db::migrate(&db).await?;
    info!("Migrations completed");

    let cache = connect_cache(&config).await?;
    let storage = build_storage(&config.storage).await?;

    let state = AppState::new(Arc::new(db), cache, storage, &config);

    let mut router = app(state);
    if let Some((path, dir)) = local_files_route(&config.storage) {
        info!(path = %path, dir = %dir.display(), "Serving local uploads");
        router = router.nest_service(&path, ServeDir::new(dir));
    }

    let router = router
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        );

    // Start server with graceful shutdown
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn local(base_url: &str) -> StorageConfig {
        StorageConfig::Local {
            base_path: PathBuf::from("./files"),
            base_url: base_url.to_string(),
        }
    }

    #[test]
    fn test_local_files_route() {
        assert_eq!(
            local_files_route(&local("/files")),
            Some(("/files".to_string(), PathBuf::from("./files")))
        );
        assert_eq!(
            local_files_route(&local("https://cdn.example.com/uploads/")).map(|(p, _)| p),
            Some("/uploads".to_string())
        );
        assert_eq!(local_files_route(&local("https://cdn.example.com")), None);
    }
}
