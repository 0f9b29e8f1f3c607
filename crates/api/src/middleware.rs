//! API middleware.

#![allow(missing_docs)]

use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{HeaderMap, Request, header},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::CookieJar;
use prompthub_common::{Config, ReadThroughCache, StorageService};
use prompthub_core::{
    FavoriteService, MediaConfig, MediaService, ModerationService, PromptService, SitemapService,
    StatsService, TaxonomyService, UserService,
};
use prompthub_db::repositories::{
    CategoryRepository, FavoriteRepository, ProfileRepository, PromptRepository, ReviewRepository,
    StatsRepository, TagRepository, UserRepository,
};
use sea_orm::DatabaseConnection;

/// Name of the session cookie.
pub const SESSION_COOKIE: &str = "session";

/// Application state.
#[derive(Clone)]
pub struct AppState {
    pub prompt_service: PromptService,
    pub favorite_service: FavoriteService,
    pub taxonomy_service: TaxonomyService,
    pub moderation_service: ModerationService,
    pub user_service: UserService,
    pub stats_service: StatsService,
    pub media_service: MediaService,
    pub sitemap_service: SitemapService,
    pub cache: ReadThroughCache,
    pub db: Arc<DatabaseConnection>,
}

impl AppState {
    /// Build repositories and services over one connection pool.
    #[must_use]
    pub fn new(
        db: Arc<DatabaseConnection>,
        cache: ReadThroughCache,
        storage: StorageService,
        config: &Config,
    ) -> Self {
        let user_repo = UserRepository::new(Arc::clone(&db));
        let profile_repo = ProfileRepository::new(Arc::clone(&db));
        let prompt_repo = PromptRepository::new(Arc::clone(&db));
        let category_repo = CategoryRepository::new(Arc::clone(&db));
        let tag_repo = TagRepository::new(Arc::clone(&db));
        let favorite_repo = FavoriteRepository::new(Arc::clone(&db));
        let review_repo = ReviewRepository::new(Arc::clone(&db));
        let stats_repo = StatsRepository::new(Arc::clone(&db));

        let prompt_service = PromptService::new(
            prompt_repo.clone(),
            tag_repo.clone(),
            category_repo.clone(),
            profile_repo.clone(),
        );
        let favorite_service = FavoriteService::new(
            favorite_repo.clone(),
            prompt_repo.clone(),
            prompt_service.clone(),
        );
        let taxonomy_service = TaxonomyService::new(category_repo.clone(), tag_repo);
        let moderation_service = ModerationService::new(prompt_repo.clone(), review_repo);
        let user_service =
            UserService::new(user_repo, profile_repo, prompt_repo.clone(), favorite_repo);
        let stats_service = StatsService::new(stats_repo);
        let media_service = MediaService::new(storage, MediaConfig::default());
        let sitemap_service = SitemapService::new(category_repo, prompt_repo, &config.server.url);

        Self {
            prompt_service,
            favorite_service,
            taxonomy_service,
            moderation_service,
            user_service,
            stats_service,
            media_service,
            sitemap_service,
            cache,
            db,
        }
    }
}

/// Session token from `Authorization: Bearer` or the session cookie.
///
/// The header wins when both are present.
#[must_use]
pub fn session_token(headers: &HeaderMap) -> Option<String> {
    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty());
    if let Some(token) = bearer {
        return Some(token.to_string());
    }

    CookieJar::from_headers(headers)
        .get(SESSION_COOKIE)
        .map(|cookie| cookie.value().trim().to_string())
        .filter(|token| !token.is_empty())
}

/// Authentication middleware.
///
/// Resolves the session once per request and stores the user in the request
/// extensions. Unknown tokens are treated as anonymous.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    if let Some(token) = session_token(req.headers()) {
        match state.user_service.authenticate_by_token(&token).await {
            Ok(user) => {
                req.extensions_mut().insert(user);
            }
            Err(e) if e.is_server_error() => {
                tracing::warn!(error = %e, "Session lookup failed");
            }
            Err(_) => tracing::debug!("Ignoring unknown session token"),
        }
    }

    next.run(req).await
}
