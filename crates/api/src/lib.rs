//! HTTP API layer for prompthub.
//!
//! This crate provides the JSON API and the sitemap:
//!
//! - **Endpoints**: prompts, favorites, categories, tags, moderation, accounts, uploads
//! - **Extractors**: Session users and admin gating
//! - **Middleware**: Session resolution from bearer token or cookie
//! - **HTTP cache**: `ETag`/`Cache-Control` headers and conditional requests
//!
//! Built on Axum 0.8 with Tower middleware stack.

pub mod endpoints;
pub mod extractors;
pub mod http_cache;
pub mod middleware;
pub mod response;

use axum::Router;

pub use endpoints::router;
pub use middleware::AppState;

/// Router with session resolution applied and state attached.
///
/// Outer layers (tracing, CORS, static files) are added by the binary.
pub fn app(state: AppState) -> Router {
    router()
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::auth_middleware,
        ))
        .with_state(state)
}
