//! API endpoints.

mod admin;
mod auth;
mod categories;
mod meta;
mod prompts;
mod sitemap;
mod tags;
mod upload;
mod user;

use axum::{Router, routing::get};

use crate::middleware::AppState;

pub use prompts::prompt_cache_key;

/// Create the application router: the JSON API under `/api` plus the sitemap.
pub fn router() -> Router<AppState> {
    Router::new()
        .nest("/api", api_router())
        .route("/sitemap.xml", get(sitemap::sitemap))
}

fn api_router() -> Router<AppState> {
    Router::new()
        .merge(meta::router())
        .merge(upload::router())
        .nest("/prompts", prompts::router())
        .nest("/categories", categories::router())
        .nest("/tags", tags::router())
        .nest("/admin", admin::router())
        .nest("/auth", auth::router())
        .nest("/user", user::router())
}
