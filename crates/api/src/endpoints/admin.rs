//! Admin endpoints: moderation queue, reviews and site statistics.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::HeaderMap,
    response::Response,
    routing::{get, post},
};
use prompthub_common::{AppError, AppResult, QueryFingerprint};
use prompthub_core::{Pagination, PromptPage, ReviewInput};
use prompthub_db::entities::{prompt::PromptStatus, review};
use serde::Deserialize;

use super::prompt_cache_key;
use crate::{
    extractors::AdminUser,
    http_cache::{CacheSpec, serve_cached},
    middleware::AppState,
};

/// Moderation queue query.
#[derive(Debug, Default, Deserialize)]
pub struct AdminPromptQuery {
    pub status: Option<String>,
    pub page: Option<u64>,
    pub limit: Option<u64>,
}

impl AdminPromptQuery {
    fn status(&self) -> AppResult<Option<PromptStatus>> {
        match self.status.as_deref().map(str::trim) {
            None | Some("") => Ok(None),
            Some(value) => PromptStatus::parse(value)
                .map(Some)
                .ok_or_else(|| AppError::BadRequest(format!("Unknown status: {value}"))),
        }
    }
}

/// Prompts by moderation state.
async fn list_prompts(
    AdminUser(_admin): AdminUser,
    State(state): State<AppState>,
    Query(query): Query<AdminPromptQuery>,
) -> AppResult<Json<PromptPage>> {
    let status = query.status()?;
    let pagination = Pagination::new(query.page, query.limit);
    let page = state
        .prompt_service
        .list_by_status(status, pagination)
        .await?;
    Ok(Json(page))
}

/// Publish or reject a prompt.
async fn review_prompt(
    AdminUser(admin): AdminUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(input): Json<ReviewInput>,
) -> AppResult<Json<review::Model>> {
    let review = state.moderation_service.review(&id, &admin, input).await?;
    state.cache.invalidate(&prompt_cache_key(&id)).await;
    Ok(Json(review))
}

async fn list_reviews(
    AdminUser(_admin): AdminUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<Vec<review::Model>>> {
    Ok(Json(state.moderation_service.reviews_for(&id).await?))
}

/// Site-wide counters.
async fn stats(
    AdminUser(_admin): AdminUser,
    State(state): State<AppState>,
    headers: HeaderMap,
) -> AppResult<Response> {
    let fingerprint = QueryFingerprint::new("stats:admin");
    serve_cached(
        &state.cache,
        &headers,
        &fingerprint,
        "stats:admin",
        CacheSpec::ADMIN_STATS,
        || state.stats_service.admin_stats(),
    )
    .await
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/prompts", get(list_prompts))
        .route("/prompts/{id}/review", post(review_prompt))
        .route("/prompts/{id}/reviews", get(list_reviews))
        .route("/stats", get(stats))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_filter() {
        let query = |status: Option<&str>| AdminPromptQuery {
            status: status.map(str::to_string),
            ..AdminPromptQuery::default()
        };

        assert_eq!(query(None).status().unwrap(), None);
        assert_eq!(query(Some("")).status().unwrap(), None);
        assert_eq!(
            query(Some("Reviewing")).status().unwrap(),
            Some(PromptStatus::Reviewing)
        );
        assert!(matches!(
            query(Some("draft")).status(),
            Err(AppError::BadRequest(_))
        ));
    }
}
