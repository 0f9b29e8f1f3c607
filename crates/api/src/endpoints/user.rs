//! Endpoints for the signed-in user.

use axum::{
    Json, Router,
    extract::{Query, State},
    http::HeaderMap,
    response::{IntoResponse, Response},
    routing::{get, put},
};
use prompthub_common::{AppResult, QueryFingerprint};
use prompthub_core::{ChangePasswordInput, Pagination, ProfileView, PromptPage, UpdateProfileInput};
use serde::Deserialize;

use crate::{
    extractors::AuthUser,
    http_cache::{CacheSpec, serve_cached},
    middleware::AppState,
    response::no_content,
};

#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<u64>,
    pub limit: Option<u64>,
}

impl PageQuery {
    fn pagination(&self) -> Pagination {
        Pagination::new(self.page, self.limit)
    }
}

async fn get_profile(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> AppResult<Json<ProfileView>> {
    Ok(Json(state.user_service.get_profile(&user).await?))
}

async fn update_profile(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(input): Json<UpdateProfileInput>,
) -> AppResult<Json<ProfileView>> {
    Ok(Json(state.user_service.update_profile(&user, input).await?))
}

async fn change_password(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(input): Json<ChangePasswordInput>,
) -> AppResult<impl IntoResponse> {
    state.user_service.change_password(user, input).await?;
    Ok(no_content())
}

/// Dashboard counters, cached per user.
async fn stats(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    headers: HeaderMap,
) -> AppResult<Response> {
    let fingerprint = QueryFingerprint::new("user:stats").param("user", Some(&user.id));
    let key = format!("user:{}:stats", user.id);
    serve_cached(
        &state.cache,
        &headers,
        &fingerprint,
        &key,
        CacheSpec::USER_STATS,
        || state.user_service.stats(&user.id),
    )
    .await
}

/// The caller's prompts in any moderation state.
async fn prompts(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Query(query): Query<PageQuery>,
) -> AppResult<Json<PromptPage>> {
    let page = state
        .prompt_service
        .list_by_author(&user.id, query.pagination())
        .await?;
    Ok(Json(page))
}

async fn favorites(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Query(query): Query<PageQuery>,
) -> AppResult<Json<PromptPage>> {
    let page = state
        .favorite_service
        .list_for_user(&user.id, query.pagination())
        .await?;
    Ok(Json(page))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/profile", get(get_profile).put(update_profile))
        .route("/password", put(change_password))
        .route("/stats", get(stats))
        .route("/prompts", get(prompts))
        .route("/favorites", get(favorites))
}
