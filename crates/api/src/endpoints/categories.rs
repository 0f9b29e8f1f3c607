//! Category endpoints.

use axum::{
    Json, Router,
    extract::{Path, State},
    http::HeaderMap,
    response::{IntoResponse, Response},
    routing::{get, put},
};
use prompthub_common::{AppResult, QueryFingerprint};
use prompthub_core::{CreateCategoryInput, UpdateCategoryInput};
use prompthub_db::entities::category;

use crate::{
    extractors::AdminUser,
    http_cache::{CacheSpec, serve_cached},
    middleware::AppState,
    response::{created, no_content},
};

/// List all categories. Admin edits show up once the cached list expires.
async fn list(State(state): State<AppState>, headers: HeaderMap) -> AppResult<Response> {
    let fingerprint = QueryFingerprint::new("categories");
    let key = fingerprint.cache_key();
    serve_cached(
        &state.cache,
        &headers,
        &fingerprint,
        &key,
        CacheSpec::CATEGORIES,
        || state.taxonomy_service.list_categories(),
    )
    .await
}

async fn create(
    State(state): State<AppState>,
    AdminUser(_admin): AdminUser,
    Json(input): Json<CreateCategoryInput>,
) -> AppResult<Response> {
    let category = state.taxonomy_service.create_category(input).await?;
    Ok(created(category))
}

async fn update(
    State(state): State<AppState>,
    AdminUser(_admin): AdminUser,
    Path(id): Path<String>,
    Json(input): Json<UpdateCategoryInput>,
) -> AppResult<Json<category::Model>> {
    let category = state.taxonomy_service.update_category(&id, input).await?;
    Ok(Json(category))
}

async fn delete(
    State(state): State<AppState>,
    AdminUser(_admin): AdminUser,
    Path(id): Path<String>,
) -> AppResult<impl IntoResponse> {
    state.taxonomy_service.delete_category(&id).await?;
    Ok(no_content())
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list).post(create))
        .route("/{id}", put(update).delete(delete))
}
