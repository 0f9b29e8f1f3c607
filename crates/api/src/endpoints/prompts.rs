//! Prompt endpoints.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::HeaderMap,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use prompthub_common::{AppError, AppResult, QueryFingerprint};
use prompthub_core::{
    CreatePromptInput, FavoriteToggle, PromptQuery, PromptView, UpdatePromptInput, ensure_visible,
};
use prompthub_db::entities::prompt::PromptStatus;
use serde::Serialize;

use crate::{
    extractors::{AuthUser, MaybeAuthUser},
    http_cache::{CacheSpec, Conditional, serve_cached},
    middleware::AppState,
    response::{created, no_content},
};

/// Cache key of a single prompt.
#[must_use]
pub fn prompt_cache_key(id: &str) -> String {
    format!("prompt:{id}")
}

/// Favorite status for the caller.
#[derive(Debug, Serialize)]
pub struct FavoriteStatus {
    pub favorited: bool,
}

/// List published public prompts.
async fn list(
    State(state): State<AppState>,
    Query(query): Query<PromptQuery>,
    headers: HeaderMap,
) -> AppResult<Response> {
    let fingerprint = query.fingerprint("prompts:list");
    let key = fingerprint.cache_key();
    serve_cached(
        &state.cache,
        &headers,
        &fingerprint,
        &key,
        CacheSpec::PROMPT_LIST,
        || state.prompt_service.list_public(&query),
    )
    .await
}

/// Free-text search.
async fn search(
    State(state): State<AppState>,
    Query(query): Query<PromptQuery>,
    headers: HeaderMap,
) -> AppResult<Response> {
    if query.q.as_deref().is_none_or(|q| q.trim().is_empty()) {
        return Err(AppError::BadRequest("Missing search query `q`".to_string()));
    }

    let fingerprint = query.fingerprint("prompts:search");
    let key = fingerprint.cache_key();
    serve_cached(
        &state.cache,
        &headers,
        &fingerprint,
        &key,
        CacheSpec::PROMPT_SEARCH,
        || state.prompt_service.search(&query),
    )
    .await
}

/// Create a prompt. It starts in review.
async fn create(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(input): Json<CreatePromptInput>,
) -> AppResult<Response> {
    state.user_service.ensure_profile(&user).await?;
    let prompt = state.prompt_service.create(&user, input).await?;
    Ok(created(prompt))
}

/// Prompt detail.
///
/// The cached copy is shared by all viewers, so visibility is checked after
/// the cache lookup. Prompts that are not publicly visible get per-user
/// headers.
async fn show(
    State(state): State<AppState>,
    MaybeAuthUser(viewer): MaybeAuthUser,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> AppResult<Response> {
    let spec = CacheSpec::PROMPT_DETAIL;
    let cached = state
        .cache
        .get_or_fetch(&prompt_cache_key(&id), spec.ttl_secs, || {
            state.prompt_service.get(&id)
        })
        .await?;
    ensure_visible(&cached.value, viewer.as_ref())?;

    let fingerprint = QueryFingerprint::new("prompt").param("id", Some(&id));
    let mut conditional = Conditional::new(&fingerprint, spec);
    if !is_publicly_visible(&cached.value) {
        conditional = conditional.into_private();
    }

    if conditional.matches(&headers) {
        return Ok(conditional.not_modified());
    }
    Ok(conditional.respond(cached))
}

fn is_publicly_visible(view: &PromptView) -> bool {
    view.is_public && view.status == PromptStatus::Published
}

/// Update a prompt.
async fn update(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
    Json(input): Json<UpdatePromptInput>,
) -> AppResult<Json<PromptView>> {
    let prompt = state.prompt_service.update(&id, &user, input).await?;
    state.cache.invalidate(&prompt_cache_key(&id)).await;
    Ok(Json(prompt))
}

/// Delete a prompt.
async fn delete(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
) -> AppResult<impl IntoResponse> {
    state.prompt_service.delete(&id, &user).await?;
    state.cache.invalidate(&prompt_cache_key(&id)).await;
    Ok(no_content())
}

/// Count a view.
async fn record_view(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<impl IntoResponse> {
    state.prompt_service.record_view(&id).await?;
    Ok(no_content())
}

/// Whether the caller has favorited the prompt. Anonymous callers never have.
async fn favorite_status(
    State(state): State<AppState>,
    MaybeAuthUser(user): MaybeAuthUser,
    Path(id): Path<String>,
) -> AppResult<Json<FavoriteStatus>> {
    let favorited = match user {
        Some(user) => state.favorite_service.is_favorited(&user.id, &id).await?,
        None => false,
    };
    Ok(Json(FavoriteStatus { favorited }))
}

/// Toggle the caller's favorite.
async fn toggle_favorite(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
) -> AppResult<Json<FavoriteToggle>> {
    state.user_service.ensure_profile(&user).await?;
    let toggle = state.favorite_service.toggle(&user.id, &id).await?;
    state.cache.invalidate(&prompt_cache_key(&id)).await;
    Ok(Json(toggle))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list).post(create))
        .route("/search", get(search))
        .route("/{id}", get(show).put(update).delete(delete))
        .route("/{id}/view", post(record_view))
        .route("/{id}/favorite", get(favorite_status).post(toggle_favorite))
}
