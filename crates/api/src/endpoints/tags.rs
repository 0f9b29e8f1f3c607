//! Tag endpoints.

use axum::{
    Json, Router,
    extract::{Query, State},
    http::HeaderMap,
    response::Response,
    routing::get,
};
use prompthub_common::{AppResult, QueryFingerprint};
use prompthub_db::entities::tag;
use serde::Deserialize;

use crate::{
    extractors::AuthUser,
    http_cache::{CacheSpec, serve_cached},
    middleware::AppState,
};

const DEFAULT_TAG_LIMIT: u64 = 20;
const MAX_TAG_LIMIT: u64 = 100;

/// Tag listing query: popular tags, or a prefix search when `q` is set.
#[derive(Debug, Default, Deserialize)]
pub struct TagQuery {
    pub q: Option<String>,
    pub limit: Option<u64>,
}

impl TagQuery {
    fn limit(&self) -> u64 {
        self.limit.unwrap_or(DEFAULT_TAG_LIMIT).clamp(1, MAX_TAG_LIMIT)
    }

    fn prefix(&self) -> String {
        self.q.as_deref().unwrap_or_default().trim().to_lowercase()
    }

    fn fingerprint(&self) -> QueryFingerprint {
        QueryFingerprint::new("tags")
            .param("q", Some(self.prefix()))
            .param("limit", Some(self.limit()))
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateTagInput {
    pub name: String,
}

async fn list(
    State(state): State<AppState>,
    Query(query): Query<TagQuery>,
    headers: HeaderMap,
) -> AppResult<Response> {
    let fingerprint = query.fingerprint();
    let key = fingerprint.cache_key();
    let prefix = query.prefix();
    serve_cached(
        &state.cache,
        &headers,
        &fingerprint,
        &key,
        CacheSpec::TAGS,
        || state.taxonomy_service.search_tags(&prefix, query.limit()),
    )
    .await
}

/// Find a tag by name, creating it if needed.
async fn create(
    State(state): State<AppState>,
    AuthUser(_user): AuthUser,
    Json(input): Json<CreateTagInput>,
) -> AppResult<Json<tag::Model>> {
    let tag = state.taxonomy_service.get_or_create_tag(&input.name).await?;
    Ok(Json(tag))
}

pub fn router() -> Router<AppState> {
    Router::new().route("/", get(list).post(create))
}
