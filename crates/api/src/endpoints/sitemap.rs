//! Sitemap endpoint.

use axum::{
    extract::State,
    http::{HeaderValue, header},
    response::Response,
};
use prompthub_common::AppResult;

use crate::{middleware::AppState, response::xml};

const SITEMAP_CACHE_CONTROL: &str = "public, max-age=3600";

/// `GET /sitemap.xml`
pub async fn sitemap(State(state): State<AppState>) -> AppResult<Response> {
    let body = state.sitemap_service.render().await?;
    let mut response = xml(body);
    response.headers_mut().insert(
        header::CACHE_CONTROL,
        HeaderValue::from_static(SITEMAP_CACHE_CONTROL),
    );
    Ok(response)
}
