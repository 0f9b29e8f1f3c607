//! HTTP caching: response headers, conditional requests and the read-through
//! cache glue used by the cached GET endpoints.

use std::future::Future;

use axum::{
    Json,
    http::{HeaderMap, HeaderName, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};
use prompthub_common::{AppResult, CacheBucket, Cached, QueryFingerprint, ReadThroughCache};
use serde::{Serialize, de::DeserializeOwned};

/// `CDN-Cache-Control` header name.
pub static CDN_CACHE_CONTROL: HeaderName = HeaderName::from_static("cdn-cache-control");

/// `X-Cache` header name.
pub static X_CACHE: HeaderName = HeaderName::from_static("x-cache");

/// Caching parameters of one endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheSpec {
    /// ETag time bucket.
    pub bucket: CacheBucket,
    /// Store TTL and shared-cache lifetime in seconds.
    pub ttl_secs: u64,
    /// Responses are per-user and must not be stored by shared caches.
    pub private: bool,
}

impl CacheSpec {
    pub const PROMPT_LIST: Self = Self::public(CacheBucket::LIST, 60);
    pub const PROMPT_SEARCH: Self = Self::public(CacheBucket::SEARCH, 30);
    pub const PROMPT_DETAIL: Self = Self::public(CacheBucket::RESOURCE, 300);
    pub const CATEGORIES: Self = Self::public(CacheBucket::RESOURCE, 1800);
    pub const TAGS: Self = Self::public(CacheBucket::RESOURCE, 600);
    pub const ADMIN_STATS: Self = Self::private(CacheBucket::RESOURCE, 60);
    pub const USER_STATS: Self = Self::private(CacheBucket::RESOURCE, 60);

    #[must_use]
    pub const fn public(bucket: CacheBucket, ttl_secs: u64) -> Self {
        Self {
            bucket,
            ttl_secs,
            private: false,
        }
    }

    #[must_use]
    pub const fn private(bucket: CacheBucket, ttl_secs: u64) -> Self {
        Self {
            bucket,
            ttl_secs,
            private: true,
        }
    }

    /// Same timing, but per-user.
    #[must_use]
    pub const fn as_private(self) -> Self {
        Self::private(self.bucket, self.ttl_secs)
    }

    fn cache_control(self) -> String {
        if self.private {
            format!("private, max-age={}", self.ttl_secs)
        } else {
            format!(
                "public, max-age={}, s-maxage={}",
                self.bucket.duration().as_secs(),
                self.ttl_secs
            )
        }
    }
}

/// Validators and cache headers for one response.
#[derive(Debug, Clone)]
pub struct Conditional {
    etag: String,
    last_modified: DateTime<Utc>,
    spec: CacheSpec,
}

impl Conditional {
    /// Validators for the current time bucket.
    #[must_use]
    pub fn new(fingerprint: &QueryFingerprint, spec: CacheSpec) -> Self {
        Self::at(fingerprint, spec, Utc::now().timestamp_millis())
    }

    /// Validators for the bucket containing `now_ms`.
    #[must_use]
    pub fn at(fingerprint: &QueryFingerprint, spec: CacheSpec, now_ms: i64) -> Self {
        Self {
            etag: fingerprint.etag_at(spec.bucket, now_ms),
            last_modified: spec.bucket.start_at(now_ms),
            spec,
        }
    }

    #[must_use]
    pub fn etag(&self) -> &str {
        &self.etag
    }

    /// Switch to per-user headers, keeping the validators.
    #[must_use]
    pub const fn into_private(mut self) -> Self {
        self.spec = self.spec.as_private();
        self
    }

    /// Whether `If-None-Match` names this response's ETag (weak comparison).
    #[must_use]
    pub fn matches(&self, request_headers: &HeaderMap) -> bool {
        let ours = strip_weak(&self.etag);
        request_headers
            .get_all(header::IF_NONE_MATCH)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .flat_map(|value| value.split(','))
            .map(str::trim)
            .any(|candidate| candidate == "*" || strip_weak(candidate) == ours)
    }

    /// `304 Not Modified` with the cache headers and no body.
    #[must_use]
    pub fn not_modified(&self) -> Response {
        let mut response = StatusCode::NOT_MODIFIED.into_response();
        self.apply(response.headers_mut());
        response
    }

    /// `200 OK` with the JSON body, cache headers and `X-Cache` when known.
    pub fn respond<T: Serialize>(&self, cached: Cached<T>) -> Response {
        let mut response = Json(cached.value).into_response();
        let headers = response.headers_mut();
        self.apply(headers);
        if let Some(value) = cached.status.header_value() {
            headers.insert(X_CACHE.clone(), HeaderValue::from_static(value));
        }
        response
    }

    fn apply(&self, headers: &mut HeaderMap) {
        if let Ok(value) = HeaderValue::from_str(&self.spec.cache_control()) {
            headers.insert(header::CACHE_CONTROL, value);
        }
        if self.spec.private {
            headers.insert(header::VARY, HeaderValue::from_static("authorization, cookie"));
        } else {
            let cdn = format!("max-age={}", self.spec.ttl_secs);
            if let Ok(value) = HeaderValue::from_str(&cdn) {
                headers.insert(CDN_CACHE_CONTROL.clone(), value);
            }
        }
        if let Ok(value) = HeaderValue::from_str(&self.etag) {
            headers.insert(header::ETAG, value);
        }
        if let Ok(value) = HeaderValue::from_str(&http_date(self.last_modified)) {
            headers.insert(header::LAST_MODIFIED, value);
        }
    }
}

fn strip_weak(tag: &str) -> &str {
    tag.strip_prefix("W/").unwrap_or(tag)
}

/// IMF-fixdate, as used by `Last-Modified`.
fn http_date(at: DateTime<Utc>) -> String {
    at.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

/// Serve a cached JSON resource.
///
/// A matching `If-None-Match` short-circuits to `304` without touching the
/// cache or the database. Otherwise the value comes from `cache` under `key`,
/// with `fetch` as the fallback.
pub async fn serve_cached<T, F, Fut>(
    cache: &ReadThroughCache,
    request_headers: &HeaderMap,
    fingerprint: &QueryFingerprint,
    key: &str,
    spec: CacheSpec,
    fetch: F,
) -> AppResult<Response>
where
    T: Serialize + DeserializeOwned,
    F: FnOnce() -> Fut,
    Fut: Future<Output = AppResult<T>>,
{
    let conditional = Conditional::new(fingerprint, spec);
    if conditional.matches(request_headers) {
        return Ok(conditional.not_modified());
    }

    let cached = cache.get_or_fetch(key, spec.ttl_secs, fetch).await?;
    Ok(conditional.respond(cached))
}
