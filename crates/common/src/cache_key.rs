//! Cache keys and time-bucketed ETags derived from request parameters.
//!
//! A [`QueryFingerprint`] collects the recognized query parameters of an
//! endpoint. Its cache key depends only on the normalized parameters; its
//! ETag additionally depends on the current [`CacheBucket`], so it stays
//! stable within a bucket and changes when the bucket elapses.

use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, TimeZone, Utc};
use sha2::{Digest, Sha256};

/// Fixed-width time window used to derive ETags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheBucket {
    millis: i64,
}

impl CacheBucket {
    /// Search results: high churn, short window.
    pub const SEARCH: Self = Self::from_secs(10);
    /// Browse lists.
    pub const LIST: Self = Self::from_secs(30);
    /// Single resources, taxonomy and statistics.
    pub const RESOURCE: Self = Self::from_secs(60);

    /// Bucket of `secs` seconds (at least one second).
    #[must_use]
    pub const fn from_secs(secs: u64) -> Self {
        let secs = if secs == 0 { 1 } else { secs };
        Self {
            millis: secs as i64 * 1000,
        }
    }

    /// Bucket width.
    #[must_use]
    pub const fn duration(self) -> Duration {
        Duration::from_millis(self.millis as u64)
    }

    /// `floor(now_ms / bucket_ms)`.
    #[must_use]
    pub const fn index_at(self, now_ms: i64) -> i64 {
        now_ms.div_euclid(self.millis)
    }

    /// Start of the bucket containing `now_ms`, used for `Last-Modified`.
    #[must_use]
    pub fn start_at(self, now_ms: i64) -> DateTime<Utc> {
        let start = self.index_at(now_ms) * self.millis;
        Utc.timestamp_millis_opt(start)
            .single()
            .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
    }
}

/// Normalized set of query parameters for one endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryFingerprint {
    namespace: String,
    params: Vec<(String, String)>,
}

impl QueryFingerprint {
    /// Start a fingerprint for a resource namespace such as `prompts:list`.
    #[must_use]
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            params: Vec::new(),
        }
    }

    /// Add a parameter. Missing, empty and whitespace-only values are dropped.
    #[must_use]
    pub fn param<V: ToString>(mut self, name: &str, value: Option<V>) -> Self {
        if let Some(value) = value {
            let value = value.to_string();
            let value = value.trim();
            if !value.is_empty() {
                self.params.push((name.to_string(), value.to_string()));
            }
        }
        self
    }

    /// Canonical `name=value&...` form, sorted by name.
    #[must_use]
    pub fn canonical(&self) -> String {
        let mut params = self.params.clone();
        params.sort();
        params
            .iter()
            .map(|(name, value)| format!("{name}={value}"))
            .collect::<Vec<_>>()
            .join("&")
    }

    /// Cache key: namespace plus base64url of the canonical parameters.
    #[must_use]
    pub fn cache_key(&self) -> String {
        let canonical = self.canonical();
        if canonical.is_empty() {
            format!("{}:all", self.namespace)
        } else {
            format!("{}:{}", self.namespace, URL_SAFE_NO_PAD.encode(canonical))
        }
    }

    /// Weak ETag for the bucket containing `now_ms`.
    #[must_use]
    pub fn etag_at(&self, bucket: CacheBucket, now_ms: i64) -> String {
        let digest = Sha256::digest(self.cache_key().as_bytes());
        let short = hex::encode(&digest[..8]);
        format!("W/\"{short}-{}\"", bucket.index_at(now_ms))
    }

    /// Weak ETag for the current bucket.
    #[must_use]
    pub fn etag(&self, bucket: CacheBucket) -> String {
        self.etag_at(bucket, Utc::now().timestamp_millis())
    }
}
