//! Read-through caching over a key-value store.
//!
//! Read endpoints wrap their database query in [`ReadThroughCache::get_or_fetch`].
//! The store is strictly an optimization: any store failure degrades to a
//! direct fetch and never fails the request.
//!
//! # Example
//!
//! ```ignore
//! let cached = cache
//!     .get_or_fetch("categories:all", 1800, || repo.find_all())
//!     .await?;
//! if let Some(header) = cached.status.header_value() {
//!     // X-Cache: HIT | MISS
//! }
//! ```

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use fred::clients::Client as RedisClient;
use fred::interfaces::KeysInterface;
use fred::types::Expiration;
use serde::{Serialize, de::DeserializeOwned};
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::AppResult;

/// Cache store error type.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// The backing store rejected or failed the operation.
    #[error("Cache backend error: {0}")]
    Backend(String),
}

/// Minimal key-value store used by the read-through cache.
#[async_trait::async_trait]
pub trait CacheStore: Send + Sync {
    /// Read a raw value.
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    /// Write a raw value with a TTL in seconds.
    async fn set(&self, key: &str, value: String, ttl_secs: u64) -> Result<(), CacheError>;

    /// Delete a key. Deleting a missing key is not an error.
    async fn delete(&self, key: &str) -> Result<(), CacheError>;
}

/// Redis-backed cache store.
#[derive(Clone)]
pub struct RedisCacheStore {
    redis: Arc<RedisClient>,
}

impl RedisCacheStore {
    /// Create a store over a connected Redis client.
    #[must_use]
    pub const fn new(redis: Arc<RedisClient>) -> Self {
        Self { redis }
    }
}

#[async_trait::async_trait]
impl CacheStore for RedisCacheStore {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        self.redis
            .get::<Option<String>, _>(key)
            .await
            .map_err(|e| CacheError::Backend(e.to_string()))
    }

    async fn set(&self, key: &str, value: String, ttl_secs: u64) -> Result<(), CacheError> {
        // Redis rejects EX 0
        let ttl = i64::try_from(ttl_secs.max(1)).unwrap_or(i64::MAX);
        self.redis
            .set::<(), _, _>(key, value, Some(Expiration::EX(ttl)), None, false)
            .await
            .map_err(|e| CacheError::Backend(e.to_string()))
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        self.redis
            .del::<(), _>(key)
            .await
            .map_err(|e| CacheError::Backend(e.to_string()))
    }
}

/// In-process cache store, used when no Redis URL is configured.
#[derive(Clone, Default)]
pub struct MemoryCacheStore {
    entries: Arc<RwLock<HashMap<String, (String, Instant)>>>,
}

impl MemoryCacheStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live (unexpired) entries.
    pub async fn len(&self) -> usize {
        let now = Instant::now();
        self.entries
            .read()
            .await
            .values()
            .filter(|(_, expires_at)| *expires_at > now)
            .count()
    }

    /// Whether the store holds no live entries.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait::async_trait]
impl CacheStore for MemoryCacheStore {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let now = Instant::now();
        let entries = self.entries.read().await;
        Ok(entries
            .get(key)
            .filter(|(_, expires_at)| *expires_at > now)
            .map(|(value, _)| value.clone()))
    }

    async fn set(&self, key: &str, value: String, ttl_secs: u64) -> Result<(), CacheError> {
        let expires_at = Instant::now() + Duration::from_secs(ttl_secs);
        let mut entries = self.entries.write().await;
        entries.retain(|_, (_, exp)| *exp > Instant::now());
        entries.insert(key.to_string(), (value, expires_at));
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        self.entries.write().await.remove(key);
        Ok(())
    }
}

/// How a value was produced by the read-through cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    /// Served from the store.
    Hit,
    /// Fetched from the source and written to the store.
    Miss,
    /// The store failed; fetched directly without annotation.
    Bypass,
}

impl CacheStatus {
    /// Value of the `X-Cache` response header, if any.
    #[must_use]
    pub const fn header_value(self) -> Option<&'static str> {
        match self {
            Self::Hit => Some("HIT"),
            Self::Miss => Some("MISS"),
            Self::Bypass => None,
        }
    }
}

/// A value annotated with its cache status.
#[derive(Debug, Clone)]
pub struct Cached<T> {
    /// The value.
    pub value: T,
    /// Where it came from.
    pub status: CacheStatus,
}

/// Read-through cache wrapper with namespaced keys.
#[derive(Clone)]
pub struct ReadThroughCache {
    store: Arc<dyn CacheStore>,
    prefix: String,
}

impl ReadThroughCache {
    /// Create a cache over `store`; every key is prefixed with `prefix:`.
    #[must_use]
    pub fn new(store: Arc<dyn CacheStore>, prefix: impl Into<String>) -> Self {
        Self {
            store,
            prefix: prefix.into(),
        }
    }

    fn full_key(&self, key: &str) -> String {
        if self.prefix.is_empty() {
            key.to_string()
        } else {
            format!("{}:{key}", self.prefix)
        }
    }

    /// Return the cached value for `key`, or run `fetch` and cache its result.
    ///
    /// Errors from `fetch` propagate unchanged; store errors never do.
    pub async fn get_or_fetch<T, F, Fut>(
        &self,
        key: &str,
        ttl_secs: u64,
        fetch: F,
    ) -> AppResult<Cached<T>>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = AppResult<T>>,
    {
        let full_key = self.full_key(key);

        match self.store.get(&full_key).await {
            Ok(Some(raw)) => match serde_json::from_str::<T>(&raw) {
                Ok(value) => {
                    debug!(key = %full_key, "Cache hit");
                    return Ok(Cached {
                        value,
                        status: CacheStatus::Hit,
                    });
                }
                Err(e) => {
                    warn!(key = %full_key, error = %e, "Discarding undecodable cache entry");
                }
            },
            Ok(None) => debug!(key = %full_key, "Cache miss"),
            Err(e) => {
                warn!(key = %full_key, error = %e, "Cache read failed, bypassing cache");
                let value = fetch().await?;
                return Ok(Cached {
                    value,
                    status: CacheStatus::Bypass,
                });
            }
        }

        let value = fetch().await?;

        let status = match serde_json::to_string(&value) {
            Ok(raw) => match self.store.set(&full_key, raw, ttl_secs).await {
                Ok(()) => CacheStatus::Miss,
                Err(e) => {
                    warn!(key = %full_key, error = %e, "Cache write failed");
                    CacheStatus::Bypass
                }
            },
            Err(e) => {
                warn!(key = %full_key, error = %e, "Failed to serialize value for cache");
                CacheStatus::Bypass
            }
        };

        Ok(Cached { value, status })
    }

    /// Delete a single cached entry. Failures are logged, never returned.
    pub async fn invalidate(&self, key: &str) {
        let full_key = self.full_key(key);
        match self.store.delete(&full_key).await {
            Ok(()) => debug!(key = %full_key, "Invalidated cache entry"),
            Err(e) => warn!(key = %full_key, error = %e, "Cache invalidation failed"),
        }
    }
}
