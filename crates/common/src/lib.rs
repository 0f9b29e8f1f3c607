//! Common utilities and shared types for prompthub.
//!
//! This crate provides foundational components used across all prompthub crates:
//!
//! - **Configuration**: Application settings via [`Config`]
//! - **Error handling**: Unified error types via [`AppError`] and [`AppResult`]
//! - **ID Generation**: ULID-based unique identifiers via [`IdGenerator`]
//! - **Cache**: Key-value store backends and the read-through wrapper [`ReadThroughCache`]
//! - **Cache keys**: Deterministic cache keys and time-bucketed ETags via [`QueryFingerprint`]
//! - **Storage**: Object storage backends (local, S3-compatible)
//!
//! # Example
//!
//! ```no_run
//! use prompthub_common::{Config, IdGenerator, AppResult};
//!
//! fn example() -> AppResult<()> {
//!     let config = Config::load()?;
//!     let id_gen = IdGenerator::new();
//!     let id = id_gen.generate();
//!     println!("Generated ID: {} for {}", id, config.server.url);
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod cache_key;
pub mod config;
pub mod error;
pub mod id;
pub mod storage;

pub use cache::{
    CacheError, CacheStatus, CacheStore, Cached, MemoryCacheStore, ReadThroughCache,
    RedisCacheStore,
};
pub use cache_key::{CacheBucket, QueryFingerprint};
pub use config::Config;
pub use error::{AppError, AppResult};
pub use id::IdGenerator;
pub use storage::{
    LocalStorage, StorageBackend, StorageConfig, StorageService, UploadedFile, build_storage,
    generate_image_key,
};
