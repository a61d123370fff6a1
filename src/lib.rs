//! Stampede Cache - An in-process key/value cache with TTL expiration
//!
//! Provides get/set/delete with per-entry TTL, a background expiry sweeper,
//! and a fetch-or-compute operation that runs at most one fallback per key
//! at a time, however many callers miss concurrently.
//!
//! # Example
//! ```no_run
//! use std::time::Duration;
//! use stampede_cache::{Cache, Config};
//!
//! # async fn run() -> stampede_cache::error::Result<()> {
//! let cache: Cache<String> = Cache::new(
//!     Config::default()
//!         .with_default_ttl(Duration::from_secs(60))
//!         .with_cleanup_interval(Duration::from_secs(5)),
//! );
//!
//! let profile = cache
//!     .fetch("user:42", |key| async move {
//!         Ok::<_, std::io::Error>(format!("profile for {}", key))
//!     })
//!     .await?;
//! assert_eq!(profile, "profile for user:42");
//!
//! cache.close().await?;
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod config;
pub mod error;
pub mod tasks;

pub use cache::{Cache, CacheStats, Ttl};
pub use config::Config;
pub use error::{BoxError, CacheError, Result};
