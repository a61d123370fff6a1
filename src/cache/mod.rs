//! Cache Module
//!
//! Provides an in-memory cache with advisory TTL expiration and a fetch
//! that runs at most one fallback per key at a time.

mod entry;
mod key_lock;
mod stats;
mod store;
mod ttl_cache;


// Re-export public types
pub use entry::{CacheEntry, Ttl};
pub use key_lock::{KeyLockGuard, KeyLockRegistry, KeyLockTicket};
pub use stats::CacheStats;
pub use store::CacheStore;
pub use ttl_cache::Cache;
