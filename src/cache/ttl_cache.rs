//! TTL Cache Module
//!
//! Public cache type: store operations, the stampede-safe fetch, and the
//! lifecycle of the background sweeper.

use std::future::Future;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tracing::{debug, warn};

use crate::cache::stats::StatsCounters;
use crate::cache::{CacheStats, CacheStore, KeyLockRegistry, Ttl};
use crate::config::Config;
use crate::error::{BoxError, CacheError, Result};
use crate::tasks::{spawn_sweeper, SweeperHandle};

// == Cache ==
/// In-process key/value cache with per-entry TTL and stampede-safe fetch.
///
/// TTL is advisory. Expired entries are only removed by a sweep (the
/// background sweeper or [`Cache::delete_expired`]), and until then `get`
/// and `fetch` keep returning them.
///
/// Share one instance between tasks with `Arc<Cache<V>>`.
pub struct Cache<V> {
    config: Config,
    store: Arc<CacheStore<V>>,
    locks: KeyLockRegistry,
    stats: Arc<StatsCounters>,
    sweeper: Mutex<Option<SweeperHandle>>,
}

impl<V> Cache<V>
where
    V: Clone + Send + Sync + 'static,
{
    // == Constructor ==
    /// Creates an empty cache and, if `config.cleanup_interval` is set,
    /// starts the background sweeper on the current tokio runtime.
    ///
    /// Outside a runtime no sweeper is started and a warning is logged;
    /// expired entries are then only removed by [`Cache::delete_expired`].
    pub fn new(config: Config) -> Self {
        let store = Arc::new(CacheStore::new());
        let stats = Arc::new(StatsCounters::default());

        let interval = match (config.cleanup_interval, Handle::try_current()) {
            (Some(interval), Ok(_)) => Some(interval),
            (Some(_), Err(_)) => {
                warn!("No tokio runtime available, TTL sweeper not started");
                None
            }
            (None, _) => None,
        };

        let sweeper = interval.map(|interval| {
            let store = Arc::clone(&store);
            let stats = Arc::clone(&stats);
            spawn_sweeper(interval, move || {
                let store = Arc::clone(&store);
                let stats = Arc::clone(&stats);
                async move { sweep(&store, &stats).await }
            })
        });

        Self {
            config,
            store,
            locks: KeyLockRegistry::new(),
            stats,
            sweeper: Mutex::new(sweeper),
        }
    }

    // == Close ==
    /// Stops the background sweeper and waits for it to finish.
    ///
    /// A no-op if the sweeper was never started or is already stopped.
    /// Always returns `Ok(())`.
    pub async fn close(&self) -> Result<()> {
        let sweeper = self.sweeper.lock().take();
        if let Some(sweeper) = sweeper {
            sweeper.shutdown().await;
        }
        Ok(())
    }

    // == Set ==
    /// Stores a value with the default TTL, replacing any previous entry.
    pub async fn set(&self, key: impl Into<String>, value: V) {
        self.store.set(key.into(), value, self.config.default_ttl).await;
    }

    /// Stores a value with an explicit TTL, replacing any previous entry.
    pub async fn set_ex(&self, key: impl Into<String>, ttl: impl Into<Ttl>, value: V) {
        self.store.set(key.into(), value, ttl.into()).await;
    }

    /// Stores every pair with the default TTL. Readers see all of them or none.
    pub async fn set_list<K, I>(&self, items: I)
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, V)>,
    {
        let items: Vec<(String, V)> = items
            .into_iter()
            .map(|(key, value)| (key.into(), value))
            .collect();
        self.store.set_many(items, self.config.default_ttl).await;
    }

    // == Get ==
    /// Returns the cached value, or `CacheError::NotFound`.
    pub async fn get(&self, key: &str) -> Result<V> {
        let result = self.store.get(key).await;
        match result {
            Ok(_) => self.stats.record_hit(),
            Err(_) => self.stats.record_miss(),
        }
        result
    }

    /// Returns values for the keys that are present, in input order.
    /// Missing keys are skipped.
    pub async fn get_list<K, I>(&self, keys: I) -> Vec<V>
    where
        K: AsRef<str>,
        I: IntoIterator<Item = K>,
    {
        let keys: Vec<K> = keys.into_iter().collect();
        let keys: Vec<&str> = keys.iter().map(AsRef::as_ref).collect();
        self.store.get_many(&keys).await
    }

    pub async fn contains(&self, key: &str) -> bool {
        self.store.contains(key).await
    }

    // == Delete ==
    /// Removes one key. Returns whether it was present.
    pub async fn delete(&self, key: &str) -> bool {
        self.store.delete(key).await
    }

    /// Removes every listed key at once. Returns how many were present.
    pub async fn delete_list<K, I>(&self, keys: I) -> usize
    where
        K: AsRef<str>,
        I: IntoIterator<Item = K>,
    {
        let keys: Vec<K> = keys.into_iter().collect();
        let keys: Vec<&str> = keys.iter().map(AsRef::as_ref).collect();
        self.store.delete_many(&keys).await
    }

    /// Removes every entry.
    pub async fn delete_all(&self) {
        self.store.clear().await;
    }

    /// Runs one sweep now, whether or not the background sweeper is enabled.
    /// Returns the number of entries removed.
    pub async fn delete_expired(&self) -> usize {
        sweep(&self.store, &self.stats).await
    }

    // == Fetch ==
    /// Returns the cached value, or computes it with `fallback` and caches it
    /// with the default TTL.
    ///
    /// See [`Cache::fetch_ex`].
    pub async fn fetch<F, Fut, E>(&self, key: &str, fallback: F) -> Result<V>
    where
        F: FnOnce(String) -> Fut,
        Fut: Future<Output = std::result::Result<V, E>>,
        E: Into<BoxError>,
    {
        self.fetch_ex(key, self.config.default_ttl, fallback).await
    }

    /// Returns the cached value, or computes it with `fallback` and caches it
    /// with `ttl`.
    ///
    /// For any one key at most one fallback runs at a time. Callers that miss
    /// while it runs wait on the key's lock and then read its result instead
    /// of computing again. Fetches for other keys are not held up.
    ///
    /// A failed fallback returns `CacheError::Fallback` to its caller and
    /// caches nothing, so the next waiter (or a later fetch) tries again.
    /// An upstream that keeps failing is therefore called once per waiter,
    /// one call after another.
    ///
    /// The cache imposes no timeout: a fallback that never completes blocks
    /// every other fetch of the same key. Dropping the returned future is
    /// safe at any point and leaves nothing locked.
    pub async fn fetch_ex<F, Fut, E>(
        &self,
        key: &str,
        ttl: impl Into<Ttl>,
        fallback: F,
    ) -> Result<V>
    where
        F: FnOnce(String) -> Fut,
        Fut: Future<Output = std::result::Result<V, E>>,
        E: Into<BoxError>,
    {
        let ttl = ttl.into();

        // Hits never touch the key locks
        if let Ok(value) = self.store.get(key).await {
            self.stats.record_hit();
            return Ok(value);
        }

        let _guard = self.locks.obtain(key).lock().await;

        // Someone may have filled it while we waited
        if let Ok(value) = self.store.get(key).await {
            debug!(key, "Fetch served by a concurrent fill");
            self.stats.record_hit();
            return Ok(value);
        }

        debug!(key, "Fetch miss, running fallback");
        self.stats.record_miss();
        self.stats.record_fallback_call();

        let value = match fallback(key.to_string()).await {
            Ok(value) => value,
            Err(err) => {
                let source: BoxError = err.into();
                self.stats.record_fallback_error();
                warn!(key, error = %source, "Fetch fallback failed");
                return Err(CacheError::Fallback {
                    key: key.to_string(),
                    source,
                });
            }
        };

        self.store.set(key.to_string(), value.clone(), ttl).await;
        Ok(value)
    }

    // == Introspection ==
    /// Returns the current number of entries, including expired ones not yet swept.
    pub async fn len(&self) -> usize {
        self.store.len().await
    }

    pub async fn is_empty(&self) -> bool {
        self.store.is_empty().await
    }

    /// Keys that currently have a fetch holding or waiting on their lock.
    /// Zero whenever no fetch is in progress.
    pub fn in_flight_keys(&self) -> usize {
        self.locks.len()
    }

    /// Returns a snapshot of the cache counters.
    pub async fn stats(&self) -> CacheStats {
        let total_entries = self.store.len().await;
        self.stats.snapshot(total_entries, self.locks.len())
    }

    /// Returns true while the background sweeper is running.
    pub fn is_sweeping(&self) -> bool {
        self.sweeper
            .lock()
            .as_ref()
            .is_some_and(|sweeper| !sweeper.is_finished())
    }
}

async fn sweep<V: Clone>(store: &CacheStore<V>, stats: &StatsCounters) -> usize {
    let removed = store.sweep_expired().await;
    stats.record_expired(removed);
    removed
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn quiet_config() -> Config {
        Config::default().without_cleanup()
    }

    #[tokio::test]
    async fn test_get_unset_key_is_not_found() {
        let cache: Cache<u32> = Cache::new(quiet_config());

        let err = cache.get("nope").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_set_uses_default_ttl() {
        let cache = Cache::new(quiet_config().with_default_ttl(Duration::from_millis(10)));
        cache.set("k", 1u32).await;

        tokio::time::sleep(Duration::from_millis(30)).await;

        // Advisory: readable until swept
        assert_eq!(cache.get("k").await.unwrap(), 1);
        assert_eq!(cache.delete_expired().await, 1);
        assert!(cache.get("k").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_set_ex_never_survives_sweep() {
        let cache = Cache::new(quiet_config().with_default_ttl(Duration::ZERO));
        cache.set_ex("pinned", Ttl::Never, "v".to_string()).await;
        cache.set("gone", "v".to_string()).await;

        assert_eq!(cache.delete_expired().await, 1);
        assert!(cache.contains("pinned").await);
        assert!(!cache.contains("gone").await);
    }

    #[tokio::test]
    async fn test_delete_list_and_delete_all() {
        let cache = Cache::new(quiet_config());
        cache.set_list([("a", 1), ("b", 2), ("c", 3)]).await;

        assert_eq!(cache.delete_list(["a", "z"]).await, 1);
        assert_eq!(cache.get_list(["a", "b", "c"]).await, vec![2, 3]);

        assert!(cache.delete("b").await);
        cache.delete_all().await;
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn test_fetch_caches_fallback_result() {
        let cache = Cache::new(quiet_config());
        let calls = AtomicUsize::new(0);

        for _ in 0..3 {
            let value = cache
                .fetch("answer", |key| {
                    calls.fetch_add(1, Ordering::SeqCst);
                    async move { Ok::<_, io::Error>(format!("computed:{}", key)) }
                })
                .await
                .unwrap();
            assert_eq!(value, "computed:answer");
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.in_flight_keys(), 0);

        let stats = cache.stats().await;
        assert_eq!(stats.fallback_calls, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.hits, 2);
    }

    #[tokio::test]
    async fn test_fetch_returns_existing_value_without_fallback() {
        let cache = Cache::new(quiet_config());
        cache.set("k", 5).await;

        let value = cache
            .fetch("k", |_| async { Err::<i32, _>(io::Error::new(io::ErrorKind::Other, "unused")) })
            .await
            .unwrap();

        assert_eq!(value, 5);
    }

    #[tokio::test]
    async fn test_fetch_failure_caches_nothing_and_retries() {
        let cache: Cache<i32> = Cache::new(quiet_config());

        let err = cache
            .fetch("flaky", |_| async { Err(io::Error::new(io::ErrorKind::Other, "boom")) })
            .await
            .unwrap_err();
        assert!(err.is_fallback());
        assert!(!err.is_not_found());
        assert!(cache.get("flaky").await.unwrap_err().is_not_found());
        assert_eq!(cache.in_flight_keys(), 0);

        let value = cache
            .fetch("flaky", |_| async { Ok::<_, io::Error>(9) })
            .await
            .unwrap();
        assert_eq!(value, 9);

        let stats = cache.stats().await;
        assert_eq!(stats.fallback_calls, 2);
        assert_eq!(stats.fallback_errors, 1);
    }

    #[tokio::test]
    async fn test_fetch_ex_applies_ttl() {
        let cache = Cache::new(quiet_config());

        cache
            .fetch_ex("short", Duration::from_millis(10), |_| async { Ok::<_, io::Error>(1) })
            .await
            .unwrap();
        cache
            .fetch_ex("forever", Ttl::Never, |_| async { Ok::<_, io::Error>(2) })
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(30)).await;
        cache.delete_expired().await;

        assert!(!cache.contains("short").await);
        assert!(cache.contains("forever").await);
    }

    #[tokio::test]
    async fn test_dropped_fetch_releases_key_lock() {
        let cache: Cache<i32> = Cache::new(quiet_config());

        let pending = cache.fetch("slow", |_| async {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok::<_, io::Error>(1)
        });
        let timed_out = tokio::time::timeout(Duration::from_millis(20), pending).await;

        assert!(timed_out.is_err());
        assert_eq!(cache.in_flight_keys(), 0);
        assert!(cache.get("slow").await.is_err());
    }

    #[test]
    fn test_new_outside_runtime_skips_sweeper() {
        let cache: Cache<i32> = Cache::new(Config::default());
        assert!(!cache.is_sweeping());

        tokio_test::block_on(async {
            cache.set_ex("k", Duration::ZERO, 1).await;
            assert_eq!(cache.delete_expired().await, 1);
            assert!(cache.close().await.is_ok());
        });
    }

    #[tokio::test]
    async fn test_close_without_sweeper_is_noop() {
        let cache: Cache<i32> = Cache::new(quiet_config());
        assert!(!cache.is_sweeping());

        assert!(cache.close().await.is_ok());
        assert!(cache.close().await.is_ok());
    }

    #[tokio::test]
    async fn test_close_stops_sweeper() {
        let cache: Cache<i32> =
            Cache::new(Config::default().with_cleanup_interval(Duration::from_millis(10)));
        assert!(cache.is_sweeping());

        cache.close().await.unwrap();
        assert!(!cache.is_sweeping());

        // Second close is silent
        cache.close().await.unwrap();
    }
}
