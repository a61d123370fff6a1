//! Cache Statistics Module
//!
//! Tracks lookup and fallback counters without taking the store lock.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

// == Stats Counters ==
/// Live counters shared by all callers of one cache.
#[derive(Debug, Default)]
pub(crate) struct StatsCounters {
    hits: AtomicU64,
    misses: AtomicU64,
    fallback_calls: AtomicU64,
    fallback_errors: AtomicU64,
    expired_removed: AtomicU64,
}

impl StatsCounters {
    pub(crate) fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_fallback_call(&self) {
        self.fallback_calls.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_fallback_error(&self) {
        self.fallback_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_expired(&self, count: usize) {
        self.expired_removed.fetch_add(count as u64, Ordering::Relaxed);
    }

    /// Copies the counters into a snapshot. Counters are read independently,
    /// so a snapshot taken under load is not a single consistent cut.
    pub(crate) fn snapshot(&self, total_entries: usize, in_flight_keys: usize) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            fallback_calls: self.fallback_calls.load(Ordering::Relaxed),
            fallback_errors: self.fallback_errors.load(Ordering::Relaxed),
            expired_removed: self.expired_removed.load(Ordering::Relaxed),
            total_entries,
            in_flight_keys,
        }
    }
}

// == Cache Stats ==
/// Point-in-time view of cache activity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    /// Lookups answered from the store
    pub hits: u64,
    /// Lookups that found nothing (for fetch: those that ran the fallback)
    pub misses: u64,
    /// Number of fallback invocations
    pub fallback_calls: u64,
    /// Number of fallback invocations that returned an error
    pub fallback_errors: u64,
    /// Entries removed by sweeps, automatic or manual
    pub expired_removed: u64,
    /// Current number of entries in the store
    pub total_entries: usize,
    /// Keys with a fetch currently holding or waiting on their lock
    pub in_flight_keys: usize,
}

impl CacheStats {
    // == Hit Rate ==
    /// Calculates the cache hit rate.
    ///
    /// Returns hits / (hits + misses), or 0.0 if no lookups have been made.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}
