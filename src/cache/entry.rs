//! Cache Entry Module
//!
//! Defines the structure for individual cache entries with TTL support.

use std::time::{Duration, Instant};

// == Time To Live ==
/// How long an entry stays eligible before a sweep may remove it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ttl {
    /// The entry is never swept.
    Never,
    /// The entry expires this long after it was written.
    After(Duration),
}

impl Ttl {
    /// Absolute expiry for an entry written at `now`, or None for `Never`.
    ///
    /// Saturates to `Never` if the deadline does not fit in an `Instant`.
    pub fn deadline_from(self, now: Instant) -> Option<Instant> {
        match self {
            Ttl::Never => None,
            Ttl::After(ttl) => now.checked_add(ttl),
        }
    }
}

impl From<Duration> for Ttl {
    fn from(ttl: Duration) -> Self {
        Ttl::After(ttl)
    }
}

// == Cache Entry ==
/// A stored value and its absolute expiry.
///
/// Entries are replaced wholesale on every write and never mutated in place.
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    /// The stored value
    pub value: V,
    /// Expiration instant, None = no expiration
    pub expires_at: Option<Instant>,
}

impl<V> CacheEntry<V> {
    // == Constructor ==
    /// Creates a new cache entry expiring `ttl` from now.
    pub fn new(value: V, ttl: Ttl) -> Self {
        Self {
            value,
            expires_at: ttl.deadline_from(Instant::now()),
        }
    }

    // == Is Expired ==
    /// Checks if the entry has expired as of `now`.
    ///
    /// Boundary condition: an entry whose deadline equals `now` is expired.
    /// Reads never call this; only sweeps do.
    pub fn is_expired_at(&self, now: Instant) -> bool {
        match self.expires_at {
            Some(expires) => expires <= now,
            None => false,
        }
    }
}
