//! Cache Store Module
//!
//! HashMap storage behind a single reader-writer lock, with an expiry sweep.
//!
//! Expiry is advisory: reads never look at the deadline, so an entry that
//! has expired but not been swept yet is still returned.

use std::collections::HashMap;
use std::time::Instant;

use tokio::sync::RwLock;

use crate::cache::{CacheEntry, Ttl};
use crate::error::{CacheError, Result};

// == Cache Store ==
/// Key-value storage guarded by one `RwLock`.
///
/// Every mutation holds the write lock and every read holds the read lock.
/// No user code runs while either is held.
#[derive(Debug)]
pub struct CacheStore<V> {
    entries: RwLock<HashMap<String, CacheEntry<V>>>,
}

impl<V: Clone> CacheStore<V> {
    // == Constructor ==
    /// Creates an empty store.
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    // == Get ==
    /// Returns a copy of the stored value, whether or not its TTL has elapsed.
    pub async fn get(&self, key: &str) -> Result<V> {
        let entries = self.entries.read().await;
        entries
            .get(key)
            .map(|entry| entry.value.clone())
            .ok_or_else(|| CacheError::NotFound(key.to_string()))
    }

    // == Get Many ==
    /// Returns values for the present keys, in input order, under one read lock.
    pub async fn get_many(&self, keys: &[&str]) -> Vec<V> {
        let entries = self.entries.read().await;
        keys.iter()
            .filter_map(|key| entries.get(*key).map(|entry| entry.value.clone()))
            .collect()
    }

    // == Contains ==
    pub async fn contains(&self, key: &str) -> bool {
        self.entries.read().await.contains_key(key)
    }

    // == Set ==
    /// Stores a value, replacing any previous entry and its TTL.
    pub async fn set(&self, key: String, value: V, ttl: Ttl) {
        let entry = CacheEntry::new(value, ttl);
        self.entries.write().await.insert(key, entry);
    }

    // == Set Many ==
    /// Stores every pair under one write lock so readers see all or none.
    pub async fn set_many(&self, items: Vec<(String, V)>, ttl: Ttl) {
        let now = Instant::now();
        let expires_at = ttl.deadline_from(now);

        let mut entries = self.entries.write().await;
        for (key, value) in items {
            entries.insert(key, CacheEntry { value, expires_at });
        }
    }

    // == Delete ==
    /// Removes an entry. Returns whether it was present.
    pub async fn delete(&self, key: &str) -> bool {
        self.entries.write().await.remove(key).is_some()
    }

    // == Delete Many ==
    /// Removes every listed key under one write lock. Returns how many were present.
    pub async fn delete_many(&self, keys: &[&str]) -> usize {
        let mut entries = self.entries.write().await;
        keys.iter()
            .filter(|key| entries.remove(**key).is_some())
            .count()
    }

    // == Clear ==
    /// Replaces the whole mapping with an empty one.
    pub async fn clear(&self) {
        *self.entries.write().await = HashMap::new();
    }

    // == Sweep Expired ==
    /// Removes every entry whose deadline is at or before the sweep's start.
    ///
    /// `now` is sampled once before taking the lock so the whole pass uses a
    /// consistent cutoff. Returns the number of entries removed.
    pub async fn sweep_expired(&self) -> usize {
        let now = Instant::now();

        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired_at(now));
        before - entries.len()
    }

    // == Length ==
    /// Returns the current number of entries, expired-but-unswept included.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    // == Is Empty ==
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

impl<V: Clone> Default for CacheStore<V> {
    fn default() -> Self {
        Self::new()
    }
}
