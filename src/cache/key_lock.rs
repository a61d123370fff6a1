//! Key Lock Registry Module
//!
//! A dynamically sized set of per-key async mutexes used to let only one
//! fetch per key run its fallback at a time.
//!
//! A slot exists only while some caller holds or waits for its lock. The
//! registry's own mutex covers just the bookkeeping (lookup, count, insert,
//! remove), never the time a per-key lock is held.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::warn;

// == Key Lock Slot ==
#[derive(Debug)]
struct KeyLockSlot {
    lock: Arc<AsyncMutex<()>>,
    /// Tickets currently outstanding for this key
    ref_count: usize,
}

// == Key Lock Registry ==
/// Refcounted per-key locks, created on demand and dropped when unused.
#[derive(Debug, Default)]
pub struct KeyLockRegistry {
    slots: Mutex<HashMap<String, KeyLockSlot>>,
}

impl KeyLockRegistry {
    // == Constructor ==
    pub fn new() -> Self {
        Self::default()
    }

    // == Obtain ==
    /// Registers interest in `key` and returns a ticket for its lock.
    ///
    /// Concurrent callers with the same key get the same underlying mutex;
    /// different keys never share one. The lock is not acquired here, call
    /// [`KeyLockTicket::lock`] for that. Dropping the ticket releases the
    /// registration whether or not the lock was ever taken.
    pub fn obtain(&self, key: &str) -> KeyLockTicket<'_> {
        let lock = {
            let mut slots = self.slots.lock();
            let slot = slots.entry(key.to_string()).or_insert_with(|| KeyLockSlot {
                lock: Arc::new(AsyncMutex::new(())),
                ref_count: 0,
            });
            slot.ref_count += 1;
            Arc::clone(&slot.lock)
        };

        KeyLockTicket {
            registry: self,
            key: key.to_string(),
            lock,
        }
    }

    // == Release ==
    /// Drops one registration for `key`, removing the slot when it was the last.
    ///
    /// The decrement and the removal happen in one critical section, so a
    /// concurrent `obtain` either bumps the old slot before it is removed or
    /// creates a fresh one after.
    fn release(&self, key: &str) {
        let mut slots = self.slots.lock();
        match slots.entry(key.to_string()) {
            Entry::Occupied(mut occupied) => {
                let slot = occupied.get_mut();
                slot.ref_count -= 1;
                if slot.ref_count == 0 {
                    occupied.remove();
                }
            }
            Entry::Vacant(_) => {
                warn!(key, "Key lock released with no registered slot");
            }
        }
    }

    // == Length ==
    /// Number of keys with at least one outstanding ticket.
    pub fn len(&self) -> usize {
        self.slots.lock().len()
    }

    // == Is Empty ==
    pub fn is_empty(&self) -> bool {
        self.slots.lock().is_empty()
    }

    #[cfg(test)]
    fn ref_count(&self, key: &str) -> usize {
        self.slots.lock().get(key).map_or(0, |slot| slot.ref_count)
    }
}

// == Key Lock Ticket ==
/// A registration on one key's lock. Releases the registration on drop.
#[derive(Debug)]
pub struct KeyLockTicket<'a> {
    registry: &'a KeyLockRegistry,
    key: String,
    lock: Arc<AsyncMutex<()>>,
}

impl<'a> KeyLockTicket<'a> {
    /// Waits for exclusive ownership of the key.
    ///
    /// Cancel-safe: if the returned future is dropped before it completes,
    /// the ticket is dropped with it and the registration is released.
    pub async fn lock(self) -> KeyLockGuard<'a> {
        let guard = Arc::clone(&self.lock).lock_owned().await;
        KeyLockGuard {
            _guard: guard,
            ticket: self,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }
}

impl Drop for KeyLockTicket<'_> {
    fn drop(&mut self) {
        self.registry.release(&self.key);
    }
}

// == Key Lock Guard ==
/// Exclusive ownership of one key.
///
/// Fields drop in declaration order: the mutex is unlocked first and the
/// registration released second.
#[derive(Debug)]
pub struct KeyLockGuard<'a> {
    _guard: OwnedMutexGuard<()>,
    ticket: KeyLockTicket<'a>,
}

impl KeyLockGuard<'_> {
    pub fn key(&self) -> &str {
        self.ticket.key()
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::time::timeout;

    #[test]
    fn test_registry_starts_empty() {
        let registry = KeyLockRegistry::new();
        assert!(registry.is_empty());
        assert_eq!(registry.len(), 0);
    }

    #[test]
    fn test_obtain_same_key_shares_lock() {
        let registry = KeyLockRegistry::new();

        let first = registry.obtain("k");
        let second = registry.obtain("k");

        assert!(Arc::ptr_eq(&first.lock, &second.lock));
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.ref_count("k"), 2);
    }

    #[test]
    fn test_obtain_distinct_keys_get_distinct_locks() {
        let registry = KeyLockRegistry::new();

        let a = registry.obtain("a");
        let b = registry.obtain("b");

        assert!(!Arc::ptr_eq(&a.lock, &b.lock));
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_slot_removed_after_last_ticket_dropped() {
        let registry = KeyLockRegistry::new();

        let first = registry.obtain("k");
        let second = registry.obtain("k");

        drop(first);
        assert_eq!(registry.ref_count("k"), 1);

        drop(second);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_new_slot_after_removal_is_fresh() {
        let registry = KeyLockRegistry::new();

        let old = registry.obtain("k");
        let old_lock = Arc::clone(&old.lock);
        drop(old);

        let fresh = registry.obtain("k");
        assert!(!Arc::ptr_eq(&old_lock, &fresh.lock));
        assert_eq!(registry.ref_count("k"), 1);
    }

    #[tokio::test]
    async fn test_guard_serializes_same_key() {
        let registry = KeyLockRegistry::new();

        let held = registry.obtain("k").lock().await;
        assert_eq!(held.key(), "k");

        let waiter = registry.obtain("k");
        let blocked = timeout(Duration::from_millis(50), waiter.lock()).await;
        assert!(blocked.is_err(), "Second lock on the same key should wait");

        // The timed-out waiter's registration went away with its future
        assert_eq!(registry.ref_count("k"), 1);

        drop(held);
        assert!(registry.is_empty());

        let reacquired = timeout(Duration::from_millis(50), registry.obtain("k").lock()).await;
        assert!(reacquired.is_ok());
    }

    #[tokio::test]
    async fn test_guard_does_not_block_other_keys() {
        let registry = KeyLockRegistry::new();

        let _a = registry.obtain("a").lock().await;
        let b = timeout(Duration::from_millis(50), registry.obtain("b").lock()).await;

        assert!(b.is_ok(), "Different keys must not contend");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_registry_empty_after_contention() {
        let registry = Arc::new(KeyLockRegistry::new());
        let mut handles = Vec::new();

        for i in 0..64 {
            let registry = Arc::clone(&registry);
            handles.push(tokio::spawn(async move {
                let key = format!("key-{}", i % 4);
                let _guard = registry.obtain(&key).lock().await;
                tokio::task::yield_now().await;
            }));
        }

        for handle in handles {
            handle.await.unwrap();
        }

        assert!(registry.is_empty(), "All slots should be removed once idle");
    }
}
