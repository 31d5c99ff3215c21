//! # Registry
//!
//! The shared state behind a poller: for every bound key, one slot holding the
//! last published value, the per-key check lock and a little bookkeeping.
//!
//! Keeping the cache entry and the lock in the same map entry makes the
//! "lock exists iff entry exists" invariant structural: both are created by
//! [`Registry::register`] and both disappear with [`Registry::deregister`].
//!
//! Reads go through `DashMap`'s sharded locks, which are only ever held for the
//! length of a clone or a field update, never across a check.

use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, OwnedMutexGuard};
use tokio::time::Instant;

/// # Cached Value
///
/// An immutable snapshot of one completed check: the published value and the
/// wall-clock time it was recorded. Replaced wholesale on every completion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cached<V> {
    value: V,
    checked_at: DateTime<Utc>,
}

impl<V> Cached<V> {
    /// Stamps `value` with the current time.
    pub fn new(value: V) -> Self {
        Self {
            value,
            checked_at: Utc::now(),
        }
    }

    /// The published value.
    pub fn value(&self) -> &V {
        &self.value
    }

    /// When the check that produced this value completed.
    pub fn checked_at(&self) -> DateTime<Utc> {
        self.checked_at
    }

    /// Consumes the snapshot, returning the value.
    pub fn into_value(self) -> V {
        self.value
    }
}

struct Slot<V> {
    /// Assigned at registration; results from an older generation are stale.
    generation: u64,
    lock: Arc<Mutex<()>>,
    cached: Option<Cached<V>>,
    /// When a check was last dispatched, whether or not it has completed.
    last_attempt: Option<Instant>,
}

/// The result of trying to start a check for a key.
pub enum LockAttempt {
    /// The key is not registered.
    Unknown,
    /// A check for the key is already running.
    Busy,
    /// The previous attempt is younger than the requested minimum interval.
    Throttled,
    /// The lock was taken; the ticket releases it when dropped.
    Acquired(CheckTicket),
}

/// Proof that the holder owns the per-key check lock. Dropping the ticket
/// releases the lock, on every exit path of the task that holds it.
pub struct CheckTicket {
    generation: u64,
    _guard: OwnedMutexGuard<()>,
}

impl CheckTicket {
    /// The slot generation this check was started against.
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// # Registry
///
/// Concurrency-safe `K -> slot` map shared by a runner and its poller.
pub struct Registry<K, V> {
    slots: DashMap<K, Slot<V>>,
    generations: AtomicU64,
}

impl<K, V> Default for Registry<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> Registry<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self {
            slots: DashMap::new(),
            generations: AtomicU64::new(1),
        }
    }

    /// Creates the slot for `key`. Returns `false` if it already existed.
    ///
    /// The new slot has no cached value, which readers see as "unknown".
    pub fn register(&self, key: K) -> bool {
        match self.slots.entry(key) {
            Entry::Occupied(_) => false,
            Entry::Vacant(vacant) => {
                vacant.insert(Slot {
                    generation: self.generations.fetch_add(1, Ordering::Relaxed),
                    lock: Arc::new(Mutex::new(())),
                    cached: None,
                    last_attempt: None,
                });
                true
            }
        }
    }

    /// Removes the slot for `key`, dropping its cached value and its lock
    /// together. Returns `false` if nothing was registered.
    pub fn deregister(&self, key: &K) -> bool {
        self.slots.remove(key).is_some()
    }

    /// True when `key` has a slot.
    pub fn contains(&self, key: &K) -> bool {
        self.slots.contains_key(key)
    }

    /// Number of registered keys.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// True when nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Tries to take the check lock for `key` without waiting.
    ///
    /// With `min_interval`, the attempt is refused while the previous dispatch
    /// is younger than that interval. A successful attempt stamps
    /// `last_attempt`; refused ones leave the slot untouched.
    pub fn try_begin(&self, key: &K, min_interval: Option<Duration>) -> LockAttempt {
        let Some(mut slot) = self.slots.get_mut(key) else {
            return LockAttempt::Unknown;
        };

        if let (Some(min), Some(last)) = (min_interval, slot.last_attempt) {
            if last.elapsed() < min {
                return LockAttempt::Throttled;
            }
        }

        match Arc::clone(&slot.lock).try_lock_owned() {
            Ok(guard) => {
                slot.last_attempt = Some(Instant::now());
                LockAttempt::Acquired(CheckTicket {
                    generation: slot.generation,
                    _guard: guard,
                })
            }
            Err(_) => LockAttempt::Busy,
        }
    }

    /// Replaces the cached value for `key`, provided the slot is still the one
    /// the check was started against. Returns whether the write landed.
    pub fn publish(&self, key: &K, generation: u64, value: V) -> bool {
        match self.slots.get_mut(key) {
            Some(mut slot) if slot.generation == generation => {
                slot.cached = Some(Cached::new(value));
                true
            }
            _ => false,
        }
    }

    /// The last published value for `key`.
    pub fn cached(&self, key: &K) -> Option<Cached<V>> {
        self.slots.get(key).and_then(|slot| slot.cached.clone())
    }

    /// When a check for `key` was last dispatched.
    pub fn last_attempt(&self, key: &K) -> Option<Instant> {
        self.slots.get(key).and_then(|slot| slot.last_attempt)
    }

    /// True while a check for `key` holds its lock. `None` if unregistered.
    pub fn is_checking(&self, key: &K) -> Option<bool> {
        self.slots
            .get(key)
            .map(|slot| slot.lock.try_lock().is_err())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_is_idempotent_and_deregister_removes_everything() {
        let registry: Registry<String, bool> = Registry::new();
        assert!(registry.register("a".into()));
        assert!(!registry.register("a".into()));
        assert_eq!(registry.len(), 1);

        assert!(registry.deregister(&"a".to_string()));
        assert!(!registry.contains(&"a".to_string()));
        assert!(registry.is_checking(&"a".to_string()).is_none());
        assert!(!registry.deregister(&"a".to_string()));
    }

    #[tokio::test]
    async fn second_attempt_is_busy_until_ticket_drops() {
        let registry: Registry<String, bool> = Registry::new();
        let key = "a".to_string();
        registry.register(key.clone());

        let ticket = match registry.try_begin(&key, None) {
            LockAttempt::Acquired(t) => t,
            _ => panic!("first attempt should acquire"),
        };
        assert!(matches!(registry.try_begin(&key, None), LockAttempt::Busy));
        assert_eq!(registry.is_checking(&key), Some(true));

        drop(ticket);
        assert!(matches!(registry.try_begin(&key, None), LockAttempt::Acquired(_)));
    }

    #[tokio::test]
    async fn publish_from_an_old_generation_is_discarded() {
        let registry: Registry<String, bool> = Registry::new();
        let key = "a".to_string();
        registry.register(key.clone());

        let generation = match registry.try_begin(&key, None) {
            LockAttempt::Acquired(t) => t.generation(),
            _ => panic!("should acquire"),
        };

        registry.deregister(&key);
        registry.register(key.clone());

        assert!(!registry.publish(&key, generation, true));
        assert!(registry.cached(&key).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn throttle_refuses_recent_attempts() {
        let registry: Registry<String, bool> = Registry::new();
        let key = "a".to_string();
        registry.register(key.clone());
        let min = Some(Duration::from_secs(10));

        assert!(matches!(registry.try_begin(&key, min), LockAttempt::Acquired(_)));
        assert!(matches!(registry.try_begin(&key, min), LockAttempt::Throttled));

        tokio::time::advance(Duration::from_secs(11)).await;
        assert!(matches!(registry.try_begin(&key, min), LockAttempt::Acquired(_)));
    }
}
