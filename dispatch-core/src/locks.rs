//! Keyed exclusive locks.
//!
//! The registry hands out one mutex per key so work on different couriers
//! (or different batch orders) never contends. Entries are created on first
//! use and dropped again once no guard or waiter refers to them.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;

use parking_lot::{Mutex, RawMutex, lock_api::ArcMutexGuard};

/// Guard returned by [`LockRegistry::lock`]. The key stays locked until the
/// guard is dropped.
pub type KeyGuard = ArcMutexGuard<RawMutex, ()>;

/// A registry of per-key mutexes.
#[derive(Debug)]
pub struct LockRegistry<K> {
    entries: Mutex<HashMap<K, Arc<Mutex<()>>>>,
}

impl<K> Default for LockRegistry<K> {
    fn default() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }
}

impl<K> LockRegistry<K>
where
    K: Eq + Hash + Clone,
{
    /// Block until `key` is free, then hold it until the guard drops.
    pub fn lock(&self, key: &K) -> KeyGuard {
        let slot = {
            let mut entries = self.entries.lock();
            // Only the registry holds an idle slot; anything else is a
            // guard or a waiter.
            entries.retain(|_, slot| Arc::strong_count(slot) > 1);
            Arc::clone(entries.entry(key.clone()).or_default())
        };
        slot.lock_arc()
    }

    /// Number of keys currently tracked.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Report whether no keys are tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
