//! Per-key commit locks

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

/// Owner id meaning "free"
pub const UNLOCKED: u64 = 0;

/// Advisory lock cell holding the owning transaction id
#[derive(Debug, Default)]
pub struct KeyLock {
    owner: AtomicU64,
}

impl KeyLock {
    /// CAS free → `tx_id`
    pub fn try_acquire(&self, tx_id: u64) -> bool {
        self.owner
            .compare_exchange(UNLOCKED, tx_id, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// CAS `tx_id` → free; a lock held by someone else is left alone
    pub fn release(&self, tx_id: u64) {
        let _ = self
            .owner
            .compare_exchange(tx_id, UNLOCKED, Ordering::AcqRel, Ordering::Acquire);
    }

    pub fn owner(&self) -> u64 {
        self.owner.load(Ordering::Acquire)
    }
}

/// Lazily populated key → lock map
///
/// Once the table grows past `sweep_threshold`, free locks that nobody
/// else references are evicted before a new one is inserted.
pub struct LockTable {
    locks: Mutex<HashMap<String, Arc<KeyLock>>>,
    sweep_threshold: usize,
}

impl LockTable {
    pub fn new(sweep_threshold: usize) -> Self {
        Self {
            locks: Mutex::new(HashMap::new()),
            sweep_threshold: sweep_threshold.max(1),
        }
    }

    /// Lock for `key`, created if absent
    pub fn lock_for(&self, key: &str) -> Arc<KeyLock> {
        let mut locks = self.locks.lock();
        if let Some(lock) = locks.get(key) {
            return Arc::clone(lock);
        }

        if locks.len() >= self.sweep_threshold {
            let before = locks.len();
            locks.retain(|_, lock| Arc::strong_count(lock) > 1 || lock.owner() != UNLOCKED);
            tracing::debug!(before, after = locks.len(), "swept lock table");
        }

        let lock = Arc::new(KeyLock::default());
        locks.insert(key.to_string(), Arc::clone(&lock));
        lock
    }

    /// Lock for `key` if one exists; a missing entry means nobody holds it
    pub fn peek(&self, key: &str) -> Option<Arc<KeyLock>> {
        self.locks.lock().get(key).cloned()
    }

    pub fn len(&self) -> usize {
        self.locks.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.lock().is_empty()
    }
}

/// Locks held by one committing transaction, released on drop
pub(crate) struct HeldLocks {
    tx_id: u64,
    locks: Vec<Arc<KeyLock>>,
}

impl HeldLocks {
    /// Acquire every key's lock, in sorted key order; all or nothing
    pub(crate) fn acquire<'a>(
        table: &LockTable,
        tx_id: u64,
        keys: impl IntoIterator<Item = &'a String>,
    ) -> Option<Self> {
        let mut keys: Vec<&String> = keys.into_iter().collect();
        keys.sort();

        let mut held = Self {
            tx_id,
            locks: Vec::with_capacity(keys.len()),
        };
        for key in keys {
            let lock = table.lock_for(key);
            if !lock.try_acquire(tx_id) {
                return None;
            }
            held.locks.push(lock);
        }
        Some(held)
    }
}

impl Drop for HeldLocks {
    fn drop(&mut self) {
        for lock in &self.locks {
            lock.release(self.tx_id);
        }
    }
}
