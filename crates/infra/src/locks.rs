//! Per-key mutual exclusion.
//!
//! Every operation locks all keys it touches before opening its unit of work
//! and holds them until commit (or rollback). Keys are taken all at once, so
//! two operations with overlapping key sets can never deadlock; operations on
//! disjoint keys run in parallel.

use std::collections::BTreeSet;
use std::sync::{Condvar, Mutex};

use stockledger_core::{ItemId, LocationId};

use crate::error::StoreError;

/// Lock key for one stock position.
pub type StockKey = (LocationId, ItemId);

#[derive(Debug)]
pub struct KeyLocks<K: Ord + Clone> {
    held: Mutex<BTreeSet<K>>,
    released: Condvar,
}

impl<K: Ord + Clone> Default for KeyLocks<K> {
    fn default() -> Self {
        Self {
            held: Mutex::new(BTreeSet::new()),
            released: Condvar::new(),
        }
    }
}

impl<K: Ord + Clone> KeyLocks<K> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Block until every key in `keys` is free, then hold them all.
    pub fn lock_all(&self, keys: impl IntoIterator<Item = K>) -> Result<KeyGuard<'_, K>, StoreError> {
        let keys: BTreeSet<K> = keys.into_iter().collect();

        let mut held = self.held.lock().map_err(|_| StoreError::Poisoned)?;
        while keys.iter().any(|k| held.contains(k)) {
            held = self.released.wait(held).map_err(|_| StoreError::Poisoned)?;
        }
        held.extend(keys.iter().cloned());

        Ok(KeyGuard { locks: self, keys })
    }

    pub fn lock(&self, key: K) -> Result<KeyGuard<'_, K>, StoreError> {
        self.lock_all([key])
    }

    #[cfg(test)]
    fn held_count(&self) -> usize {
        self.held.lock().map(|h| h.len()).unwrap_or(0)
    }
}

/// Releases its keys on drop.
#[derive(Debug)]
pub struct KeyGuard<'a, K: Ord + Clone> {
    locks: &'a KeyLocks<K>,
    keys: BTreeSet<K>,
}

impl<K: Ord + Clone> Drop for KeyGuard<'_, K> {
    fn drop(&mut self) {
        let mut held = self
            .locks
            .held
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        for key in &self.keys {
            held.remove(key);
        }
        drop(held);
        self.locks.released.notify_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;
    use std::time::Duration;

    #[test]
    fn guard_releases_on_drop() {
        let locks = KeyLocks::<u32>::new();
        {
            let guard = locks.lock_all([3, 1, 1]).unwrap();
            assert_eq!(guard.keys.iter().copied().collect::<Vec<_>>(), vec![1, 3]);
            assert_eq!(locks.held_count(), 2);
        }
        assert_eq!(locks.held_count(), 0);
    }

    #[test]
    fn overlapping_sets_are_serialized() {
        let locks = Arc::new(KeyLocks::<u32>::new());
        let inside = Arc::new(AtomicUsize::new(0));
        let max_inside = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let locks = locks.clone();
                let inside = inside.clone();
                let max_inside = max_inside.clone();
                thread::spawn(move || {
                    // Every set shares key 0; alternate the order of the rest.
                    let keys = if i % 2 == 0 { vec![0, 1, 2] } else { vec![2, 1, 0] };
                    let _guard = locks.lock_all(keys).unwrap();
                    let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
                    max_inside.fetch_max(now, Ordering::SeqCst);
                    thread::sleep(Duration::from_millis(5));
                    inside.fetch_sub(1, Ordering::SeqCst);
                })
            })
            .collect();

        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(max_inside.load(Ordering::SeqCst), 1);
        assert_eq!(locks.held_count(), 0);
    }

    #[test]
    fn disjoint_keys_do_not_block() {
        let locks = KeyLocks::<u32>::new();
        let _a = locks.lock(1).unwrap();
        let _b = locks.lock(2).unwrap();
        assert_eq!(locks.held_count(), 2);
    }
}
