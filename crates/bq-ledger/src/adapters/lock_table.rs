//! # Row Lock Table
//!
//! Exclusive, non-reentrant locks keyed by [`LockKey`].
//!
//! A lock set is always acquired in ascending key order, so two operations
//! touching overlapping rows queue behind each other instead of
//! deadlocking. A deadline bounds every wait.

use std::collections::{BTreeSet, HashSet};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use crate::ports::LockKey;

/// The deadline passed while waiting for `key`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockTimeout {
    pub key: LockKey,
    pub waited: Duration,
}

/// Set of currently held row locks.
#[derive(Debug, Default)]
pub struct LockTable {
    held: Mutex<HashSet<LockKey>>,
    released: Condvar,
}

impl LockTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire every key in ascending order, or none of them.
    pub fn acquire_all(
        &self,
        keys: &BTreeSet<LockKey>,
        timeout: Duration,
    ) -> Result<(), LockTimeout> {
        let started = Instant::now();
        let deadline = started + timeout;
        let mut acquired: Vec<LockKey> = Vec::with_capacity(keys.len());

        for key in keys {
            let mut held = self.held.lock();
            while held.contains(key) {
                if self.released.wait_until(&mut held, deadline).timed_out() && held.contains(key) {
                    drop(held);
                    self.release(acquired.iter());
                    return Err(LockTimeout {
                        key: *key,
                        waited: started.elapsed(),
                    });
                }
            }
            held.insert(*key);
            acquired.push(*key);
        }
        Ok(())
    }

    pub fn release<'a>(&self, keys: impl IntoIterator<Item = &'a LockKey>) {
        let mut held = self.held.lock();
        for key in keys {
            held.remove(key);
        }
        drop(held);
        self.released.notify_all();
    }

    pub fn is_held(&self, key: &LockKey) -> bool {
        self.held.lock().contains(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared_types::{AccountId, Category};
    use std::sync::Arc;
    use std::thread;

    fn keys(ids: &[u64]) -> BTreeSet<LockKey> {
        ids.iter().map(|&id| LockKey::Account(AccountId(id))).collect()
    }

    #[test]
    fn test_acquire_and_release() {
        let table = LockTable::new();
        table.acquire_all(&keys(&[1, 2]), Duration::from_millis(10)).unwrap();
        assert!(table.is_held(&LockKey::Account(AccountId(1))));
        table.release(keys(&[1, 2]).iter());
        assert!(!table.is_held(&LockKey::Account(AccountId(1))));
    }

    #[test]
    fn test_timeout_releases_partial_set() {
        let table = LockTable::new();
        table.acquire_all(&keys(&[2]), Duration::from_millis(10)).unwrap();

        let err = table
            .acquire_all(&keys(&[1, 2]), Duration::from_millis(20))
            .unwrap_err();
        assert_eq!(err.key, LockKey::Account(AccountId(2)));
        assert!(err.waited >= Duration::from_millis(20));
        // key 1 was taken first and must have been given back
        assert!(!table.is_held(&LockKey::Account(AccountId(1))));
    }

    #[test]
    fn test_waiter_proceeds_after_release() {
        let table = Arc::new(LockTable::new());
        let pool = [LockKey::Pool(Category::Grocery)].into_iter().collect::<BTreeSet<_>>();
        table.acquire_all(&pool, Duration::from_millis(10)).unwrap();

        let waiter = {
            let table = Arc::clone(&table);
            let pool = pool.clone();
            thread::spawn(move || table.acquire_all(&pool, Duration::from_secs(5)))
        };
        thread::sleep(Duration::from_millis(20));
        table.release(pool.iter());
        assert!(waiter.join().unwrap().is_ok());
        assert!(table.is_held(&LockKey::Pool(Category::Grocery)));
    }
}
