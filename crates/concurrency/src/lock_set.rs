//! Keyed set of timed exclusive locks
//!
//! Used by the container to stop two installs from racing on the same
//! location or symbolic name. Locks are reentrant per thread and released
//! when the returned guard is dropped.

use crate::LockError;
use parking_lot::{Condvar, Mutex};
use rustc_hash::FxHashMap;
use std::hash::Hash;
use std::thread::{self, ThreadId};
use std::time::{Duration, Instant};

#[derive(Debug)]
struct Entry {
    owner: ThreadId,
    holds: usize,
}

/// Set of per-key exclusive locks
#[derive(Debug)]
pub struct LockSet<K: Eq + Hash + Clone> {
    entries: Mutex<FxHashMap<K, Entry>>,
    released: Condvar,
}

impl<K: Eq + Hash + Clone> LockSet<K> {
    /// Create an empty lock set
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(FxHashMap::default()),
            released: Condvar::new(),
        }
    }

    /// Try to lock `key`, waiting at most `timeout`
    ///
    /// # Errors
    ///
    /// [`LockError::Timeout`] if another thread held the key for the whole timeout.
    pub fn try_lock(&self, key: K, timeout: Duration) -> Result<LockSetGuard<'_, K>, LockError> {
        let me = thread::current().id();
        let deadline = Instant::now() + timeout;
        let mut entries = self.entries.lock();

        loop {
            match entries.get_mut(&key) {
                None => {
                    entries.insert(key.clone(), Entry { owner: me, holds: 1 });
                    break;
                }
                Some(entry) if entry.owner == me => {
                    entry.holds += 1;
                    break;
                }
                Some(_) => {}
            }
            if Instant::now() >= deadline {
                return Err(LockError::Timeout(timeout));
            }
            self.released.wait_until(&mut entries, deadline);
        }

        Ok(LockSetGuard { set: self, key })
    }

    /// Whether any thread currently holds `key`
    pub fn is_locked(&self, key: &K) -> bool {
        self.entries.lock().contains_key(key)
    }

    fn unlock(&self, key: &K) {
        let mut entries = self.entries.lock();
        let remove = match entries.get_mut(key) {
            Some(entry) => {
                entry.holds -= 1;
                entry.holds == 0
            }
            None => false,
        };
        if remove {
            entries.remove(key);
            drop(entries);
            self.released.notify_all();
        }
    }
}

impl<K: Eq + Hash + Clone> Default for LockSet<K> {
    fn default() -> Self {
        Self::new()
    }
}

/// Holds one key of a [`LockSet`]; releases it on drop
#[must_use = "the key is released as soon as the guard is dropped"]
#[derive(Debug)]
pub struct LockSetGuard<'a, K: Eq + Hash + Clone> {
    set: &'a LockSet<K>,
    key: K,
}

impl<K: Eq + Hash + Clone> LockSetGuard<'_, K> {
    /// The locked key
    pub fn key(&self) -> &K {
        &self.key
    }
}

impl<K: Eq + Hash + Clone> Drop for LockSetGuard<'_, K> {
    fn drop(&mut self) {
        self.set.unlock(&self.key);
    }
}
