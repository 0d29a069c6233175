//! A typed map behind a reader-writer lock.
//!
//! Reads take the shared lock and clone the value out; mutations take the
//! exclusive lock for the duration of the critical section only. [`SyncMap::update`]
//! runs its closure while holding the write lock, so read-modify-write on a
//! single key is atomic with respect to every other operation on the map.
//!
//! No ordering is guaranteed across keys.

use std::collections::HashMap;
use std::hash::Hash;

use parking_lot::RwLock;

/// Concurrent keyed map with atomic per-key read-modify-write.
#[derive(Debug)]
pub struct SyncMap<K, V> {
    inner: RwLock<HashMap<K, V>>,
}

impl<K, V> Default for SyncMap<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> SyncMap<K, V> {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(HashMap::new()),
        }
    }
}

impl<K: Eq + Hash, V: Clone> SyncMap<K, V> {
    /// Look up a value, cloning it out from under the shared lock.
    pub fn get(&self, key: &K) -> Option<V> {
        self.inner.read().get(key).cloned()
    }

    /// Bind `key` to `value`, replacing any previous binding.
    pub fn insert(&self, key: K, value: V) {
        self.inner.write().insert(key, value);
    }

    /// Remove a binding, returning the removed value if one existed.
    pub fn remove(&self, key: &K) -> Option<V> {
        self.inner.write().remove(key)
    }

    /// Atomically transform the binding for `key`.
    ///
    /// The closure receives the current value (if any) and returns the new
    /// binding; returning `None` deletes the key. The write lock is held
    /// across the whole call, so the transformation cannot interleave with
    /// other operations on this map.
    pub fn update<F>(&self, key: K, f: F)
    where
        F: FnOnce(Option<V>) -> Option<V>,
    {
        let mut guard = self.inner.write();
        let current = guard.remove(&key);
        if let Some(next) = f(current) {
            guard.insert(key, next);
        }
    }

    /// Point-in-time copy of all values.
    pub fn values(&self) -> Vec<V> {
        self.inner.read().values().cloned().collect()
    }

    /// Number of bindings.
    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn insert_get_remove() {
        let map = SyncMap::new();
        map.insert("a", 1);
        assert_eq!(map.get(&"a"), Some(1));
        assert_eq!(map.remove(&"a"), Some(1));
        assert_eq!(map.get(&"a"), None);
    }

    #[test]
    fn update_inserts_when_absent() {
        let map = SyncMap::new();
        map.update("a", |old| {
            assert!(old.is_none());
            Some(1)
        });
        assert_eq!(map.get(&"a"), Some(1));
    }

    #[test]
    fn update_can_delete() {
        let map = SyncMap::new();
        map.insert("a", 1);
        map.update("a", |_| None);
        assert!(map.is_empty());
    }

    #[test]
    fn values_is_a_snapshot() {
        let map = SyncMap::new();
        map.insert("a", 1);
        map.insert("b", 2);
        let mut values = map.values();
        values.sort_unstable();
        assert_eq!(values, vec![1, 2]);
    }

    #[test]
    fn concurrent_updates_do_not_lose_increments() {
        let map = Arc::new(SyncMap::new());
        map.insert("n", 0u64);

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let map = Arc::clone(&map);
                std::thread::spawn(move || {
                    for _ in 0..1000 {
                        map.update("n", |old| old.map(|v| v + 1));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(map.get(&"n"), Some(8000));
    }
}
