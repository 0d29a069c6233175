//! Time-bounded cache used by both upstream clients.

use std::hash::Hash;
use std::time::{Duration, Instant};

use lfg_types::SyncMap;

#[derive(Clone)]
struct Entry<V> {
    value: V,
    inserted_at: Instant,
}

/// A keyed cache whose entries expire `ttl` after insertion.
///
/// Values are cloned out on read. Expired entries are dropped lazily on the
/// read path; the map never grows beyond the set of keys seen within one TTL
/// window plus stragglers awaiting their next lookup.
pub struct TtlCache<K, V> {
    entries: SyncMap<K, Entry<V>>,
    ttl: Duration,
}

impl<K: Eq + Hash + Clone, V: Clone> TtlCache<K, V> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: SyncMap::new(),
            ttl,
        }
    }

    /// Look up `key`, removing and ignoring the entry if it has expired.
    pub fn get(&self, key: &K) -> Option<V> {
        let entry = self.entries.get(key)?;
        if entry.inserted_at.elapsed() > self.ttl {
            self.entries.remove(key);
            return None;
        }
        Some(entry.value)
    }

    /// Cache `value` under `key`, resetting its expiry clock.
    pub fn insert(&self, key: K, value: V) {
        self.entries.insert(
            key,
            Entry {
                value,
                inserted_at: Instant::now(),
            },
        );
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
