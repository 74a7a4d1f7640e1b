use crate::clock::{Clock, SystemClock};
use std::collections::{HashMap, HashSet};
use std::hash::Hash;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    pub value: V,
    pub fetched_at: Instant,
}

impl<V> CacheEntry<V> {
    pub fn age(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.fetched_at)
    }

    /// Fresh means strictly younger than `ttl`.
    pub fn is_fresh(&self, now: Instant, ttl: Duration) -> bool {
        self.age(now) < ttl
    }
}

/// Key/value map whose entries silently expire `ttl` after they were saved.
///
/// Expired entries are never purged on read; they are only treated as absent
/// by [`ExpiringStore::try_get_all`].
pub struct ExpiringStore<K, V> {
    entries: RwLock<HashMap<K, CacheEntry<V>>>,
    ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl<K, V> ExpiringStore<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn new(ttl: Duration) -> Self {
        Self::with_clock(ttl, Arc::new(SystemClock))
    }

    pub fn with_clock(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl,
            clock,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// All-or-nothing lookup: `Some` only when every key has a fresh entry.
    pub fn try_get_all(&self, keys: &HashSet<K>) -> Option<HashMap<K, V>> {
        let now = self.clock.now();
        let entries = self.read();

        let mut values = HashMap::with_capacity(keys.len());
        for key in keys {
            let entry = entries
                .get(key)
                .filter(|entry| entry.is_fresh(now, self.ttl))?;
            values.insert(key.clone(), entry.value.clone());
        }
        Some(values)
    }

    /// Unconditional read of whatever is stored for `keys`, fresh or not.
    pub fn get(&self, keys: &HashSet<K>) -> HashMap<K, V> {
        let entries = self.read();
        keys.iter()
            .filter_map(|key| {
                entries
                    .get(key)
                    .map(|entry| (key.clone(), entry.value.clone()))
            })
            .collect()
    }

    /// Inserts or overwrites every value, stamped with the same instant.
    pub fn save(&self, values: HashMap<K, V>) {
        let fetched_at = self.clock.now();
        let mut entries = self.write();
        for (key, value) in values {
            entries.insert(key, CacheEntry { value, fetched_at });
        }
    }

    /// Drops expired entries. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        let mut entries = self.write();
        let before = entries.len();
        entries.retain(|_, entry| entry.is_fresh(now, self.ttl));
        before - entries.len()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<K, CacheEntry<V>>> {
        self.entries.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<K, CacheEntry<V>>> {
        self.entries.write().unwrap_or_else(PoisonError::into_inner)
    }
}
