//! Lock-light concurrent map with swap-based clearing.

use std::fmt;
use std::hash::Hash;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Arc;

use arc_swap::ArcSwap;
use crossbeam_utils::Backoff;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use super::Map;

/// A thread-safe map delegating to a sharded concurrent store, with an
/// atomically maintained size counter.
///
/// # Clearing
///
/// [`Map::clear`] does not lock the whole map: it raises a `clearing` flag,
/// publishes a fresh empty store, zeroes the size, and drops the flag.
/// Operations that dereference the store spin briefly (with backoff) while
/// the flag is up, so they observe the fresh store right after the swap
/// point. Under concurrent mutation [`Map::size`] is an approximation; it
/// is exact in quiescent states.
pub struct ConcurrentMap<K, V> {
    store: ArcSwap<DashMap<K, Arc<V>>>,
    size: AtomicI64,
    clearing: AtomicBool,
}

impl<K: Eq + Hash, V> ConcurrentMap<K, V> {
    /// Creates an empty map.
    #[must_use]
    pub fn new() -> Self {
        Self {
            store: ArcSwap::from_pointee(DashMap::new()),
            size: AtomicI64::new(0),
            clearing: AtomicBool::new(false),
        }
    }

    /// Returns the current store, waiting out an in-flight clear.
    fn store(&self) -> Arc<DashMap<K, Arc<V>>> {
        let backoff = Backoff::new();
        while self.clearing.load(Ordering::Acquire) {
            backoff.snooze();
        }
        self.store.load_full()
    }
}

impl<K: Eq + Hash, V> Default for ConcurrentMap<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Eq + Hash + Clone, V> Map<K, V> for ConcurrentMap<K, V> {
    fn clear(&self) {
        self.clearing.store(true, Ordering::Release);
        self.store.store(Arc::new(DashMap::new()));
        self.size.store(0, Ordering::Release);
        self.clearing.store(false, Ordering::Release);
        tracing::trace!("concurrent map cleared");
    }

    fn compute_if_absent<F>(&self, key: K, mapping: F) -> Arc<V>
    where
        F: FnOnce(&K) -> V,
    {
        if let Some(existing) = self.get(&key) {
            return existing;
        }
        // Compute outside the shard lock; racing computers may both get
        // here, but only one insertion wins.
        let computed = Arc::new(mapping(&key));
        match self.store().entry(key) {
            Entry::Occupied(entry) => Arc::clone(entry.get()),
            Entry::Vacant(entry) => {
                entry.insert(Arc::clone(&computed));
                self.size.fetch_add(1, Ordering::AcqRel);
                computed
            }
        }
    }

    fn contains_key(&self, key: &K) -> bool {
        self.get(key).is_some()
    }

    fn get(&self, key: &K) -> Option<Arc<V>> {
        self.store().get(key).map(|entry| Arc::clone(entry.value()))
    }

    fn get_or_default(&self, key: &K, default: Arc<V>) -> Arc<V> {
        self.get(key).unwrap_or(default)
    }

    fn is_empty(&self) -> bool {
        self.size() == 0
    }

    fn key_set(&self) -> Vec<K> {
        let store = self.store();
        store.iter().map(|entry| entry.key().clone()).collect()
    }

    fn put(&self, key: K, value: Arc<V>) -> Option<Arc<V>> {
        let previous = self.store().insert(key, value);
        if previous.is_none() {
            self.size.fetch_add(1, Ordering::AcqRel);
        }
        previous
    }

    fn remove(&self, key: &K) -> Option<Arc<V>> {
        let removed = self.store().remove(key);
        removed.map(|(_, value)| {
            self.size.fetch_sub(1, Ordering::AcqRel);
            value
        })
    }

    fn size(&self) -> usize {
        let size = self.size.load(Ordering::Acquire);
        usize::try_from(size).unwrap_or(0)
    }

    fn values(&self) -> Vec<Arc<V>> {
        let store = self.store();
        store.iter().map(|entry| Arc::clone(entry.value())).collect()
    }

    fn for_each<F>(&self, mut f: F)
    where
        F: FnMut(&K, &Arc<V>),
    {
        let store = self.store();
        for entry in store.iter() {
            f(entry.key(), entry.value());
        }
    }
}

impl<K: Eq + Hash, V> fmt::Debug for ConcurrentMap<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConcurrentMap")
            .field("size", &self.size.load(Ordering::Acquire))
            .field("clearing", &self.clearing.load(Ordering::Acquire))
            .finish()
    }
}
