//! A read-write-locked hash map.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;

use parking_lot::RwLock;

use super::Map;

/// A thread-safe map guarding a hash map with a single read-write lock.
///
/// Also serves as the per-shard store of a
/// [`ShardedMap`](super::ShardedMap).
#[derive(Debug)]
pub struct SynchronizedMap<K, V> {
    store: RwLock<HashMap<K, Arc<V>>>,
}

impl<K, V> SynchronizedMap<K, V> {
    /// Creates an empty map.
    #[must_use]
    pub fn new() -> Self {
        Self {
            store: RwLock::new(HashMap::new()),
        }
    }
}

impl<K, V> Default for SynchronizedMap<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Eq + Hash + Clone, V> Map<K, V> for SynchronizedMap<K, V> {
    fn clear(&self) {
        self.store.write().clear();
    }

    fn compute_if_absent<F>(&self, key: K, mapping: F) -> Arc<V>
    where
        F: FnOnce(&K) -> V,
    {
        let mut store = self.store.write();
        if let Some(existing) = store.get(&key) {
            return Arc::clone(existing);
        }
        let computed = Arc::new(mapping(&key));
        store.insert(key, Arc::clone(&computed));
        computed
    }

    fn contains_key(&self, key: &K) -> bool {
        self.store.read().contains_key(key)
    }

    fn get(&self, key: &K) -> Option<Arc<V>> {
        self.store.read().get(key).map(Arc::clone)
    }

    fn get_or_default(&self, key: &K, default: Arc<V>) -> Arc<V> {
        self.get(key).unwrap_or(default)
    }

    fn is_empty(&self) -> bool {
        self.store.read().is_empty()
    }

    fn key_set(&self) -> Vec<K> {
        self.store.read().keys().cloned().collect()
    }

    fn put(&self, key: K, value: Arc<V>) -> Option<Arc<V>> {
        self.store.write().insert(key, value)
    }

    fn remove(&self, key: &K) -> Option<Arc<V>> {
        self.store.write().remove(key)
    }

    fn size(&self) -> usize {
        self.store.read().len()
    }

    fn values(&self) -> Vec<Arc<V>> {
        self.store.read().values().map(Arc::clone).collect()
    }

    fn for_each<F>(&self, mut f: F)
    where
        F: FnMut(&K, &Arc<V>),
    {
        let store = self.store.read();
        for (key, value) in store.iter() {
            f(key, value);
        }
    }
}
