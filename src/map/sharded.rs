//! Hash-partitioned map over independently locked shards.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use fnv::FnvHasher;

use super::{Map, SynchronizedMap};

/// A thread-safe map routing each key to one of `N` independently locked
/// [`SynchronizedMap`] shards by key hash.
///
/// Key-addressed operations touch exactly one shard. Aggregate operations
/// visit the shards one by one without a cross-shard lock, so they observe
/// a snapshot rather than a globally atomic view.
pub struct ShardedMap<K, V> {
    shards: Vec<SynchronizedMap<K, V>>,
    hasher: Box<dyn Fn(&K) -> u64 + Send + Sync>,
}

impl<K: Eq + Hash + Clone, V> ShardedMap<K, V> {
    /// Creates a map with `shards` partitions, routed by the 64-bit FNV-1a
    /// hash of the key.
    ///
    /// # Panics
    /// Panics if `shards` is zero.
    #[must_use]
    pub fn new(shards: usize) -> Self {
        Self::with_hasher(shards, |key: &K| {
            let mut hasher = FnvHasher::default();
            key.hash(&mut hasher);
            hasher.finish()
        })
    }
}

impl<K: Eq + Clone, V> ShardedMap<K, V> {
    /// Creates a map with `shards` partitions routed by a caller-supplied
    /// hash function.
    ///
    /// # Panics
    /// Panics if `shards` is zero.
    #[must_use]
    pub fn with_hasher<F>(shards: usize, hasher: F) -> Self
    where
        F: Fn(&K) -> u64 + Send + Sync + 'static,
    {
        assert!(shards >= 1, "nonpositive shards: {shards}");
        Self {
            shards: (0..shards).map(|_| SynchronizedMap::new()).collect(),
            hasher: Box::new(hasher),
        }
    }

    /// Returns the number of partitions.
    #[must_use]
    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }

    /// Returns the shard responsible for `key`.
    fn shard(&self, key: &K) -> &SynchronizedMap<K, V> {
        let index = (self.hasher)(key) % self.shards.len() as u64;
        let index = usize::try_from(index).expect("shard index fits in usize");
        &self.shards[index]
    }
}

impl<K: Eq + Hash + Clone, V> Map<K, V> for ShardedMap<K, V> {
    fn clear(&self) {
        for shard in &self.shards {
            shard.clear();
        }
    }

    fn compute_if_absent<F>(&self, key: K, mapping: F) -> Arc<V>
    where
        F: FnOnce(&K) -> V,
    {
        self.shard(&key).compute_if_absent(key, mapping)
    }

    fn contains_key(&self, key: &K) -> bool {
        self.shard(key).contains_key(key)
    }

    fn get(&self, key: &K) -> Option<Arc<V>> {
        self.shard(key).get(key)
    }

    fn get_or_default(&self, key: &K, default: Arc<V>) -> Arc<V> {
        self.shard(key).get_or_default(key, default)
    }

    fn is_empty(&self) -> bool {
        self.shards.iter().all(SynchronizedMap::is_empty)
    }

    fn key_set(&self) -> Vec<K> {
        let mut keys = Vec::new();
        for shard in &self.shards {
            keys.extend(shard.key_set());
        }
        keys
    }

    fn put(&self, key: K, value: Arc<V>) -> Option<Arc<V>> {
        self.shard(&key).put(key, value)
    }

    fn remove(&self, key: &K) -> Option<Arc<V>> {
        self.shard(key).remove(key)
    }

    fn size(&self) -> usize {
        self.shards.iter().map(Map::size).sum()
    }

    fn values(&self) -> Vec<Arc<V>> {
        let mut values = Vec::new();
        for shard in &self.shards {
            values.extend(shard.values());
        }
        values
    }

    fn for_each<F>(&self, mut f: F)
    where
        F: FnMut(&K, &Arc<V>),
    {
        for shard in &self.shards {
            shard.for_each(&mut f);
        }
    }
}

impl<K, V> fmt::Debug for ShardedMap<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShardedMap")
            .field("shards", &self.shards.len())
            .finish_non_exhaustive()
    }
}
