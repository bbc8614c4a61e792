//! Thread-safe associative containers.
//!
//! Three implementations share the [`Map`] surface:
//!
//! - [`ConcurrentMap`]: lock-light, backed by a swappable concurrent store
//! - [`SynchronizedMap`]: a single read-write-locked hash map
//! - [`ShardedMap`]: hash-partitioned composition over synchronized shards
//!
//! Values are shared as `Arc<V>`; maps hand out clones of the stored
//! handle, never copies of the value.

mod concurrent;
mod sharded;
mod synchronized;

use std::sync::Arc;

pub use concurrent::ConcurrentMap;
pub use sharded::ShardedMap;
pub use synchronized::SynchronizedMap;

/// An object that maps keys to values, safe for concurrent use.
///
/// Aggregate operations ([`Map::size`], [`Map::key_set`], [`Map::values`],
/// [`Map::is_empty`]) observe a snapshot, not a globally atomic view;
/// under concurrent mutation they are approximations that become exact in
/// quiescent states.
pub trait Map<K, V> {
    /// Removes all mappings.
    fn clear(&self);

    /// Returns the mapped value, computing and inserting it from `mapping`
    /// if the key is absent.
    ///
    /// Racing computations may invoke `mapping` more than once, but all
    /// callers observe the single winning value.
    fn compute_if_absent<F>(&self, key: K, mapping: F) -> Arc<V>
    where
        F: FnOnce(&K) -> V;

    /// Returns true if a mapping for `key` exists.
    fn contains_key(&self, key: &K) -> bool;

    /// Returns the value mapped to `key`, if any.
    fn get(&self, key: &K) -> Option<Arc<V>>;

    /// Returns the value mapped to `key`, or `default` if there is none.
    fn get_or_default(&self, key: &K, default: Arc<V>) -> Arc<V>;

    /// Returns true if the map holds no mappings.
    fn is_empty(&self) -> bool;

    /// Returns the keys currently contained, in unspecified order.
    fn key_set(&self) -> Vec<K>;

    /// Associates `value` with `key`, returning the previous value if the
    /// key was present.
    fn put(&self, key: K, value: Arc<V>) -> Option<Arc<V>>;

    /// Removes the mapping for `key`, returning the previous value if any.
    fn remove(&self, key: &K) -> Option<Arc<V>>;

    /// Returns the number of mappings.
    fn size(&self) -> usize;

    /// Returns the values currently contained, in unspecified order.
    fn values(&self) -> Vec<Arc<V>>;

    /// Visits every mapping, in unspecified order.
    ///
    /// Safe under concurrent mutation; concurrent changes may or may not be
    /// observed.
    fn for_each<F>(&self, f: F)
    where
        F: FnMut(&K, &Arc<V>);
}
