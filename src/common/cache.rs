//! In-memory cache for storing key-value pairs.
//!
//! Uses moka's high-performance concurrent cache implementation.

use moka::sync::Cache;

/// Thread-safe in-memory cache with configurable capacity.
///
/// Used for memoizing expression safety verdicts
/// (`MemCache<String, Result<(), String>>`), so hot transition conditions
/// are scanned against the denylist only once.
///
/// Entries are evicted once capacity is exceeded; never store state here
/// that cannot be recomputed.
#[derive(Clone)]
pub struct MemCache<K, V> {
    entries: Cache<K, V>,
}

impl<K, V> MemCache<K, V>
where
    K: std::hash::Hash + Eq + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    /// Allocate a new [`MemCache`].
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Cache::new(capacity as u64),
        }
    }

    /// Return the cached value for `key`, computing and caching it on a miss.
    pub fn get_or_insert_with(
        &self,
        key: K,
        init: impl FnOnce() -> V,
    ) -> V {
        self.entries.get_with(key, init)
    }
}
