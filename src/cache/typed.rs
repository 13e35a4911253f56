//! Typed snapshot cache wrapper around Moka.

use std::hash::Hash;
use std::sync::Arc;

use moka::sync::Cache;

use super::CacheConfig;

/// A typed cache that publishes immutable snapshots for concurrent readers.
///
/// - Thread-safe, lock-light reads (`get` never blocks on I/O)
/// - LRU-based with optional TTL/TTI
/// - Clone-friendly (cloning is cheap, shares the same underlying cache)
///
/// Values are replaced whole. Callers publish `Arc<T>` snapshots, so a
/// reader holding the previous snapshot keeps a fully consistent view while
/// a new one is swapped in.
pub struct TypedCache<K, V>
where
    K: Hash + Eq + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    inner: Arc<Cache<K, V>>,
    name: Arc<str>,
}

// Manual Clone implementation that doesn't require K: Clone, V: Clone
impl<K, V> Clone for TypedCache<K, V>
where
    K: Hash + Eq + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            name: Arc::clone(&self.name),
        }
    }
}

impl<K, V> TypedCache<K, V>
where
    K: Hash + Eq + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    /// Create a new typed cache with the given name and config.
    pub fn new(name: impl Into<Arc<str>>, config: CacheConfig) -> Self {
        let mut builder = Cache::builder().max_capacity(config.max_capacity);

        if let Some(ttl) = config.ttl {
            builder = builder.time_to_live(ttl);
        }

        if let Some(tti) = config.tti {
            builder = builder.time_to_idle(tti);
        }

        Self {
            inner: Arc::new(builder.build()),
            name: name.into(),
        }
    }

    /// Get the name of this cache.
    #[allow(dead_code)]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Insert a key-value pair into the cache.
    #[allow(dead_code)]
    pub fn insert(&self, key: K, value: V) {
        self.inner.insert(key, value);
    }

    /// Get a value from the cache.
    ///
    /// Returns `Some(value)` if the key exists and hasn't expired.
    pub fn get(&self, key: &K) -> Option<V> {
        self.inner.get(key)
    }

    /// Remove a key from the cache.
    #[allow(dead_code)]
    pub fn invalidate(&self, key: &K) {
        self.inner.invalidate(key);
    }

    /// Atomically replace the value for `key`.
    ///
    /// `f` receives the currently published value (if any) and returns the
    /// value to publish; no other update for `key` can interleave. Returns
    /// the published value. This is how version-guarded snapshot publication
    /// keeps a slow refresh from clobbering a fresher write.
    pub fn upsert_with<F>(&self, key: K, f: F) -> V
    where
        F: FnOnce(Option<V>) -> V,
        K: Clone,
    {
        self.inner
            .entry(key)
            .and_upsert_with(|entry| f(entry.map(|e| e.into_value())))
            .into_value()
    }

    /// Get the number of entries in the cache.
    ///
    /// Note: This may not be perfectly accurate due to concurrent operations.
    #[allow(dead_code)]
    pub fn entry_count(&self) -> u64 {
        self.inner.entry_count()
    }
}

impl<K, V> std::fmt::Debug for TypedCache<K, V>
where
    K: Hash + Eq + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TypedCache")
            .field("name", &self.name)
            .field("entry_count", &self.inner.entry_count())
            .finish()
    }
}
