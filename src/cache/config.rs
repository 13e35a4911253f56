//! Cache configuration.

use std::time::Duration;

/// Configuration for a cache instance.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Maximum number of entries in the cache.
    pub max_capacity: u64,

    /// Time-to-live for cache entries.
    /// After this duration, entries are automatically evicted.
    pub ttl: Option<Duration>,

    /// Time-to-idle for cache entries.
    /// Entries are evicted if not accessed within this duration.
    pub tti: Option<Duration>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_capacity: 10_000,
            ttl: Some(Duration::from_secs(300)), // 5 minutes
            tti: None,
        }
    }
}

impl CacheConfig {
    /// Create config for settings consulted on every chat message.
    /// High capacity; TTL only bounds staleness of entries whose backing
    /// record was changed by something other than this process.
    pub fn settings_hot_path() -> Self {
        Self {
            max_capacity: 10_000,
            ttl: Some(Duration::from_secs(600)), // 10 minutes
            tti: None,
        }
    }
}
