//! Cache module - snapshot caching with Moka plus refresh coalescing.
//!
//! The settings caches publish immutable `Arc` snapshots into a
//! [`TypedCache`] for lock-light reads on the per-message hot path. The
//! [`RefreshCoordinator`] guarantees at most one store read is in flight per
//! key when snapshots are rebuilt.

mod config;
mod refresh;
mod typed;

pub use config::CacheConfig;
pub use refresh::RefreshCoordinator;
pub use typed::TypedCache;
