//! Faunabot settings layer.
//!
//! The configuration cache synchronization layer for a creature-spawning
//! chat game bot: per-guild spawn toggles and channel allow-lists, per-user
//! notification silence and locale, and the global spawn-chance range, all
//! mirrored in memory for the per-message hot path and kept consistent with
//! the persisted store.
//!
//! ## Architecture
//!
//! - `config` - Environment configuration
//! - `database` - Settings store: MongoDB and in-memory implementations
//! - `cache` - Snapshot caching with Moka + per-key refresh coalescing
//! - `settings` - The settings service (guild/user caches, global config)

pub mod cache;
pub mod config;
pub mod database;
pub mod settings;
