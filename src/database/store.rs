//! Settings store seam.
//!
//! The settings service only sees this trait; MongoDB is one implementation,
//! the in-memory store is another (tests, local development).

use async_trait::async_trait;
use thiserror::Error;

use super::models::{GlobalSettings, GuildSettings, UserSettings};

/// Errors surfaced by a settings store.
///
/// `Clone` so a single refresh result can be handed to every coalesced
/// waiter.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    /// A write lost a compare-and-swap race with a concurrent update.
    /// Transient; callers retry against a fresh read.
    #[error("write conflicted with a concurrent update")]
    Conflict,

    /// The backing store is unreachable or failed. Fatal to the requested
    /// operation; no partial mutation was applied.
    #[error("settings store unavailable: {0}")]
    Unavailable(String),
}

/// Durable key-value persistence for settings records.
///
/// Writes are optimistic compare-and-swap on the record's `version` field:
/// `store_*` succeeds iff the persisted version equals `record.version - 1`,
/// where an absent record counts as version 0. A mismatch returns
/// [`StoreError::Conflict`] and leaves the stored record untouched.
#[async_trait]
pub trait SettingsStore: Send + Sync {
    async fn load_guild(&self, guild_id: i64) -> Result<Option<GuildSettings>, StoreError>;

    async fn store_guild(&self, record: &GuildSettings) -> Result<(), StoreError>;

    async fn load_user(&self, user_id: u64) -> Result<Option<UserSettings>, StoreError>;

    async fn store_user(&self, record: &UserSettings) -> Result<(), StoreError>;

    async fn load_global(&self) -> Result<Option<GlobalSettings>, StoreError>;

    async fn store_global(&self, record: &GlobalSettings) -> Result<(), StoreError>;
}
