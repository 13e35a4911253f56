//! Settings service - the configuration cache synchronization layer.
//!
//! Accepts validated configuration mutations, persists them through the
//! [`SettingsStore`](crate::database::SettingsStore), and republishes
//! consistent snapshots for lock-light concurrent reads on the per-message
//! hot path.

mod error;
mod global;
mod guild;
mod user;

pub use error::SettingsError;
pub use global::GlobalConfig;
pub use guild::{GuildConfigCache, GuildOverview};
pub use user::UserConfigCache;

use std::sync::Arc;

use crate::database::SettingsStore;

/// Bound on compare-and-swap write attempts before a write surfaces
/// [`SettingsError::StoreUnavailable`].
pub(crate) const WRITE_RETRIES: usize = 3;

/// All settings state, shared by reference into the message-handling path.
pub struct SettingsService {
    /// Per-guild spawn settings.
    pub guilds: GuildConfigCache,

    /// Per-user notification/locale settings.
    pub users: UserConfigCache,

    /// Bot-wide spawn-chance range and spawn-loop flag.
    pub global: GlobalConfig,
}

impl SettingsService {
    /// Build the service over a settings store.
    pub async fn new(store: Arc<dyn SettingsStore>) -> Result<Self, SettingsError> {
        Ok(Self {
            guilds: GuildConfigCache::new(Arc::clone(&store)),
            users: UserConfigCache::new(Arc::clone(&store)),
            global: GlobalConfig::load(store).await?,
        })
    }
}
