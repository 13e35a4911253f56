//! Per-guild settings cache.

use std::fmt;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::cache::{CacheConfig, RefreshCoordinator, TypedCache};
use crate::database::{GuildSettings, SettingsStore, StoreError};

use super::error::SettingsError;
use super::WRITE_RETRIES;

/// Read-only summary of a guild's spawn settings for user-facing rendering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuildOverview {
    pub enabled: bool,
    pub active_channels: Vec<i64>,
}

impl GuildOverview {
    /// Channel list with sentinel semantics: a disabled guild reads as
    /// `"None"` regardless of the stored list, enabled with an empty list
    /// reads as `"All"`.
    pub fn channels_display(&self) -> String {
        if !self.enabled {
            "None".to_string()
        } else if self.active_channels.is_empty() {
            "All".to_string()
        } else {
            self.active_channels
                .iter()
                .map(|c| c.to_string())
                .collect::<Vec<_>>()
                .join(", ")
        }
    }
}

impl fmt::Display for GuildOverview {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Toggle: {}\nActive Channels: {}",
            self.enabled,
            self.channels_display()
        )
    }
}

/// In-memory mirror of per-guild settings.
///
/// Reads serve the published `Arc<GuildSettings>` snapshot without blocking;
/// mutations go through a compare-and-swap write loop against the store and
/// republish. Snapshot publication is guarded by record version, so a slow
/// refresh can never overwrite a fresher snapshot.
#[derive(Clone)]
pub struct GuildConfigCache {
    store: Arc<dyn SettingsStore>,
    cache: TypedCache<i64, Arc<GuildSettings>>,
    coordinator: Arc<RefreshCoordinator<i64, Arc<GuildSettings>, SettingsError>>,
}

/// Version-guarded snapshot publication (whole-object replace).
fn publish(
    cache: &TypedCache<i64, Arc<GuildSettings>>,
    snapshot: Arc<GuildSettings>,
) -> Arc<GuildSettings> {
    cache.upsert_with(snapshot.guild_id, |current| match current {
        Some(current) if current.version >= snapshot.version => current,
        _ => snapshot,
    })
}

impl GuildConfigCache {
    pub fn new(store: Arc<dyn SettingsStore>) -> Self {
        Self {
            store,
            cache: TypedCache::new("guild_settings", CacheConfig::settings_hot_path()),
            coordinator: Arc::new(RefreshCoordinator::new()),
        }
    }

    /// Get the current snapshot for a guild.
    ///
    /// Hot path: returns the published snapshot without blocking. On a cold
    /// miss the record is loaded from the store once (stampedes on the same
    /// guild collapse into that single load) and a default record is served
    /// if the guild has never been configured.
    pub async fn get(&self, guild_id: i64) -> Result<Arc<GuildSettings>, SettingsError> {
        if let Some(snapshot) = self.cache.get(&guild_id) {
            return Ok(snapshot);
        }
        self.refresh(guild_id).await
    }

    /// Rebuild the published snapshot for a guild from the store.
    ///
    /// Coalesced per key: a refresh already in flight satisfies this call.
    pub async fn refresh(&self, guild_id: i64) -> Result<Arc<GuildSettings>, SettingsError> {
        let store = Arc::clone(&self.store);
        let cache = self.cache.clone();

        self.coordinator
            .run(guild_id, async move {
                let record = store
                    .load_guild(guild_id)
                    .await?
                    .unwrap_or_else(|| GuildSettings::new(guild_id));
                Ok(publish(&cache, Arc::new(record)))
            })
            .await
    }

    /// Enable or disable the spawn system for a guild.
    ///
    /// `None` flips the currently persisted value. Returns the new value.
    pub async fn set_toggle(
        &self,
        guild_id: i64,
        enabled: Option<bool>,
    ) -> Result<bool, SettingsError> {
        let (value, _) = self
            .mutate(guild_id, move |g| {
                g.toggle = enabled.unwrap_or(!g.toggle);
                g.toggle
            })
            .await?;
        Ok(value)
    }

    /// Toggle a channel's allow-list membership.
    ///
    /// One atomic read-modify-write against the store, so concurrent toggles
    /// on the same guild cannot lose updates. Returns `true` if the channel
    /// was added, `false` if removed.
    pub async fn toggle_channel(
        &self,
        guild_id: i64,
        channel_id: i64,
    ) -> Result<bool, SettingsError> {
        let (added, _) = self
            .mutate(guild_id, move |g| g.toggle_channel(channel_id))
            .await?;
        Ok(added)
    }

    /// Overview of a guild's settings for user-facing rendering.
    pub async fn describe(&self, guild_id: i64) -> Result<GuildOverview, SettingsError> {
        let snapshot = self.get(guild_id).await?;
        Ok(GuildOverview {
            enabled: snapshot.toggle,
            active_channels: snapshot.active_channels.clone(),
        })
    }

    /// Compare-and-swap write loop: load fresh, apply, bump version, store.
    ///
    /// A conflicting write retries against a fresh read up to the retry
    /// budget. On success the written record is published immediately
    /// (read-your-write) and a coalesced refresh folds in any concurrent
    /// later write. A failed write publishes and refreshes nothing.
    async fn mutate<R, F>(
        &self,
        guild_id: i64,
        mut apply: F,
    ) -> Result<(R, Arc<GuildSettings>), SettingsError>
    where
        F: FnMut(&mut GuildSettings) -> R,
    {
        for attempt in 1..=WRITE_RETRIES {
            let mut record = self
                .store
                .load_guild(guild_id)
                .await?
                .unwrap_or_else(|| GuildSettings::new(guild_id));

            let value = apply(&mut record);
            record.version += 1;
            record.updated_at = chrono::Utc::now().timestamp();

            match self.store.store_guild(&record).await {
                Ok(()) => {
                    let written = publish(&self.cache, Arc::new(record));
                    let snapshot = match self.refresh(guild_id).await {
                        Ok(refreshed) if refreshed.version > written.version => refreshed,
                        Ok(_) => written,
                        Err(err) => {
                            // The write itself succeeded and its snapshot is
                            // already published; a failed refresh must not
                            // fail the operation or displace that snapshot.
                            warn!(guild_id, %err, "post-write refresh failed");
                            written
                        }
                    };
                    return Ok((value, snapshot));
                }
                Err(StoreError::Conflict) => {
                    debug!(guild_id, attempt, "guild settings write conflicted, retrying");
                }
                Err(err) => return Err(err.into()),
            }
        }

        Err(SettingsError::StoreUnavailable(
            "guild settings write kept conflicting".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    use async_trait::async_trait;

    use crate::database::{GlobalSettings, MemorySettingsStore, UserSettings};

    use super::*;

    /// Store wrapper that injects failures on guild writes.
    #[derive(Default)]
    struct FlakyStore {
        inner: MemorySettingsStore,
        conflicts_remaining: AtomicUsize,
        unavailable: AtomicBool,
    }

    #[async_trait]
    impl SettingsStore for FlakyStore {
        async fn load_guild(&self, guild_id: i64) -> Result<Option<GuildSettings>, StoreError> {
            self.inner.load_guild(guild_id).await
        }

        async fn store_guild(&self, record: &GuildSettings) -> Result<(), StoreError> {
            if self.unavailable.load(Ordering::SeqCst) {
                return Err(StoreError::Unavailable("injected outage".to_string()));
            }
            if self
                .conflicts_remaining
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok()
            {
                return Err(StoreError::Conflict);
            }
            self.inner.store_guild(record).await
        }

        async fn load_user(&self, user_id: u64) -> Result<Option<UserSettings>, StoreError> {
            self.inner.load_user(user_id).await
        }

        async fn store_user(&self, record: &UserSettings) -> Result<(), StoreError> {
            self.inner.store_user(record).await
        }

        async fn load_global(&self) -> Result<Option<GlobalSettings>, StoreError> {
            self.inner.load_global().await
        }

        async fn store_global(&self, record: &GlobalSettings) -> Result<(), StoreError> {
            self.inner.store_global(record).await
        }
    }

    fn cache_over_memory() -> GuildConfigCache {
        GuildConfigCache::new(Arc::new(MemorySettingsStore::new()))
    }

    #[tokio::test]
    async fn test_get_serves_defaults_for_unknown_guild() {
        let guilds = cache_over_memory();

        let snapshot = guilds.get(42).await.unwrap();
        assert!(!snapshot.toggle);
        assert!(snapshot.active_channels.is_empty());

        // Cold load published a snapshot; the next get is a cache hit.
        assert!(guilds.cache.get(&42).is_some());
    }

    #[tokio::test]
    async fn test_toggle_channel_involution_with_read_your_write() {
        let guilds = cache_over_memory();

        assert!(guilds.toggle_channel(1, 111).await.unwrap());
        assert_eq!(guilds.get(1).await.unwrap().active_channels, vec![111]);

        assert!(!guilds.toggle_channel(1, 111).await.unwrap());
        assert!(guilds.get(1).await.unwrap().active_channels.is_empty());
    }

    #[tokio::test]
    async fn test_set_toggle_explicit_and_flip() {
        let guilds = cache_over_memory();

        assert!(guilds.set_toggle(1, Some(true)).await.unwrap());
        assert!(guilds.get(1).await.unwrap().toggle);

        // Absent value flips the persisted state.
        assert!(!guilds.set_toggle(1, None).await.unwrap());
        assert!(guilds.set_toggle(1, None).await.unwrap());
        assert!(guilds.get(1).await.unwrap().toggle);
    }

    #[tokio::test]
    async fn test_concurrent_channel_toggles_do_not_lose_updates() {
        let guilds = cache_over_memory();

        let (a, b) = tokio::join!(
            guilds.toggle_channel(1, 111),
            guilds.toggle_channel(1, 222),
        );
        assert!(a.unwrap());
        assert!(b.unwrap());

        let snapshot = guilds.get(1).await.unwrap();
        let mut channels = snapshot.active_channels.clone();
        channels.sort_unstable();
        assert_eq!(channels, vec![111, 222]);
    }

    #[tokio::test]
    async fn test_write_retries_through_transient_conflicts() {
        let store = Arc::new(FlakyStore::default());
        store.conflicts_remaining.store(2, Ordering::SeqCst);
        let guilds = GuildConfigCache::new(store);

        assert!(guilds.toggle_channel(1, 111).await.unwrap());
        assert_eq!(guilds.get(1).await.unwrap().active_channels, vec![111]);
    }

    #[tokio::test]
    async fn test_conflict_exhaustion_surfaces_store_unavailable() {
        let store = Arc::new(FlakyStore::default());
        store.conflicts_remaining.store(usize::MAX, Ordering::SeqCst);
        let guilds = GuildConfigCache::new(store);

        let err = guilds.set_toggle(1, Some(true)).await.unwrap_err();
        assert!(matches!(err, SettingsError::StoreUnavailable(_)));
    }

    #[tokio::test]
    async fn test_failed_write_leaves_snapshot_untouched() {
        let store = Arc::new(FlakyStore::default());
        let guilds = GuildConfigCache::new(Arc::clone(&store) as Arc<dyn SettingsStore>);

        guilds.set_toggle(1, Some(true)).await.unwrap();

        store.unavailable.store(true, Ordering::SeqCst);
        assert!(guilds.set_toggle(1, Some(false)).await.is_err());

        // Cache and store still agree on the last successful write.
        assert!(guilds.get(1).await.unwrap().toggle);
        assert!(store.load_guild(1).await.unwrap().unwrap().toggle);
    }

    #[tokio::test]
    async fn test_stale_refresh_cannot_displace_newer_snapshot() {
        let guilds = cache_over_memory();

        guilds.toggle_channel(1, 111).await.unwrap();
        let fresh = guilds.get(1).await.unwrap();

        // A refresh result carrying an older version than the published
        // snapshot is dropped by the version guard.
        let stale = Arc::new(GuildSettings::new(1));
        let published = publish(&guilds.cache, stale);
        assert_eq!(published.version, fresh.version);
        assert_eq!(
            guilds.get(1).await.unwrap().active_channels,
            vec![111]
        );
    }

    #[tokio::test]
    async fn test_describe_sentinels() {
        let guilds = cache_over_memory();

        // Enabled with empty list reads as "All".
        guilds.set_toggle(2, Some(true)).await.unwrap();
        let overview = guilds.describe(2).await.unwrap();
        assert!(overview.enabled);
        assert_eq!(overview.channels_display(), "All");

        // Disabled reads as "None" regardless of the stored list.
        guilds.toggle_channel(2, 111).await.unwrap();
        guilds.set_toggle(2, Some(false)).await.unwrap();
        let overview = guilds.describe(2).await.unwrap();
        assert_eq!(overview.channels_display(), "None");
        assert_eq!(overview.active_channels, vec![111]);

        // Enabled with channels lists them.
        guilds.set_toggle(2, Some(true)).await.unwrap();
        guilds.toggle_channel(2, 222).await.unwrap();
        assert_eq!(
            guilds.describe(2).await.unwrap().channels_display(),
            "111, 222"
        );
    }

    #[tokio::test]
    async fn test_snapshots_are_whole_object_replacements() {
        let guilds = cache_over_memory();

        guilds.set_toggle(1, Some(true)).await.unwrap();
        let before = guilds.get(1).await.unwrap();

        guilds.toggle_channel(1, 111).await.unwrap();

        // The reader's old snapshot is intact; the published one is new.
        assert!(before.active_channels.is_empty());
        let after = guilds.get(1).await.unwrap();
        assert_eq!(after.active_channels, vec![111]);
        assert!(after.toggle);
    }
}
