//! Per-user settings cache.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::cache::{CacheConfig, RefreshCoordinator, TypedCache};
use crate::database::{Locale, SettingsStore, StoreError, UserSettings};

use super::error::SettingsError;
use super::WRITE_RETRIES;

/// In-memory mirror of per-user settings (global scope).
///
/// Same snapshot/refresh discipline as [`super::GuildConfigCache`], keyed by
/// user id.
#[derive(Clone)]
pub struct UserConfigCache {
    store: Arc<dyn SettingsStore>,
    cache: TypedCache<u64, Arc<UserSettings>>,
    coordinator: Arc<RefreshCoordinator<u64, Arc<UserSettings>, SettingsError>>,
}

fn publish(
    cache: &TypedCache<u64, Arc<UserSettings>>,
    snapshot: Arc<UserSettings>,
) -> Arc<UserSettings> {
    cache.upsert_with(snapshot.user_id, |current| match current {
        Some(current) if current.version >= snapshot.version => current,
        _ => snapshot,
    })
}

impl UserConfigCache {
    pub fn new(store: Arc<dyn SettingsStore>) -> Self {
        Self {
            store,
            cache: TypedCache::new("user_settings", CacheConfig::settings_hot_path()),
            coordinator: Arc::new(RefreshCoordinator::new()),
        }
    }

    /// Get the current snapshot for a user, defaults on first access.
    pub async fn get(&self, user_id: u64) -> Result<Arc<UserSettings>, SettingsError> {
        if let Some(snapshot) = self.cache.get(&user_id) {
            return Ok(snapshot);
        }
        self.refresh(user_id).await
    }

    /// Rebuild the published snapshot for a user from the store (coalesced).
    pub async fn refresh(&self, user_id: u64) -> Result<Arc<UserSettings>, SettingsError> {
        let store = Arc::clone(&self.store);
        let cache = self.cache.clone();

        self.coordinator
            .run(user_id, async move {
                let record = store
                    .load_user(user_id)
                    .await?
                    .unwrap_or_else(|| UserSettings::new(user_id));
                Ok(publish(&cache, Arc::new(record)))
            })
            .await
    }

    /// Silence or re-enable levelling notifications for a user.
    ///
    /// `None` flips the currently persisted value. Returns the new value.
    pub async fn set_silence(
        &self,
        user_id: u64,
        enabled: Option<bool>,
    ) -> Result<bool, SettingsError> {
        let (value, _) = self
            .mutate(user_id, move |u| {
                u.silence = enabled.unwrap_or(!u.silence);
                u.silence
            })
            .await?;
        Ok(value)
    }

    /// Set a user's locale from free text.
    ///
    /// The text is matched case-insensitively against the alias table; an
    /// unrecognized locale is rejected before any store access, leaving the
    /// persisted and cached value unchanged. The canonical two-letter code
    /// is persisted.
    pub async fn set_locale(&self, user_id: u64, text: &str) -> Result<Locale, SettingsError> {
        let locale: Locale = text.parse()?;
        self.mutate(user_id, move |u| u.locale = locale).await?;
        Ok(locale)
    }

    /// Compare-and-swap write loop; see `GuildConfigCache::mutate`.
    async fn mutate<R, F>(
        &self,
        user_id: u64,
        mut apply: F,
    ) -> Result<(R, Arc<UserSettings>), SettingsError>
    where
        F: FnMut(&mut UserSettings) -> R,
    {
        for attempt in 1..=WRITE_RETRIES {
            let mut record = self
                .store
                .load_user(user_id)
                .await?
                .unwrap_or_else(|| UserSettings::new(user_id));

            let value = apply(&mut record);
            record.version += 1;
            record.updated_at = chrono::Utc::now().timestamp();

            match self.store.store_user(&record).await {
                Ok(()) => {
                    let written = publish(&self.cache, Arc::new(record));
                    let snapshot = match self.refresh(user_id).await {
                        Ok(refreshed) if refreshed.version > written.version => refreshed,
                        Ok(_) => written,
                        Err(err) => {
                            warn!(user_id, %err, "post-write refresh failed");
                            written
                        }
                    };
                    return Ok((value, snapshot));
                }
                Err(StoreError::Conflict) => {
                    debug!(user_id, attempt, "user settings write conflicted, retrying");
                }
                Err(err) => return Err(err.into()),
            }
        }

        Err(SettingsError::StoreUnavailable(
            "user settings write kept conflicting".to_string(),
        ))
    }
}
