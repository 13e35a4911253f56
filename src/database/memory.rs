//! In-memory settings store.
//!
//! Same compare-and-swap contract as the MongoDB store. Used by the test
//! suite and for running without a database.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::Mutex;

use super::models::{GlobalSettings, GuildSettings, UserSettings};
use super::store::{SettingsStore, StoreError};

#[derive(Default)]
struct Inner {
    guilds: HashMap<i64, GuildSettings>,
    users: HashMap<u64, UserSettings>,
    global: Option<GlobalSettings>,
}

/// Settings store backed by process memory.
#[derive(Default)]
pub struct MemorySettingsStore {
    inner: Mutex<Inner>,
}

impl MemorySettingsStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn check_cas(current: i64, incoming: i64) -> Result<(), StoreError> {
    if incoming == current + 1 {
        Ok(())
    } else {
        Err(StoreError::Conflict)
    }
}

#[async_trait]
impl SettingsStore for MemorySettingsStore {
    async fn load_guild(&self, guild_id: i64) -> Result<Option<GuildSettings>, StoreError> {
        Ok(self.inner.lock().guilds.get(&guild_id).cloned())
    }

    async fn store_guild(&self, record: &GuildSettings) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        let current = inner.guilds.get(&record.guild_id).map_or(0, |g| g.version);
        check_cas(current, record.version)?;
        inner.guilds.insert(record.guild_id, record.clone());
        Ok(())
    }

    async fn load_user(&self, user_id: u64) -> Result<Option<UserSettings>, StoreError> {
        Ok(self.inner.lock().users.get(&user_id).cloned())
    }

    async fn store_user(&self, record: &UserSettings) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        let current = inner.users.get(&record.user_id).map_or(0, |u| u.version);
        check_cas(current, record.version)?;
        inner.users.insert(record.user_id, record.clone());
        Ok(())
    }

    async fn load_global(&self) -> Result<Option<GlobalSettings>, StoreError> {
        Ok(self.inner.lock().global.clone())
    }

    async fn store_global(&self, record: &GlobalSettings) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        let current = inner.global.as_ref().map_or(0, |g| g.version);
        check_cas(current, record.version)?;
        inner.global = Some(record.clone());
        Ok(())
    }
}
