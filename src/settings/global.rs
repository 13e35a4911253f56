//! Bot-wide spawn settings.

use std::sync::Arc;

use tokio::sync::{watch, Mutex};
use tracing::{debug, info};

use crate::database::{GlobalSettings, SettingsStore, SpawnThreshold, StoreError};

use super::error::SettingsError;
use super::WRITE_RETRIES;

/// The single global settings record: spawn-chance range and spawn-loop
/// flag.
///
/// Not per-key cached (there is only one instance). Current values live in
/// `watch` channels: reads are a cheap borrow, and the external spawn engine
/// and scheduler subscribe to be notified of changes. Writers hold a small
/// lock across persist and notify, so a slower writer can never publish an
/// older value over a newer persisted one. This layer validates and stores;
/// it does not run the spawn loop.
pub struct GlobalConfig {
    store: Arc<dyn SettingsStore>,
    /// Orders persist + notify: while held, no other writer can publish,
    /// so the channels always carry the latest persisted values.
    write_lock: Mutex<()>,
    threshold_tx: watch::Sender<SpawnThreshold>,
    spawn_loop_tx: watch::Sender<bool>,
}

impl GlobalConfig {
    /// Load the persisted record (or defaults) and seed the watch channels.
    pub async fn load(store: Arc<dyn SettingsStore>) -> Result<Self, SettingsError> {
        let record = store.load_global().await?.unwrap_or_default();
        info!(
            min = record.spawn_chance.min(),
            max = record.spawn_chance.max(),
            spawn_loop = record.spawn_loop,
            "Global spawn settings loaded"
        );

        let (threshold_tx, _) = watch::channel(record.spawn_chance);
        let (spawn_loop_tx, _) = watch::channel(record.spawn_loop);

        Ok(Self {
            store,
            write_lock: Mutex::new(()),
            threshold_tx,
            spawn_loop_tx,
        })
    }

    /// Current spawn-chance range.
    pub fn spawn_threshold(&self) -> SpawnThreshold {
        *self.threshold_tx.borrow()
    }

    /// Current spawn-loop flag.
    pub fn spawn_loop(&self) -> bool {
        *self.spawn_loop_tx.borrow()
    }

    /// Receiver for the external spawn engine.
    pub fn watch_spawn_threshold(&self) -> watch::Receiver<SpawnThreshold> {
        self.threshold_tx.subscribe()
    }

    /// Receiver for the external scheduler.
    pub fn watch_spawn_loop(&self) -> watch::Receiver<bool> {
        self.spawn_loop_tx.subscribe()
    }

    /// Set the global spawn-chance range.
    ///
    /// Validation runs before any persistence: an invalid pair is rejected
    /// with no side effect. On success the range is persisted and the spawn
    /// engine is notified.
    pub async fn set_spawn_threshold(
        &self,
        min: u32,
        max: u32,
    ) -> Result<SpawnThreshold, SettingsError> {
        let threshold = SpawnThreshold::validate(min, max)?;

        let _guard = self.write_lock.lock().await;
        let record = self.mutate(|record| record.spawn_chance = threshold).await?;
        self.threshold_tx.send_replace(record.spawn_chance);

        info!(min, max, "Spawn threshold updated");
        Ok(threshold)
    }

    /// Set the spawn-loop flag and notify the external scheduler.
    pub async fn set_spawn_loop(&self, enabled: bool) -> Result<bool, SettingsError> {
        let _guard = self.write_lock.lock().await;
        let record = self.mutate(|record| record.spawn_loop = enabled).await?;
        self.spawn_loop_tx.send_replace(record.spawn_loop);

        info!(enabled, "Spawn loop flag updated");
        Ok(enabled)
    }

    /// Compare-and-swap write loop for the global record.
    async fn mutate<F>(&self, mut apply: F) -> Result<GlobalSettings, SettingsError>
    where
        F: FnMut(&mut GlobalSettings),
    {
        for attempt in 1..=WRITE_RETRIES {
            let mut record = self.store.load_global().await?.unwrap_or_default();
            apply(&mut record);
            record.version += 1;

            match self.store.store_global(&record).await {
                Ok(()) => return Ok(record),
                Err(StoreError::Conflict) => {
                    debug!(attempt, "global settings write conflicted, retrying");
                }
                Err(err) => return Err(err.into()),
            }
        }

        Err(SettingsError::StoreUnavailable(
            "global settings write kept conflicting".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use async_trait::async_trait;

    use crate::database::{GuildSettings, MemorySettingsStore, UserSettings};

    use super::*;

    /// Store wrapper that widens write races with a small delay.
    struct SlowStore {
        inner: MemorySettingsStore,
        delay: Duration,
    }

    #[async_trait]
    impl SettingsStore for SlowStore {
        async fn load_guild(&self, guild_id: i64) -> Result<Option<GuildSettings>, StoreError> {
            self.inner.load_guild(guild_id).await
        }

        async fn store_guild(&self, record: &GuildSettings) -> Result<(), StoreError> {
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
            tokio::time::sleep(self.delay).await;
            self.inner.store_global(record).await
        }
    }

    async fn config_over_memory() -> (Arc<MemorySettingsStore>, GlobalConfig) {
        let store = Arc::new(MemorySettingsStore::new());
        let global = GlobalConfig::load(Arc::clone(&store) as Arc<dyn SettingsStore>)
            .await
            .unwrap();
        (store, global)
    }

    #[tokio::test]
    async fn test_threshold_rejected_below_min() {
        let (store, global) = config_over_memory().await;

        let err = global.set_spawn_threshold(10, 20).await.unwrap_err();
        assert_eq!(err, SettingsError::InvalidRange { min: 10, max: 20 });

        // No side effect: nothing persisted, current value unchanged.
        assert!(store.load_global().await.unwrap().is_none());
        assert_eq!(global.spawn_threshold(), SpawnThreshold::default());
    }

    #[tokio::test]
    async fn test_threshold_rejected_when_max_below_min() {
        let (_, global) = config_over_memory().await;
        assert!(global.set_spawn_threshold(15, 10).await.is_err());
    }

    #[tokio::test]
    async fn test_threshold_persists_and_notifies() {
        let (store, global) = config_over_memory().await;
        let mut engine = global.watch_spawn_threshold();

        let threshold = global.set_spawn_threshold(20, 50).await.unwrap();
        assert_eq!((threshold.min(), threshold.max()), (20, 50));

        let persisted = store.load_global().await.unwrap().unwrap();
        assert_eq!(persisted.spawn_chance, threshold);

        assert!(engine.has_changed().unwrap());
        assert_eq!(*engine.borrow_and_update(), threshold);
    }

    #[tokio::test]
    async fn test_invalid_threshold_does_not_notify() {
        let (_, global) = config_over_memory().await;
        let mut engine = global.watch_spawn_threshold();

        let _ = global.set_spawn_threshold(10, 20).await;
        assert!(!engine.has_changed().unwrap());
    }

    #[tokio::test]
    async fn test_spawn_loop_persists_and_notifies() {
        let (store, global) = config_over_memory().await;
        let mut scheduler = global.watch_spawn_loop();

        assert!(global.set_spawn_loop(true).await.unwrap());
        assert!(global.spawn_loop());
        assert!(store.load_global().await.unwrap().unwrap().spawn_loop);

        assert!(scheduler.has_changed().unwrap());
        assert!(*scheduler.borrow_and_update());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_writers_leave_watch_and_store_agreeing() {
        let store = Arc::new(SlowStore {
            inner: MemorySettingsStore::new(),
            delay: Duration::from_millis(5),
        });
        let global = Arc::new(
            GlobalConfig::load(Arc::clone(&store) as Arc<dyn SettingsStore>)
                .await
                .unwrap(),
        );

        let t1 = tokio::spawn({
            let global = Arc::clone(&global);
            async move { global.set_spawn_threshold(20, 50).await.unwrap() }
        });
        let t2 = tokio::spawn({
            let global = Arc::clone(&global);
            async move { global.set_spawn_threshold(30, 60).await.unwrap() }
        });
        let t3 = tokio::spawn({
            let global = Arc::clone(&global);
            async move { global.set_spawn_loop(true).await.unwrap() }
        });
        tokio::try_join!(t1, t2, t3).unwrap();

        // Whatever order the writers landed in, the watch channels and the
        // persisted record agree on every field.
        let persisted = store.load_global().await.unwrap().unwrap();
        assert_eq!(global.spawn_threshold(), persisted.spawn_chance);
        assert_eq!(global.spawn_loop(), persisted.spawn_loop);
        assert!(persisted.spawn_loop);
    }

    #[tokio::test]
    async fn test_load_seeds_from_persisted_record() {
        let store = Arc::new(MemorySettingsStore::new());
        {
            let global = GlobalConfig::load(Arc::clone(&store) as Arc<dyn SettingsStore>)
                .await
                .unwrap();
            global.set_spawn_threshold(30, 60).await.unwrap();
            global.set_spawn_loop(true).await.unwrap();
        }

        let reloaded = GlobalConfig::load(store as Arc<dyn SettingsStore>)
            .await
            .unwrap();
        assert_eq!(
            (reloaded.spawn_threshold().min(), reloaded.spawn_threshold().max()),
            (30, 60)
        );
        assert!(reloaded.spawn_loop());
    }
}
