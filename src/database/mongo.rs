//! MongoDB-backed settings store.

use mongodb::bson::{doc, Document};
use mongodb::error::{ErrorKind, WriteFailure};
use mongodb::options::{ClientOptions, IndexOptions, ReplaceOptions};
use mongodb::{Client, Collection, IndexModel};
use serde::{Deserialize, Serialize};
use tracing::info;

use async_trait::async_trait;

use super::models::{GlobalSettings, GuildSettings, UserSettings};
use super::store::{SettingsStore, StoreError};

/// Database wrapper for MongoDB operations.
#[derive(Debug, Clone)]
pub struct Database {
    db: mongodb::Database,
}

impl Database {
    /// Connect to MongoDB with the given URI and database name.
    ///
    /// # Errors
    /// Returns error if connection fails.
    pub async fn connect(uri: &str, db_name: &str) -> anyhow::Result<Self> {
        let options = ClientOptions::parse(uri).await?;
        let client = Client::with_options(options)?;

        // Ping the database to verify connection
        client
            .database("admin")
            .run_command(doc! { "ping": 1 })
            .await?;

        info!("Successfully connected to MongoDB");

        let db = client.database(db_name);

        Ok(Self { db })
    }

    /// Get a typed collection from the database.
    pub fn collection<T: Send + Sync>(&self, name: &str) -> Collection<T> {
        self.db.collection(name)
    }
}

/// The single global record's document id.
const GLOBAL_DOC_ID: &str = "global";

/// Mongo document wrapper pinning the global record to a fixed `_id`.
#[derive(Debug, Serialize, Deserialize)]
struct GlobalDoc {
    #[serde(rename = "_id")]
    id: String,
    #[serde(flatten)]
    record: GlobalSettings,
}

/// Settings store backed by MongoDB collections.
///
/// One collection per record type; writes are a single `replace_one` whose
/// filter carries the expected previous version, so a concurrent update
/// makes the filter match nothing and the write reports a conflict instead
/// of clobbering.
#[derive(Clone)]
pub struct MongoSettingsStore {
    guilds: Collection<GuildSettings>,
    users: Collection<UserSettings>,
    global: Collection<GlobalDoc>,
}

impl MongoSettingsStore {
    pub fn new(db: &Database) -> Self {
        Self {
            guilds: db.collection("guild_settings"),
            users: db.collection("user_settings"),
            global: db.collection("global_settings"),
        }
    }

    /// Create the unique key indexes the CAS upsert path relies on.
    ///
    /// Without them two first-writers for the same key could both insert.
    pub async fn ensure_indexes(&self) -> anyhow::Result<()> {
        let unique = |keys: Document| {
            IndexModel::builder()
                .keys(keys)
                .options(IndexOptions::builder().unique(true).build())
                .build()
        };

        self.guilds.create_index(unique(doc! { "guild_id": 1 })).await?;
        self.users.create_index(unique(doc! { "user_id": 1 })).await?;

        info!("Settings indexes ensured");
        Ok(())
    }
}

/// Whether an error is a duplicate-key write error (code 11000), which on
/// the upsert path means another writer inserted the record first.
fn is_duplicate_key(err: &mongodb::error::Error) -> bool {
    matches!(
        *err.kind,
        ErrorKind::Write(WriteFailure::WriteError(ref we)) if we.code == 11000
    )
}

/// One compare-and-swap write: replace the document matching `filter`
/// (which includes the expected previous version), inserting when the
/// record has never been persisted.
async fn cas_replace<T>(
    collection: &Collection<T>,
    filter: Document,
    record: &T,
    is_first_write: bool,
) -> Result<(), StoreError>
where
    T: Serialize + Send + Sync,
{
    let options = ReplaceOptions::builder().upsert(is_first_write).build();

    match collection
        .replace_one(filter, record)
        .with_options(options)
        .await
    {
        Ok(r) if r.matched_count == 1 || r.upserted_id.is_some() => Ok(()),
        Ok(_) => Err(StoreError::Conflict),
        Err(e) if is_duplicate_key(&e) => Err(StoreError::Conflict),
        Err(e) => Err(StoreError::Unavailable(e.to_string())),
    }
}

#[async_trait]
impl SettingsStore for MongoSettingsStore {
    async fn load_guild(&self, guild_id: i64) -> Result<Option<GuildSettings>, StoreError> {
        self.guilds
            .find_one(doc! { "guild_id": guild_id })
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))
    }

    async fn store_guild(&self, record: &GuildSettings) -> Result<(), StoreError> {
        let prev = record.version - 1;
        let filter = doc! { "guild_id": record.guild_id, "version": prev };
        cas_replace(&self.guilds, filter, record, prev == 0).await
    }

    async fn load_user(&self, user_id: u64) -> Result<Option<UserSettings>, StoreError> {
        self.users
            .find_one(doc! { "user_id": user_id as i64 })
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))
    }

    async fn store_user(&self, record: &UserSettings) -> Result<(), StoreError> {
        let prev = record.version - 1;
        let filter = doc! { "user_id": record.user_id as i64, "version": prev };
        cas_replace(&self.users, filter, record, prev == 0).await
    }

    async fn load_global(&self) -> Result<Option<GlobalSettings>, StoreError> {
        self.global
            .find_one(doc! { "_id": GLOBAL_DOC_ID })
            .await
            .map(|opt| opt.map(|d| d.record))
            .map_err(|e| StoreError::Unavailable(e.to_string()))
    }

    async fn store_global(&self, record: &GlobalSettings) -> Result<(), StoreError> {
        let prev = record.version - 1;
        let filter = doc! { "_id": GLOBAL_DOC_ID, "version": prev };
        let doc = GlobalDoc {
            id: GLOBAL_DOC_ID.to_string(),
            record: record.clone(),
        };
        cas_replace(&self.global, filter, &doc, prev == 0).await
    }
}
