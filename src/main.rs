//! Faunabot settings layer runtime.
//!
//! Wires environment configuration, MongoDB, and the settings service. The
//! host bot's command dispatcher and spawn engine embed against
//! [`SettingsService`].

use std::sync::Arc;

use tracing::info;
use tracing_subscriber::EnvFilter;

use faunabot::config::Config;
use faunabot::database::{Database, MongoSettingsStore, SettingsStore};
use faunabot::settings::SettingsService;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file first (before anything else)
    dotenvy::dotenv().ok();

    // Initialize logging with sensible defaults
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("faunabot=info"));

    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("Starting faunabot settings layer...");

    // Load configuration
    let config = Config::from_env();
    info!("Configuration loaded successfully");

    // Connect to MongoDB
    info!("Connecting to MongoDB...");
    let db = Database::connect(&config.mongodb_uri, &config.mongodb_database).await?;

    let store = MongoSettingsStore::new(&db);
    store.ensure_indexes().await?;

    let store: Arc<dyn SettingsStore> = Arc::new(store);
    let service = SettingsService::new(store).await?;

    let threshold = service.global.spawn_threshold();
    info!(
        min = threshold.min(),
        max = threshold.max(),
        spawn_loop = service.global.spawn_loop(),
        "Settings service ready"
    );

    // Standalone, park until shutdown.
    tokio::signal::ctrl_c().await?;
    info!("Shutting down");

    Ok(())
}
