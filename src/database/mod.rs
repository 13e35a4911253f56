//! Database module exports.

mod memory;
mod models;
mod mongo;
mod store;

pub use memory::MemorySettingsStore;
pub use models::*;
pub use mongo::{Database, MongoSettingsStore};
pub use store::{SettingsStore, StoreError};
