//! Persisted record types.

mod global;
mod guild;
mod user;

pub use global::{GlobalSettings, SpawnThreshold, MIN_SPAWN_MESSAGES};
pub use guild::{GuildSettings, SpawnScope};
pub use user::{Locale, UserSettings};
