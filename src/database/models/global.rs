//! Global (bot-wide) spawn settings.

use serde::{Deserialize, Serialize};

use crate::settings::SettingsError;

/// Smallest allowed value for the minimum of the spawn-chance range.
pub const MIN_SPAWN_MESSAGES: u32 = 15;

/// Global message-count range for spawn rolls.
///
/// Invariant: `min >= 15 && max >= min`. The only way to build one is
/// [`SpawnThreshold::validate`]; deserialization goes through the same check,
/// so an invalid pair can neither be constructed nor decoded from storage.
/// Persisted as a two-element array `[min, max]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "(u32, u32)", into = "(u32, u32)")]
pub struct SpawnThreshold {
    min: u32,
    max: u32,
}

impl SpawnThreshold {
    /// Validate a `(min, max)` pair.
    ///
    /// Pure: no side effects, safe to call concurrently.
    pub fn validate(min: u32, max: u32) -> Result<Self, SettingsError> {
        if min < MIN_SPAWN_MESSAGES || max < min {
            return Err(SettingsError::InvalidRange { min, max });
        }
        Ok(Self { min, max })
    }

    pub fn min(&self) -> u32 {
        self.min
    }

    pub fn max(&self) -> u32 {
        self.max
    }
}

impl Default for SpawnThreshold {
    fn default() -> Self {
        Self { min: 20, max: 120 }
    }
}

impl TryFrom<(u32, u32)> for SpawnThreshold {
    type Error = SettingsError;

    fn try_from((min, max): (u32, u32)) -> Result<Self, Self::Error> {
        Self::validate(min, max)
    }
}

impl From<SpawnThreshold> for (u32, u32) {
    fn from(t: SpawnThreshold) -> Self {
        (t.min, t.max)
    }
}

/// The single bot-wide settings record.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GlobalSettings {
    /// Message-count range for spawn rolls.
    #[serde(default)]
    pub spawn_chance: SpawnThreshold,

    /// Whether the external random-spawn scheduler loop should run.
    #[serde(default)]
    pub spawn_loop: bool,

    /// Optimistic concurrency stamp; 0 means never persisted.
    #[serde(default)]
    pub version: i64,
}
