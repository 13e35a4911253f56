//! Typed failures returned to the command layer.

use thiserror::Error;

use crate::database::StoreError;

/// Errors from settings operations.
///
/// Validation failures are detected before any persistence write, so they
/// never leave partial state. Store conflicts are retried inside the write
/// paths and surface as [`SettingsError::StoreUnavailable`] only when the
/// retry budget is exhausted.
///
/// `Clone` so a coalesced refresh can hand the same failure to every waiter.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SettingsError {
    /// Spawn-chance range is out of bounds.
    #[error("invalid spawn range [{min}, {max}]: min must be at least 15 and max must not be below min")]
    InvalidRange { min: u32, max: u32 },

    /// Locale text did not match any recognized alias.
    #[error("unrecognized locale {0:?}: supported are English, Chinese, Japanese and French")]
    UnknownLocale(String),

    /// The persistence layer is unreachable or kept conflicting.
    /// The requested operation was not applied.
    #[error("settings store unavailable: {0}")]
    StoreUnavailable(String),
}

impl From<StoreError> for SettingsError {
    fn from(err: StoreError) -> Self {
        // Reads carry no expected version, so a Conflict here can only come
        // from a write path that already exhausted its retries.
        SettingsError::StoreUnavailable(err.to_string())
    }
}
