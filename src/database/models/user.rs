//! Per-user settings (global scope, not per guild).

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::settings::SettingsError;

/// Locale used for a user's game messages.
///
/// Serializes to the canonical two-letter lowercase code. Parsing accepts
/// the full alias table (`"French"`, `"japan"`, ...) case-insensitively.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Locale {
    #[default]
    En,
    Cn,
    Jp,
    Fr,
}

impl Locale {
    /// Canonical two-letter code.
    pub fn as_str(&self) -> &'static str {
        match self {
            Locale::En => "en",
            Locale::Cn => "cn",
            Locale::Jp => "jp",
            Locale::Fr => "fr",
        }
    }
}

impl FromStr for Locale {
    type Err = SettingsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "english" | "en" | "eng" => Ok(Locale::En),
            "chinese" | "cn" => Ok(Locale::Cn),
            "japan" | "japanese" | "jp" => Ok(Locale::Jp),
            "french" | "fr" => Ok(Locale::Fr),
            _ => Err(SettingsError::UnknownLocale(s.to_string())),
        }
    }
}

impl fmt::Display for Locale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Settings for a single user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserSettings {
    /// Platform user ID.
    pub user_id: u64,

    /// Suppress levelling notification messages for this user.
    #[serde(default)]
    pub silence: bool,

    /// Locale for game messages sent to this user.
    #[serde(default)]
    pub locale: Locale,

    /// Optimistic concurrency stamp; 0 means never persisted.
    #[serde(default)]
    pub version: i64,

    /// Unix timestamp of last update.
    #[serde(default)]
    pub updated_at: i64,
}

impl UserSettings {
    /// Create a default record (notifications on, English locale).
    pub fn new(user_id: u64) -> Self {
        Self {
            user_id,
            silence: false,
            locale: Locale::default(),
            version: 0,
            updated_at: chrono::Utc::now().timestamp(),
        }
    }
}
