//! Per-guild spawn settings.

use serde::{Deserialize, Serialize};

/// Where spawns are allowed in a guild, derived from `toggle` and
/// `active_channels`. The three states are mutually exclusive and
/// exhaustive; no separate state field is stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpawnScope {
    /// Spawn system is off for the guild.
    Disabled,
    /// Spawns allowed in every channel (enabled, no allow-list).
    EnabledAll,
    /// Spawns allowed only in the allow-listed channels.
    EnabledRestricted,
}

/// Spawn configuration for a single guild.
///
/// The persisted record and the published cache snapshot are the same type;
/// snapshots are handed out as `Arc<GuildSettings>` and never mutated after
/// publication.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuildSettings {
    /// Guild (chat) ID.
    pub guild_id: i64,

    /// Whether the spawn system is enabled for this guild.
    #[serde(default)]
    pub toggle: bool,

    /// Allow-listed channel IDs. Empty means all channels when enabled.
    /// Contains no duplicates.
    #[serde(default)]
    pub active_channels: Vec<i64>,

    /// Optimistic concurrency stamp; bumped on every persisted write.
    /// 0 means the record has never been persisted.
    #[serde(default)]
    pub version: i64,

    /// Unix timestamp of last update.
    #[serde(default)]
    pub updated_at: i64,
}

impl GuildSettings {
    /// Create a default record for a guild (spawns off, no allow-list).
    pub fn new(guild_id: i64) -> Self {
        Self {
            guild_id,
            toggle: false,
            active_channels: Vec::new(),
            version: 0,
            updated_at: chrono::Utc::now().timestamp(),
        }
    }

    /// Toggle a channel's allow-list membership.
    ///
    /// Returns `true` if the channel was added, `false` if removed.
    pub fn toggle_channel(&mut self, channel_id: i64) -> bool {
        if let Some(pos) = self.active_channels.iter().position(|&c| c == channel_id) {
            self.active_channels.remove(pos);
            false
        } else {
            self.active_channels.push(channel_id);
            true
        }
    }

    /// Derive the spawn scope for this guild.
    pub fn spawn_scope(&self) -> SpawnScope {
        if !self.toggle {
            SpawnScope::Disabled
        } else if self.active_channels.is_empty() {
            SpawnScope::EnabledAll
        } else {
            SpawnScope::EnabledRestricted
        }
    }

    /// Per-message hot path check: may a spawn fire in this channel?
    pub fn allows_spawns_in(&self, channel_id: i64) -> bool {
        match self.spawn_scope() {
            SpawnScope::Disabled => false,
            SpawnScope::EnabledAll => true,
            SpawnScope::EnabledRestricted => self.active_channels.contains(&channel_id),
        }
    }
}
