//! Bot configuration.
//!
//! Loaded from a TOML file named on the command line. The platform
//! credential is deliberately not part of the file; it comes from the
//! environment (or `--token`).

use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

use hallway_sdk::model::{ChannelId, GuildId};

/// Default command prefix.
pub const DEFAULT_PREFIX: &str = "!";

/// A statically configured lobby: joining it triggers room creation.
#[derive(Debug, Clone, Deserialize)]
pub struct Lobby {
    /// The lobby voice channel.
    pub channel_id: ChannelId,
    /// Category new rooms are created under.
    pub category_id: ChannelId,
    /// Member cap for created rooms. Absent means unlimited.
    #[serde(default)]
    pub user_limit: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BotConfig {
    /// The guild this bot operates in.
    pub guild_id: GuildId,
    /// Fixed lobby channels (typically duo, squad, and no-limit).
    #[serde(rename = "lobby")]
    pub lobbies: Vec<Lobby>,
    /// Text channel for user-facing confirmations.
    pub bot_channel_id: ChannelId,
    /// Text channel for audit lines.
    pub log_channel_id: ChannelId,
    /// Command prefix.
    #[serde(default = "default_prefix")]
    pub command_prefix: String,
    /// Base URL of the platform's HTTP API.
    pub api_base: String,
    /// Websocket URL of the platform's gateway.
    pub gateway_url: String,
    /// Supervisor argv invoked by the restart command,
    /// e.g. `["pm2", "restart", "hallway"]`.
    #[serde(default)]
    pub restart_command: Vec<String>,
}

fn default_prefix() -> String {
    DEFAULT_PREFIX.to_string()
}

impl BotConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        toml::from_str(&raw).with_context(|| format!("failed to parse {}", path.display()))
    }

    /// Static lookup table: lobby channel id → (category, member cap).
    pub fn lobby(&self, channel: ChannelId) -> Option<&Lobby> {
        self.lobbies.iter().find(|l| l.channel_id == channel)
    }
}
