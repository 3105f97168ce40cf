//! Chat-level configuration.
//!
//! Every field has a default, so an empty `chat` section (or none at all)
//! produces a working server.

use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Thresholds for the two rate limits applied per identity.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct AntispamConfig {
    /// Connections allowed inside `join_window_secs` before the identity is banned.
    pub join_limit: usize,
    pub join_window_secs: u64,
    /// Messages inside `message_window_secs` at which a warning is broadcast.
    pub message_warn: usize,
    /// Messages inside `message_window_secs` at which the sender is banned.
    pub message_ban: usize,
    pub message_window_secs: u64,
}

impl AntispamConfig {
    pub fn join_window(&self) -> Duration {
        Duration::from_secs(self.join_window_secs)
    }

    pub fn message_window(&self) -> Duration {
        Duration::from_secs(self.message_window_secs)
    }
}

impl Default for AntispamConfig {
    fn default() -> Self {
        Self {
            join_limit: 6,
            join_window_secs: 60,
            message_warn: 30,
            message_ban: 50,
            message_window_secs: 5,
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    /// Room every session starts in. Never removed and the only room with a backlog.
    pub default_room: String,
    /// Name used for system notices; users may not take it.
    pub system_name: String,
    /// Number of messages the default room keeps for replay.
    pub scrollback: usize,
    /// Longest message accepted, in bytes. Longer input is truncated.
    pub max_message_length: usize,
    pub ban_file: PathBuf,
    /// Usernames containing any of these (case-insensitively) get their owner banned.
    pub denied_name_words: Vec<String>,
    pub antispam: AntispamConfig,
    /// How long the shutdown farewell may take before the process gives up on it.
    pub shutdown_timeout_ms: u64,
}

impl ChatConfig {
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            default_room: "#main".to_owned(),
            system_name: "devbot".to_owned(),
            scrollback: 16,
            max_message_length: 5120,
            ban_file: PathBuf::from("bans.json"),
            denied_name_words: Vec::new(),
            antispam: AntispamConfig::default(),
            shutdown_timeout_ms: 1000,
        }
    }
}
