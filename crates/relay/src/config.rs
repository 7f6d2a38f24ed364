// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::path::PathBuf;

use clap::Parser;

fn default_config_dir() -> PathBuf {
    std::env::var_os("HOME").map(PathBuf::from).unwrap_or_else(|| PathBuf::from(".")).join(".swapsup")
}

/// Background relay between a chat system and one or more tmux sessions
/// running a supervised coding-assistant child.
#[derive(Debug, Parser)]
#[command(name = "swapsup-relay", version, about)]
pub struct RelayConfig {
    /// Directory holding the channel map this relay reads and writes.
    #[arg(long, env = "SWAPSUP_CONFIG_DIR")]
    pub config_dir: Option<PathBuf>,

    /// App-level token used to open the socket-mode connection.
    #[arg(long, env = "SWAPSUP_APP_TOKEN")]
    pub app_token: String,

    /// Bot token used for posting and reacting.
    #[arg(long, env = "SWAPSUP_BOT_TOKEN")]
    pub bot_token: String,

    /// Senders permitted to issue commands; empty means unrestricted.
    #[arg(long, env = "SWAPSUP_ALLOWED_USERS", value_delimiter = ',')]
    pub allowed_users: Vec<String>,

    /// Multiplexer session to relay into when a message arrives on a
    /// direct message or dedicated channel with no channel-map entry.
    #[arg(long, env = "SWAPSUP_DEFAULT_TMUX_SESSION")]
    pub default_tmux_session: Option<String>,

    /// Dedicated channel id that relays to `default_tmux_session` the
    /// same way a direct message does.
    #[arg(long, env = "SWAPSUP_DEDICATED_CHANNEL_ID")]
    pub dedicated_channel_id: Option<String>,

    /// tmux server socket path, for an isolated server instead of the
    /// user's default.
    #[arg(long, env = "SWAPSUP_TMUX_SOCKET")]
    pub tmux_socket: Option<PathBuf>,

    /// Log format (json or text).
    #[arg(long, env = "SWAPSUP_LOG_FORMAT", default_value = "text")]
    pub log_format: String,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, env = "SWAPSUP_LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

impl RelayConfig {
    pub fn effective_config_dir(&self) -> PathBuf {
        self.config_dir.clone().unwrap_or_else(default_config_dir)
    }

    pub fn channel_map_path(&self) -> PathBuf {
        self.effective_config_dir().join("channel-map.json")
    }

    pub fn is_allowed(&self, user_id: &str) -> bool {
        self.allowed_users.is_empty() || self.allowed_users.iter().any(|u| u == user_id)
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
