// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::path::PathBuf;

use clap::Parser;

fn default_config_dir() -> PathBuf {
    dirs_home().join(".swapsup")
}

fn dirs_home() -> PathBuf {
    std::env::var_os("HOME").map(PathBuf::from).unwrap_or_else(|| PathBuf::from("."))
}

/// Runs a single interactive coding-assistant session across multiple
/// provider accounts, migrating on-disk session state and resuming on
/// another account when the active one hits its rate limit.
#[derive(Debug, Parser)]
#[command(name = "swapsup", version, about)]
pub struct Config {
    /// Directory holding the account registry, credential fallback file,
    /// channel map, and progress buffers. Defaults to `~/.swapsup`.
    #[arg(long, env = "SWAPSUP_CONFIG_DIR")]
    pub config_dir: Option<PathBuf>,

    /// Environment variable name used to tell the child which profile
    /// directory to read its own credentials from.
    #[arg(long, env = "SWAPSUP_CHILD_CONFIG_DIR_ENV", default_value = "CLAUDE_CONFIG_DIR")]
    pub child_config_dir_env: String,

    /// Quota usage endpoint.
    #[arg(long, env = "SWAPSUP_USAGE_URL", default_value = "https://api.anthropic.com/api/oauth/usage")]
    pub usage_url: String,

    /// Account profile endpoint.
    #[arg(long, env = "SWAPSUP_PROFILE_URL", default_value = "https://api.anthropic.com/api/oauth/profile")]
    pub profile_url: String,

    /// OAuth token refresh endpoint.
    #[arg(long, env = "SWAPSUP_OAUTH_TOKEN_URL", default_value = "https://console.anthropic.com/v1/oauth/token")]
    pub oauth_token_url: String,

    /// Maximum swaps before giving up and exiting non-zero. Defaults to
    /// `max(5, 2 * accounts.len())`.
    #[arg(long, env = "SWAPSUP_MAX_SWAPS")]
    pub max_swaps: Option<u32>,

    /// Prefer the priority-with-threshold-partitioning scorer policy
    /// over plain lowest-utilization.
    #[arg(long, env = "SWAPSUP_USE_PRIORITY", default_value = "false")]
    pub use_priority: bool,

    /// Run as an unattended background session relayed through a chat
    /// channel rather than an attached terminal.
    #[arg(long, env = "SWAPSUP_REMOTE_MODE", default_value = "false")]
    pub remote_mode: bool,

    /// Multiplexer session name, required when `--remote-mode` is set.
    #[arg(long, env = "SWAPSUP_TMUX_SESSION")]
    pub tmux_session: Option<String>,

    /// Bot token for the chat system used in remote mode.
    #[arg(long, env = "SWAPSUP_BOT_TOKEN")]
    pub bot_token: Option<String>,

    /// Log format (json or text).
    #[arg(long, env = "SWAPSUP_LOG_FORMAT", default_value = "text")]
    pub log_format: String,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, env = "SWAPSUP_LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Account to start on. Defaults to the registry's `default` account.
    #[arg(long, env = "SWAPSUP_ACCOUNT")]
    pub account: Option<String>,

    /// Child command to run (after `--`), e.g. `claude`.
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub command: Vec<String>,
}

impl Config {
    /// Validate the configuration after parsing.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.command.is_empty() {
            anyhow::bail!("a child command must be specified after `--`");
        }
        if self.remote_mode {
            if self.tmux_session.is_none() {
                anyhow::bail!("--tmux-session is required with --remote-mode");
            }
            if self.bot_token.is_none() {
                anyhow::bail!("--bot-token is required with --remote-mode");
            }
        }
        Ok(())
    }

    pub fn effective_config_dir(&self) -> PathBuf {
        self.config_dir.clone().unwrap_or_else(default_config_dir)
    }

    pub fn registry_path(&self) -> PathBuf {
        self.effective_config_dir().join("accounts.json")
    }

    pub fn channel_map_path(&self) -> PathBuf {
        self.effective_config_dir().join("channel-map.json")
    }

    pub fn progress_dir(&self) -> PathBuf {
        self.effective_config_dir().join("progress")
    }

    pub fn default_profile_dir(&self) -> PathBuf {
        dirs_home().join(".claude")
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
