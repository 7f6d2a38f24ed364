// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Thin subprocess wrapper over the `tmux` CLI: capture a pane, send
//! literal text, send a single key, and archive-adjacent lifecycle
//! queries. Every invocation optionally addresses an isolated server via
//! `-S <socket>`.

use std::path::PathBuf;
use std::time::Duration;

use tokio::process::Command;

/// Delay between sending literal text and the trailing `Enter` keypress,
/// so the child never sees interleaved partial input from two separate
/// tmux invocations racing each other.
pub const SEND_KEYS_ENTER_DELAY: Duration = Duration::from_millis(300);

/// Longest literal text a single `send-keys -l` call will relay; longer
/// input is cut rather than handed to the child a character at a time.
const RELAY_TEXT_LIMIT: usize = 4_096;

pub struct Tmux {
    socket: Option<PathBuf>,
}

impl Tmux {
    pub fn new(socket: Option<PathBuf>) -> Self {
        Self { socket }
    }

    fn cmd(&self) -> Command {
        let mut cmd = Command::new("tmux");
        if let Some(s) = &self.socket {
            cmd.arg("-S").arg(s);
        }
        cmd
    }

    pub async fn has_session(&self, session: &str) -> bool {
        self.cmd()
            .args(["has-session", "-t", session])
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::null())
            .status()
            .await
            .map(|s| s.success())
            .unwrap_or(false)
    }

    /// Send `text` as literal keys (never interpreted as key names), then
    /// after [`SEND_KEYS_ENTER_DELAY`] send a single `Enter`.
    pub async fn relay_text(&self, session: &str, text: &str) -> anyhow::Result<()> {
        let truncated = truncate_chars(text, RELAY_TEXT_LIMIT);
        let status = self
            .cmd()
            .args(["send-keys", "-l", "-t", session, &truncated])
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::null())
            .status()
            .await?;
        if !status.success() {
            anyhow::bail!("tmux send-keys failed for session {session}");
        }
        tokio::time::sleep(SEND_KEYS_ENTER_DELAY).await;
        let status = self
            .cmd()
            .args(["send-keys", "-t", session, "Enter"])
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::null())
            .status()
            .await?;
        if !status.success() {
            anyhow::bail!("tmux send-keys (Enter) failed for session {session}");
        }
        Ok(())
    }

    /// Send the key sequence that produces a SIGINT in the foreground
    /// process group of `session` (used by the `!stop` command).
    pub async fn send_interrupt(&self, session: &str) -> anyhow::Result<()> {
        let status = self
            .cmd()
            .args(["send-keys", "-t", session, "C-c"])
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::null())
            .status()
            .await?;
        if !status.success() {
            anyhow::bail!("tmux send-keys (C-c) failed for session {session}");
        }
        Ok(())
    }

    pub async fn capture_pane(&self, session: &str) -> anyhow::Result<String> {
        let output = self.cmd().args(["capture-pane", "-p", "-t", session]).output().await?;
        if !output.status.success() {
            anyhow::bail!("tmux capture-pane failed for session {session}");
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

fn truncate_chars(s: &str, limit: usize) -> String {
    if s.chars().count() <= limit {
        s.to_string()
    } else {
        s.chars().take(limit).collect()
    }
}

#[cfg(test)]
#[path = "tmux_tests.rs"]
mod tests;
