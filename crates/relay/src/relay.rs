// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Incoming message handling: allowlist gate, built-in commands, typing
//! reaction, and relaying free text into the multiplexer.

use serde_json::Value;

use swapsup_core::channel_map::ChannelMap;
use swapsup_core::chat::ChatClient;

use crate::config::RelayConfig;
use crate::tmux::Tmux;

const STATUS_TRUNCATE: usize = 3_900;
const HELP_TEXT: &str = "*commands*\n`!stop` interrupt the running session\n`!status` show the current pane\n`!archive` archive this channel\n`!help` show this message";

pub struct RelayContext<'a> {
    pub config: &'a RelayConfig,
    pub channel_map: &'a ChannelMap,
    pub chat: &'a ChatClient,
    pub tmux: &'a Tmux,
}

fn now_ms() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

/// Handle one `events_api` payload. Ignores anything that isn't a
/// `message`/`app_mention` event, a bot's own message, or a message with
/// a subtype (edits, joins, etc).
pub async fn handle_event(ctx: &RelayContext<'_>, payload: Value) {
    let event = &payload["event"];
    if event.get("bot_id").and_then(Value::as_str).is_some() {
        return;
    }
    if event.get("subtype").and_then(Value::as_str).is_some() {
        return;
    }

    let kind = event["type"].as_str().unwrap_or("");
    if kind != "message" && kind != "app_mention" {
        return;
    }

    let Some(channel_id) = event["channel"].as_str() else { return };
    let Some(user) = event["user"].as_str() else { return };
    let ts = event["ts"].as_str().unwrap_or_default().to_string();
    let text = strip_mention(event["text"].as_str().unwrap_or_default());

    if let Ok(Some(entry)) = ctx.channel_map.get_by_channel_id(channel_id) {
        if !entry.active {
            return;
        }
        if !ctx.config.is_allowed(user) {
            let _ = ctx.chat.post(channel_id, "you are not authorized to control this session", None).await;
            return;
        }

        match text.trim() {
            "!stop" => {
                let _ = ctx.tmux.send_interrupt(&entry.tmux_session).await;
            }
            "!status" => {
                if let Ok(pane) = ctx.tmux.capture_pane(&entry.tmux_session).await {
                    let truncated = truncate_chars(&pane, STATUS_TRUNCATE);
                    let _ = ctx.chat.post(channel_id, &format!("```{truncated}```"), None).await;
                }
            }
            "!archive" => {
                let _ = ctx.chat.archive(channel_id).await;
                let _ = ctx.channel_map.archive(channel_id, now_ms());
            }
            "!help" => {
                let _ = ctx.chat.post(channel_id, HELP_TEXT, None).await;
            }
            _ => {
                let _ = ctx.chat.add_reaction(channel_id, &ts, "hourglass_flowing_sand").await;
                let _ = ctx.channel_map.set_pending_message_ts(&entry.session_id, Some(ts), now_ms());
                let _ = ctx.tmux.relay_text(&entry.tmux_session, &text).await;
            }
        }
        return;
    }

    let is_direct_message = channel_id.starts_with('D');
    let is_dedicated = ctx.config.dedicated_channel_id.as_deref() == Some(channel_id);
    if (is_direct_message || is_dedicated) && !ctx.config.is_allowed(user) {
        return;
    }
    if let Some(session) = &ctx.config.default_tmux_session {
        if is_direct_message || is_dedicated {
            let _ = ctx.tmux.relay_text(session, &text).await;
        }
    }
}

fn strip_mention(text: &str) -> String {
    let trimmed = text.trim_start();
    if let Some(rest) = trimmed.strip_prefix('<') {
        if let Some(end) = rest.find('>') {
            return rest[end + 1..].trim_start().to_string();
        }
    }
    trimmed.to_string()
}

fn truncate_chars(s: &str, limit: usize) -> String {
    if s.chars().count() <= limit {
        s.to_string()
    } else {
        s.chars().take(limit).collect()
    }
}

#[cfg(test)]
#[path = "relay_tests.rs"]
mod tests;
