// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Minimal Web API client for the chat system used by both the hook
//! entrypoint and the relay daemon: post/update/delete messages, typing
//! reactions, and channel lifecycle (create/topic/invite/archive).
//!
//! Shared here rather than duplicated per consumer, since both the
//! one-shot hook worker and the long-lived relay daemon need the same
//! authenticated calls against the same API.

use std::time::Duration;

use serde_json::{json, Value};

const API_TIMEOUT: Duration = Duration::from_secs(10);
const BASE_URL: &str = "https://slack.com/api";

/// Chunk `text` at [`MAX_MESSAGE_CHARS`] characters, preferring to break
/// on the nearest newline so a single logical block of output isn't cut
/// mid-line.
pub const MAX_MESSAGE_CHARS: usize = 39_500;

pub struct ChatClient {
    client: reqwest::Client,
    bot_token: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ChatApiError {
    #[error("timeout")]
    Timeout,
    #[error("HTTP {0}")]
    Http(u16),
    #[error("{0}")]
    Api(String),
}

impl ChatClient {
    pub fn new(client: reqwest::Client, bot_token: String) -> Self {
        Self { client, bot_token }
    }

    async fn call(&self, method: &str, body: Value) -> Result<Value, ChatApiError> {
        let resp = self
            .client
            .post(format!("{BASE_URL}/{method}"))
            .header("Authorization", format!("Bearer {}", self.bot_token))
            .timeout(API_TIMEOUT)
            .json(&body)
            .send()
            .await
            .map_err(|_| ChatApiError::Timeout)?;

        let status = resp.status();
        let parsed: Value = resp.json().await.map_err(|_| ChatApiError::Http(status.as_u16()))?;
        if !status.is_success() || parsed["ok"].as_bool() != Some(true) {
            let err = parsed["error"].as_str().unwrap_or("unknown error").to_string();
            return Err(ChatApiError::Api(err));
        }
        Ok(parsed)
    }

    /// Post `text` to `channel`, returning the message timestamp. Splits
    /// `text` into [`MAX_MESSAGE_CHARS`]-sized chunks on the nearest
    /// preceding newline, posting each as a separate message; returns the
    /// timestamp of the first chunk.
    pub async fn post(&self, channel: &str, text: &str, blocks: Option<Value>) -> Result<String, ChatApiError> {
        let chunks = chunk_text(text, MAX_MESSAGE_CHARS);
        let mut first_ts = None;
        for (i, chunk) in chunks.iter().enumerate() {
            let mut body = json!({ "channel": channel, "text": chunk });
            if i == 0 {
                if let Some(b) = &blocks {
                    body["blocks"] = b.clone();
                }
            }
            let resp = self.call("chat.postMessage", body).await?;
            if first_ts.is_none() {
                first_ts = resp["ts"].as_str().map(str::to_string);
            }
        }
        first_ts.ok_or_else(|| ChatApiError::Api("no message posted".to_string()))
    }

    pub async fn post_thread(&self, channel: &str, parent_ts: &str, text: &str) -> Result<String, ChatApiError> {
        let resp = self
            .call("chat.postMessage", json!({ "channel": channel, "text": text, "thread_ts": parent_ts }))
            .await?;
        resp["ts"].as_str().map(str::to_string).ok_or_else(|| ChatApiError::Api("missing ts".to_string()))
    }

    pub async fn update(&self, channel: &str, ts: &str, text: &str) -> Result<(), ChatApiError> {
        self.call("chat.update", json!({ "channel": channel, "ts": ts, "text": text })).await?;
        Ok(())
    }

    pub async fn delete(&self, channel: &str, ts: &str) -> Result<(), ChatApiError> {
        self.call("chat.delete", json!({ "channel": channel, "ts": ts })).await?;
        Ok(())
    }

    pub async fn add_reaction(&self, channel: &str, ts: &str, emoji: &str) -> Result<(), ChatApiError> {
        self.call("reactions.add", json!({ "channel": channel, "timestamp": ts, "name": emoji })).await?;
        Ok(())
    }

    pub async fn remove_reaction(&self, channel: &str, ts: &str, emoji: &str) -> Result<(), ChatApiError> {
        self.call("reactions.remove", json!({ "channel": channel, "timestamp": ts, "name": emoji })).await?;
        Ok(())
    }

    pub async fn create_channel(&self, name: &str) -> Result<String, ChatApiError> {
        let resp = self.call("conversations.create", json!({ "name": name })).await?;
        resp["channel"]["id"].as_str().map(str::to_string).ok_or_else(|| ChatApiError::Api("missing channel id".to_string()))
    }

    pub async fn set_topic(&self, channel: &str, topic: &str) -> Result<(), ChatApiError> {
        self.call("conversations.setTopic", json!({ "channel": channel, "topic": topic })).await?;
        Ok(())
    }

    pub async fn invite(&self, channel: &str, user_id: &str) -> Result<(), ChatApiError> {
        self.call("conversations.invite", json!({ "channel": channel, "users": user_id })).await?;
        Ok(())
    }

    pub async fn archive(&self, channel: &str) -> Result<(), ChatApiError> {
        self.call("conversations.archive", json!({ "channel": channel })).await?;
        Ok(())
    }

}

/// Convert the child's flavored markdown (`**bold**`, `# Header`,
/// `[text](url)`) into the chat system's mrkdwn (`*bold*`, `*Header*`,
/// `<url|text>`). Code spans and plain text pass through unchanged —
/// backtick fencing is already valid mrkdwn.
pub fn markdown_to_mrkdwn(text: &str) -> String {
    text.lines().map(convert_line).collect::<Vec<_>>().join("\n")
}

fn convert_line(line: &str) -> String {
    let trimmed = line.trim_start();
    let indent = &line[..line.len() - trimmed.len()];
    for prefix in ["### ", "## ", "# "] {
        if let Some(header) = trimmed.strip_prefix(prefix) {
            return format!("{indent}*{}*", convert_links(&convert_bold(header)));
        }
    }
    format!("{indent}{}", convert_links(&convert_bold(trimmed)))
}

/// Convert markdown links `[text](url)` to `<url|text>`.
fn convert_links(input: &str) -> String {
    let chars: Vec<char> = input.chars().collect();
    let mut out = String::with_capacity(input.len());
    let mut i = 0;
    while i < chars.len() {
        if chars[i] == '[' {
            if let Some((text, url, end)) = parse_md_link(&chars, i) {
                out.push('<');
                out.push_str(&url);
                out.push('|');
                out.push_str(&text);
                out.push('>');
                i = end;
                continue;
            }
        }
        out.push(chars[i]);
        i += 1;
    }
    out
}

fn parse_md_link(chars: &[char], start: usize) -> Option<(String, String, usize)> {
    let mut i = start + 1;
    let mut text = String::new();
    while i < chars.len() && chars[i] != ']' {
        text.push(chars[i]);
        i += 1;
    }
    if i >= chars.len() {
        return None;
    }
    i += 1;
    if i >= chars.len() || chars[i] != '(' {
        return None;
    }
    i += 1;
    let mut url = String::new();
    while i < chars.len() && chars[i] != ')' {
        url.push(chars[i]);
        i += 1;
    }
    if i >= chars.len() {
        return None;
    }
    Some((text, url, i + 1))
}

/// Convert markdown bold `**text**` to mrkdwn bold `*text*`.
fn convert_bold(input: &str) -> String {
    let chars: Vec<char> = input.chars().collect();
    let mut out = String::with_capacity(input.len());
    let mut i = 0;
    while i < chars.len() {
        if i + 1 < chars.len() && chars[i] == '*' && chars[i + 1] == '*' {
            if let Some(end) = find_closing_double_star(&chars, i + 2) {
                out.push('*');
                out.extend(&chars[i + 2..end]);
                out.push('*');
                i = end + 2;
                continue;
            }
        }
        out.push(chars[i]);
        i += 1;
    }
    out
}

fn find_closing_double_star(chars: &[char], start: usize) -> Option<usize> {
    let mut i = start;
    while i + 1 < chars.len() {
        if chars[i] == '*' && chars[i + 1] == '*' {
            return Some(i);
        }
        i += 1;
    }
    None
}

/// Split `text` into chunks no longer than `limit` characters, breaking
/// on the nearest newline at or before the limit when one exists.
pub fn chunk_text(text: &str, limit: usize) -> Vec<String> {
    if text.chars().count() <= limit {
        return vec![text.to_string()];
    }
    let mut chunks = Vec::new();
    let chars: Vec<char> = text.chars().collect();
    let mut start = 0;
    while start < chars.len() {
        let end = (start + limit).min(chars.len());
        let mut split_at = end;
        if end < chars.len() {
            if let Some(nl) = chars[start..end].iter().rposition(|c| *c == '\n') {
                split_at = start + nl + 1;
            }
        }
        if split_at == start {
            split_at = end;
        }
        chunks.push(chars[start..split_at].iter().collect());
        start = split_at;
    }
    chunks
}

#[cfg(test)]
#[path = "chat_tests.rs"]
mod tests;
