// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Stateless hook entrypoint: a one-shot worker spawned by the child on
//! lifecycle events. Reads its event context from stdin, dispatches on
//! event kind, and talks only to the filesystem and the chat API — it
//! never shares in-memory state with the relay daemon.

use serde::Deserialize;
use serde_json::Value;

use swapsup_core::channel_map::ChannelMap;
use swapsup_core::chat::{markdown_to_mrkdwn, ChatClient};
use swapsup_core::model::ProgressEvent;
use swapsup_core::progress::ProgressBuffer;

const WAITING_FOR_INPUT_TOOLS: &[&str] = &["AskUserQuestion", "ExitPlanMode"];
const PROGRESS_TRUNCATE: usize = 39_000;

/// The small closed set of lifecycle event kinds the hook dispatches on.
/// Modeled as a tagged variant rather than dynamic dispatch.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum HookEvent {
    SessionStart(SessionStartData),
    ToolUse(ToolUseData),
    WaitingForInput(WaitingForInputData),
    Completed(CompletedData),
    AccountSwitch(AccountSwitchData),
    SleepUntilReset(SleepData),
    SleepWake(SleepData),
}

#[derive(Debug, Clone, Deserialize)]
pub struct SessionStartData {
    pub session_id: String,
    pub cwd: String,
    pub tmux_session: String,
    pub project: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ToolUseData {
    pub session_id: String,
    pub tool_name: String,
    #[serde(default)]
    pub detail: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WaitingForInputData {
    pub session_id: String,
    pub tool_name: String,
    pub transcript_path: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CompletedData {
    pub session_id: String,
    pub transcript_path: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AccountSwitchData {
    pub session_id: String,
    pub from: String,
    pub to: String,
    pub reason: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SleepData {
    pub session_id: String,
    pub detail: String,
}

pub struct HookContext<'a> {
    pub channel_map: &'a ChannelMap,
    pub progress_dir: &'a std::path::Path,
    pub chat: &'a ChatClient,
}

fn now_ms() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

fn progress_path(dir: &std::path::Path, session_id: &str) -> std::path::PathBuf {
    dir.join(format!("progress-{session_id}.json"))
}

/// Dispatch one event. Returns `Ok(())` on success; errors are meant to
/// be logged by the caller, never to crash the child's hook runner.
pub async fn handle(ctx: &HookContext<'_>, event: HookEvent) -> anyhow::Result<()> {
    match event {
        HookEvent::SessionStart(data) => session_start(ctx, data).await,
        HookEvent::ToolUse(data) => tool_use(ctx, data).await,
        HookEvent::WaitingForInput(data) => waiting_for_input(ctx, data).await,
        HookEvent::Completed(data) => completed(ctx, data).await,
        HookEvent::AccountSwitch(data) => {
            let text = format!(":twisted_rightwards_arrows: switched from *{}* to *{}* ({})", data.from, data.to, data.reason);
            post_notice(ctx, &data.session_id, &text).await
        }
        HookEvent::SleepUntilReset(data) => {
            let text = format!(":zzz: sleeping until reset — {}", data.detail);
            post_notice(ctx, &data.session_id, &text).await
        }
        HookEvent::SleepWake(data) => {
            let text = format!(":alarm_clock: resumed — {}", data.detail);
            post_notice(ctx, &data.session_id, &text).await
        }
    }
}

async fn post_notice(ctx: &HookContext<'_>, session_id: &str, text: &str) -> anyhow::Result<()> {
    if let Some(entry) = ctx.channel_map.get(session_id)? {
        ctx.chat.post(&entry.channel_id, text, None).await?;
    }
    Ok(())
}

async fn session_start(ctx: &HookContext<'_>, data: SessionStartData) -> anyhow::Result<()> {
    if let Some(entry) = ctx.channel_map.reuse_for_tmux(&data.tmux_session, &data.session_id, now_ms())? {
        ctx.chat
            .post(&entry.channel_id, &format!(":arrows_counterclockwise: new session `{}` in this channel", data.session_id), None)
            .await?;
        return Ok(());
    }

    let channel_name = channel_name_for(&data.project, &data.session_id);
    let channel_id = ctx.chat.create_channel(&channel_name).await?;
    ctx.chat.set_topic(&channel_id, &data.cwd).await?;
    ctx.chat.post(&channel_id, ":wave: session started", None).await?;

    let entry = swapsup_core::model::ChannelMapEntry {
        session_id: data.session_id,
        channel_id,
        channel_name,
        tmux_session: data.tmux_session,
        project: data.project,
        cwd: data.cwd,
        active: true,
        created_at: now_ms(),
        archived_at: None,
        pending_message_ts: None,
        progress_message_ts: None,
    };
    ctx.channel_map.upsert(entry, now_ms())?;
    Ok(())
}

fn channel_name_for(project: &str, session_id: &str) -> String {
    let short = &session_id[..session_id.len().min(8)];
    format!("{project}-{short}")
}

async fn tool_use(ctx: &HookContext<'_>, data: ToolUseData) -> anyhow::Result<()> {
    let path = progress_path(ctx.progress_dir, &data.session_id);
    let buffer = ProgressBuffer::new(path);
    let now = now_ms();
    let event = ProgressEvent { kind: data.tool_name, detail: data.detail, ts: now };
    let buf = buffer.append(event, now)?;

    if buffer.is_flush_due(&buf, now) {
        let rendered = swapsup_core::progress::render_events(&buf.events);
        update_progress(ctx, &data.session_id, &rendered).await?;
        buffer.mark_flushed(now)?;
    }
    Ok(())
}

async fn update_progress(ctx: &HookContext<'_>, session_id: &str, text: &str) -> anyhow::Result<()> {
    let Some(entry) = ctx.channel_map.get(session_id)? else { return Ok(()) };
    match entry.progress_message_ts {
        Some(ts) => match ctx.chat.update(&entry.channel_id, &ts, text).await {
            Ok(()) => {}
            Err(_) => {
                let new_ts = ctx.chat.post(&entry.channel_id, text, None).await?;
                ctx.channel_map.set_progress_message_ts(session_id, Some(new_ts), now_ms())?;
            }
        },
        None => {
            let new_ts = ctx.chat.post(&entry.channel_id, text, None).await?;
            ctx.channel_map.set_progress_message_ts(session_id, Some(new_ts), now_ms())?;
        }
    }
    Ok(())
}

async fn waiting_for_input(ctx: &HookContext<'_>, data: WaitingForInputData) -> anyhow::Result<()> {
    if !WAITING_FOR_INPUT_TOOLS.contains(&data.tool_name.as_str()) {
        return Ok(());
    }
    let Some(entry) = ctx.channel_map.get(&data.session_id)? else { return Ok(()) };

    if let Some(ts) = entry.progress_message_ts.clone() {
        let _ = ctx.chat.delete(&entry.channel_id, &ts).await;
        ctx.channel_map.clear_progress(&data.session_id, now_ms())?;
    }

    let text = last_assistant_text(&data.transcript_path).unwrap_or_default();
    let converted = markdown_to_mrkdwn(&text);
    let truncated = truncate_chars(&converted, PROGRESS_TRUNCATE);
    ctx.chat.post(&entry.channel_id, &truncated, None).await?;
    Ok(())
}

async fn completed(ctx: &HookContext<'_>, data: CompletedData) -> anyhow::Result<()> {
    let Some(entry) = ctx.channel_map.get(&data.session_id)? else { return Ok(()) };

    if let Some(ts) = entry.pending_message_ts.clone() {
        let _ = ctx.chat.remove_reaction(&entry.channel_id, &ts, "hourglass_flowing_sand").await;
    }
    if let Some(ts) = entry.progress_message_ts.clone() {
        let _ = ctx.chat.delete(&entry.channel_id, &ts).await;
        ctx.channel_map.clear_progress(&data.session_id, now_ms())?;
    }

    let text = last_assistant_text(&data.transcript_path).unwrap_or_default();
    if text.chars().count() > PROGRESS_TRUNCATE {
        let head = truncate_chars(&text, PROGRESS_TRUNCATE);
        let ts = ctx.chat.post(&entry.channel_id, &head, None).await?;
        ctx.chat.post_thread(&entry.channel_id, &ts, &text).await?;
    } else {
        ctx.chat.post(&entry.channel_id, &text, None).await?;
    }
    Ok(())
}

fn truncate_chars(s: &str, limit: usize) -> String {
    if s.chars().count() <= limit {
        s.to_string()
    } else {
        s.chars().take(limit).collect()
    }
}

/// Walk a JSONL transcript backward to the last user message, then
/// return the final assistant text block following it.
fn last_assistant_text(transcript_path: &str) -> Option<String> {
    let contents = std::fs::read_to_string(transcript_path).ok()?;
    let lines: Vec<&str> = contents.lines().collect();

    let mut last_user_idx = None;
    for (i, line) in lines.iter().enumerate().rev() {
        let Ok(v) = serde_json::from_str::<Value>(line) else { continue };
        if v["type"] == "user" {
            last_user_idx = Some(i);
            break;
        }
    }
    let start = last_user_idx.unwrap_or(0);

    let mut assistant_text = None;
    for line in &lines[start..] {
        let Ok(v) = serde_json::from_str::<Value>(line) else { continue };
        if v["type"] != "assistant" {
            continue;
        }
        if let Some(content) = v["message"]["content"].as_array() {
            for block in content {
                if block["type"] == "text" {
                    if let Some(t) = block["text"].as_str() {
                        assistant_text = Some(t.to_string());
                    }
                }
            }
        }
    }
    assistant_text
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
