// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Progress buffer: per-session on-disk accumulator of recent tool-use
//! events, throttled to a flush roughly every 3 seconds.
//!
//! The `last_flush_ts = 0` on a missing file is deliberate so the first
//! event flushes immediately; a corrupt/empty file instead sets it to
//! `now` to avoid a spurious immediate flush on read failure. This
//! asymmetry is load-bearing and must not be "fixed".

use std::path::PathBuf;

use crate::atomic_file;
use crate::model::{ProgressBufferFile, ProgressEvent};

const MAX_EVENTS: usize = 100;
const FLUSH_INTERVAL_MS: i64 = 3_000;
const RENDER_KEEP_LAST: usize = 8;

pub struct ProgressBuffer {
    path: PathBuf,
}

impl ProgressBuffer {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Read the buffer. A missing file returns `last_flush_ts = 0`; a
    /// corrupt or empty file returns `last_flush_ts = now_ms`.
    pub fn read(&self, now_ms: i64) -> ProgressBufferFile {
        match std::fs::read_to_string(&self.path) {
            Err(_) => ProgressBufferFile { events: Vec::new(), last_flush_ts: 0 },
            Ok(contents) => match serde_json::from_str::<ProgressBufferFile>(&contents) {
                Ok(buf) => buf,
                Err(_) => ProgressBufferFile { events: Vec::new(), last_flush_ts: now_ms },
            },
        }
    }

    /// Append an event, capping the buffer at the most recent
    /// [`MAX_EVENTS`].
    pub fn append(&self, event: ProgressEvent, now_ms: i64) -> anyhow::Result<ProgressBufferFile> {
        let mut buf = self.read(now_ms);
        buf.events.push(event);
        if buf.events.len() > MAX_EVENTS {
            let excess = buf.events.len() - MAX_EVENTS;
            buf.events.drain(0..excess);
        }
        atomic_file::write(&self.path, &buf)?;
        Ok(buf)
    }

    /// `true` when at least [`FLUSH_INTERVAL_MS`] have elapsed since
    /// `buf.last_flush_ts`.
    pub fn is_flush_due(&self, buf: &ProgressBufferFile, now_ms: i64) -> bool {
        now_ms - buf.last_flush_ts >= FLUSH_INTERVAL_MS
    }

    /// Mark the buffer flushed: clear events, stamp `last_flush_ts = now`.
    pub fn mark_flushed(&self, now_ms: i64) -> anyhow::Result<()> {
        let buf = ProgressBufferFile { events: Vec::new(), last_flush_ts: now_ms };
        atomic_file::write(&self.path, &buf)
    }
}

/// Render a flush's events into a short bullet list: dedupe consecutive
/// duplicates, keep only the last [`RENDER_KEEP_LAST`], one bullet per
/// event with its optional detail.
pub fn render_events(events: &[ProgressEvent]) -> String {
    let mut deduped: Vec<&ProgressEvent> = Vec::new();
    for event in events {
        let is_dup = deduped
            .last()
            .map(|prev| prev.kind == event.kind && prev.detail == event.detail)
            .unwrap_or(false);
        if !is_dup {
            deduped.push(event);
        }
    }

    let start = deduped.len().saturating_sub(RENDER_KEEP_LAST);
    deduped[start..]
        .iter()
        .map(|event| match &event.detail {
            Some(detail) => format!("\u{2022} {} — {detail}", event.kind),
            None => format!("\u{2022} {}", event.kind),
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
#[path = "progress_tests.rs"]
mod tests;
