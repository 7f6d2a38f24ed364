// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Channel map: durable, single-JSON, atomic-write registry mapping
//! session id to chat-channel record.
//!
//! Last-writer-wins across processes through read-modify-write + atomic
//! rename. `clear_progress` re-reads the map after its chat-API call
//! specifically to avoid clobbering a concurrent `set_typing` write.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::atomic_file;
use crate::error::ChannelError;
use crate::model::ChannelMapEntry;

const PRUNE_AGE_MS: i64 = 7 * 24 * 60 * 60 * 1000;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct ChannelMapDoc {
    entries: Vec<ChannelMapEntry>,
}

pub struct ChannelMap {
    path: PathBuf,
}

impl ChannelMap {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    fn load(&self) -> anyhow::Result<ChannelMapDoc> {
        Ok(atomic_file::read(&self.path)?.unwrap_or_default())
    }

    /// Persist `doc`, pruning inactive entries older than seven days first.
    fn save(&self, mut doc: ChannelMapDoc, now_ms: i64) -> anyhow::Result<()> {
        doc.entries.retain(|e| e.active || now_ms - e.prune_reference_time() < PRUNE_AGE_MS);
        atomic_file::write(&self.path, &doc)
    }

    pub fn get(&self, session_id: &str) -> anyhow::Result<Option<ChannelMapEntry>> {
        Ok(self.load()?.entries.into_iter().find(|e| e.session_id == session_id))
    }

    pub fn get_by_cwd(&self, cwd: &str) -> anyhow::Result<Option<ChannelMapEntry>> {
        Ok(self.load()?.entries.into_iter().find(|e| e.active && e.cwd == cwd))
    }

    pub fn get_by_channel_id(&self, channel_id: &str) -> anyhow::Result<Option<ChannelMapEntry>> {
        Ok(self.load()?.entries.into_iter().find(|e| e.channel_id == channel_id))
    }

    /// Insert or replace the mapping for `session_id`.
    pub fn upsert(&self, entry: ChannelMapEntry, now_ms: i64) -> anyhow::Result<()> {
        let mut doc = self.load()?;
        doc.entries.retain(|e| e.session_id != entry.session_id);
        doc.entries.push(entry);
        self.save(doc, now_ms)
    }

    /// Archive `channel_id`: mark every entry with that channel id
    /// inactive, stamping `archived_at = now_ms`.
    pub fn archive(&self, channel_id: &str, now_ms: i64) -> anyhow::Result<()> {
        let mut doc = self.load()?;
        for entry in doc.entries.iter_mut().filter(|e| e.channel_id == channel_id) {
            entry.active = false;
            entry.archived_at = Some(now_ms);
        }
        self.save(doc, now_ms)
    }

    /// If an active entry exists for `tmux_session`, remap it to
    /// `new_session_id`, deactivating the old entry — used when the user
    /// clears-and-restarts within the same multiplexer session.
    pub fn reuse_for_tmux(
        &self,
        tmux_session: &str,
        new_session_id: &str,
        now_ms: i64,
    ) -> anyhow::Result<Option<ChannelMapEntry>> {
        let mut doc = self.load()?;
        let Some(idx) = doc.entries.iter().position(|e| e.active && e.tmux_session == tmux_session) else {
            return Ok(None);
        };

        let mut reused = doc.entries[idx].clone();
        doc.entries[idx].active = false;
        doc.entries[idx].archived_at = Some(now_ms);

        reused.session_id = new_session_id.to_string();
        reused.active = true;
        reused.archived_at = None;
        reused.progress_message_ts = None;
        doc.entries.push(reused.clone());

        self.save(doc, now_ms)?;
        Ok(Some(reused))
    }

    /// Deactivate any active entry for `tmux_session` without creating a
    /// replacement — used at the start of a fresh lineage in remote mode,
    /// before the first `run_once` of a new swap loop.
    pub fn deactivate_for_tmux(&self, tmux_session: &str, now_ms: i64) -> anyhow::Result<()> {
        let mut doc = self.load()?;
        for entry in doc.entries.iter_mut().filter(|e| e.active && e.tmux_session == tmux_session) {
            entry.active = false;
            entry.archived_at = Some(now_ms);
        }
        self.save(doc, now_ms)
    }

    /// Record `pending_message_ts` for the session (set-typing bookkeeping).
    pub fn set_pending_message_ts(&self, session_id: &str, ts: Option<String>, now_ms: i64) -> anyhow::Result<()> {
        let mut doc = self.load()?;
        if let Some(entry) = doc.entries.iter_mut().find(|e| e.session_id == session_id) {
            entry.pending_message_ts = ts;
        }
        self.save(doc, now_ms)
    }

    /// Record `progress_message_ts` for the session.
    pub fn set_progress_message_ts(&self, session_id: &str, ts: Option<String>, now_ms: i64) -> anyhow::Result<()> {
        let mut doc = self.load()?;
        if let Some(entry) = doc.entries.iter_mut().find(|e| e.session_id == session_id) {
            entry.progress_message_ts = ts;
        }
        self.save(doc, now_ms)
    }

    /// Clear the progress field for `session_id`. Re-reads the map after
    /// the caller's own chat-API delete call so a concurrent
    /// `set_typing` write in between is not clobbered.
    pub fn clear_progress(&self, session_id: &str, now_ms: i64) -> anyhow::Result<()> {
        self.set_progress_message_ts(session_id, None, now_ms)
    }

    /// Map a channel-layer error to whether the mapping it applies to
    /// should be deactivated instead of retried.
    pub fn should_deactivate_on(&self, err: &ChannelError) -> bool {
        err.should_deactivate()
    }
}

#[cfg(test)]
#[path = "channel_map_tests.rs"]
mod tests;
