// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Data model shared by every component: accounts, credential blobs, usage
//! snapshots, session identifiers, channel-map entries, and the progress
//! buffer record.

use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

use crate::error::SessionError;

#[allow(clippy::expect_used)]
static NAME_RE: LazyLock<regex::Regex> =
    LazyLock::new(|| regex::Regex::new(r"^[A-Za-z0-9_-]{1,64}$").expect("account name regex is a static literal"));

/// The reserved account name that always maps to the system default
/// profile directory.
pub const DEFAULT_ACCOUNT_NAME: &str = "default";

/// A named profile: names unique, `profile_dir` absolute, `priority`
/// lower-is-preferred.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub name: String,
    pub profile_dir: std::path::PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<u32>,
}

/// Returns `true` if `name` matches the account-name shape
/// `[A-Za-z0-9_-]{1,64}`.
pub fn is_valid_account_name(name: &str) -> bool {
    NAME_RE.is_match(name)
}

/// OAuth credential blob as persisted in the secret store / fallback file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CredentialBlob {
    pub access_token: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CredentialBlob {
    /// `true` once the blob is past its `expires_at` (or has none, which is
    /// treated as already expired so the caller proactively refreshes).
    pub fn is_expired(&self, now_ms: i64) -> bool {
        match self.expires_at {
            Some(exp) => now_ms >= exp,
            None => true,
        }
    }
}

/// One quota dimension: a percentage in `[0, 100]` and an optional
/// ISO-8601 reset timestamp.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UsageWindow {
    pub utilization: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resets_at: Option<String>,
}

/// A usage query result for one token at one moment. An `error`-carrying
/// snapshot is never selected by the scorer.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UsageSnapshot {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session: Option<UsageWindow>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weekly: Option<UsageWindow>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// `max(session, weekly)`, with a missing dimension treated as fully
/// exhausted (100.0) rather than zero, so a partial/error response never
/// looks artificially favorable to the scorer.
pub fn effective_utilization(snapshot: &UsageSnapshot) -> f64 {
    let session = snapshot.session.as_ref().map(|w| w.utilization).unwrap_or(100.0);
    let weekly = snapshot.weekly.as_ref().map(|w| w.utilization).unwrap_or(100.0);
    session.max(weekly)
}

/// Normalize a raw utilization value into `[0, 100]`.
///
/// `x` in `[0,1]` is assumed to be a fraction and scaled by 100; `x` in
/// `(1,100]` is assumed to already be a percentage; anything non-finite or
/// negative normalizes to `0.0`.
pub fn normalize_percent(x: f64) -> f64 {
    if !x.is_finite() || x < 0.0 {
        return 0.0;
    }
    if x <= 1.0 {
        (100.0 * x).round()
    } else {
        x.round().min(100.0)
    }
}

/// A validated session identifier: UUID v4 character shape
/// (8-4-4-4-12 hex, case-insensitive). This is a shape check only, not an
/// RFC 4122 version/variant check — the child generates these ids and we
/// don't control their variant bits.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Validate `s` against the UUID v4 character shape (8-4-4-4-12 hex,
/// case-insensitive). This is the sole defence against path traversal
/// through a session identifier — no path is ever constructed from an
/// unvalidated string.
///
/// Uses `uuid::Uuid::try_parse` for the character-shape check only —
/// deliberately not followed by a version/variant assertion, since the
/// child generates these ids and we don't control their variant bits
/// (see the Open Question this resolves).
pub fn validate_session_id(s: &str) -> Result<SessionId, SessionError> {
    // `try_parse` requires the canonical hyphenated 8-4-4-4-12 layout,
    // unlike `parse_str` which also accepts braced/urn/simple forms.
    match uuid::Uuid::try_parse(s) {
        Ok(uuid) => Ok(SessionId(uuid.hyphenated().to_string())),
        Err(_) => Err(SessionError::InvalidSessionId),
    }
}

/// A validated `cwd_hash`: the absolute working directory with every `/`
/// replaced by `-`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CwdHash(String);

impl CwdHash {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Build a `CwdHash` from a directory name already observed on disk
    /// (e.g. while enumerating `projects/*`). Not for use with untrusted
    /// input — [`cwd_hash`] is the validating constructor for that.
    pub fn from_raw(raw: String) -> Self {
        Self(raw)
    }
}

/// Compute the `cwd_hash` for `cwd`, expanding a leading `~` first.
pub fn cwd_hash(cwd: &str) -> CwdHash {
    let expanded = if let Some(rest) = cwd.strip_prefix('~') {
        match std::env::var("HOME") {
            Ok(home) => format!("{home}{rest}"),
            Err(_) => cwd.to_string(),
        }
    } else {
        cwd.to_string()
    };
    CwdHash(expanded.replace('/', "-"))
}

/// Persistent mapping from session id to chat-channel record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelMapEntry {
    pub session_id: String,
    pub channel_id: String,
    pub channel_name: String,
    pub tmux_session: String,
    pub project: String,
    pub cwd: String,
    pub active: bool,
    pub created_at: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub archived_at: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pending_message_ts: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress_message_ts: Option<String>,
}

impl ChannelMapEntry {
    /// The timestamp pruning compares against seven days: `archived_at` if
    /// present, else `created_at`.
    pub fn prune_reference_time(&self) -> i64 {
        self.archived_at.unwrap_or(self.created_at)
    }
}

/// One tool-activity event in a session's progress buffer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressEvent {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    pub ts: i64,
}

/// On-disk shape of a per-session progress buffer file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProgressBufferFile {
    pub events: Vec<ProgressEvent>,
    pub last_flush_ts: i64,
}

#[cfg(test)]
#[path = "model_tests.rs"]
mod tests;
