// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Typed error taxonomy for the credential, usage, session, swap, and
//! channel layers. Flow-level control (the swap loop, `main`, the relay
//! loop) uses `anyhow::Result`; these enums exist for the error kinds that
//! are matched on rather than merely logged — the scorer filters on
//! [`UsageError`], the swap loop matches [`SwapError`], and the relay
//! deactivates mappings on specific [`ChannelError`] variants.

use serde::{Deserialize, Serialize};

/// Errors from reading, writing, or refreshing an OAuth credential blob.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
pub enum CredentialError {
    #[error("no_credentials")]
    NoCredentials,
    #[error("no_refresh_token")]
    NoRefreshToken,
    #[error("parse_failed")]
    ParseFailed,
    #[error("invalid_token_format")]
    InvalidTokenFormat,
    #[error("keychain_write_failed")]
    KeychainWriteFailed,
    #[error("timeout")]
    Timeout,
    #[error("HTTP {0}")]
    Http(u16),
    #[error("unsupported_platform")]
    UnsupportedPlatform,
    /// The server responded non-2xx with a parseable `error`/`error_description`
    /// body; this carries that text instead of the bare status code.
    #[error("{0}")]
    ServerMessage(String),
}

impl CredentialError {
    pub fn as_code(&self) -> String {
        match self {
            Self::Http(status) => format!("HTTP {status}"),
            other => other.to_string(),
        }
    }
}

/// Errors from the usage client. Carried as data inside a snapshot's
/// `error` field, never raised — see [`crate::model::UsageSnapshot`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
pub enum UsageError {
    #[error("HTTP {0}")]
    Http(u16),
    #[error("timeout")]
    Timeout,
    #[error("{0}")]
    Network(String),
}

/// Session-id validation and transcript lookup errors. These ARE raised —
/// an invalid session id indicates adversarial input, not a data-layer
/// condition to filter on.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("Invalid session ID")]
    InvalidSessionId,
    #[error("Session file not found")]
    NotFound,
    #[error("IO error: {0}")]
    Io(String),
}

impl From<std::io::Error> for SessionError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e.to_string())
    }
}

/// Swap-loop failure kinds, each mapped to a process exit code by the
/// `crates/cli` binary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SwapError {
    #[error("max_swaps_reached")]
    MaxSwapsReached,
    #[error("no_alternative_accounts")]
    NoAlternativeAccounts,
    #[error("migration_failed")]
    MigrationFailed,
}

impl SwapError {
    pub fn exit_code(&self) -> i32 {
        1
    }
}

/// Channel-map / chat-relay error kinds. `ChannelNotFound` and `IsArchived`
/// trigger deactivation of the mapping by the caller; `NameTaken` and
/// `MessageNotFound` are retried once by the caller before giving up.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChannelError {
    #[error("channel_not_found")]
    ChannelNotFound,
    #[error("is_archived")]
    IsArchived,
    #[error("name_taken")]
    NameTaken,
    #[error("message_not_found")]
    MessageNotFound,
}

impl ChannelError {
    /// Whether the relay should deactivate the channel-map entry on this
    /// error rather than retry.
    pub fn should_deactivate(&self) -> bool {
        matches!(self, Self::ChannelNotFound | Self::IsArchived)
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
