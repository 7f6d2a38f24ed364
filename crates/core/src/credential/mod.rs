// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Credential store: read/write/refresh OAuth credential blobs keyed by
//! profile directory.
//!
//! Backed by an OS-native secret store where available (`KeyringBackend`),
//! falling back to a `0600` atomic JSON file inside the profile directory
//! (`JsonFileBackend`) when the native backend errors or the platform has
//! none.

mod backend;
pub mod refresh;

use std::path::Path;

use sha2::{Digest, Sha256};

use crate::error::CredentialError;
use crate::model::CredentialBlob;

pub use backend::{CredentialBackend, JsonFileBackend, KeyringBackend};

const SERVICE_NAME_DEFAULT: &str = "swapsup";
const TOKEN_PREFIX: &str = "sk-ant-";

/// Derive the secret-store service name for `profile_dir`.
///
/// The system-default profile uses a fixed name so it stays interoperable
/// with credentials the child itself already wrote there; every other
/// profile gets the fixed name plus the first 8 hex characters of
/// SHA-256 over the expanded path, isolating per-profile entries without
/// name collisions.
pub fn service_name(profile_dir: &Path, default_profile_dir: &Path) -> String {
    if profile_dir == default_profile_dir {
        return SERVICE_NAME_DEFAULT.to_string();
    }
    let expanded = profile_dir.to_string_lossy();
    let digest = Sha256::digest(expanded.as_bytes());
    let full_hex: String = digest.iter().map(|b| format!("{b:02x}")).collect();
    format!("{SERVICE_NAME_DEFAULT}-{}", &full_hex[..8])
}

/// The credential store: selects [`KeyringBackend`] first, falling back to
/// [`JsonFileBackend`] on write/read failure.
pub struct CredentialStore {
    default_profile_dir: std::path::PathBuf,
    keyring: KeyringBackend,
}

impl CredentialStore {
    pub fn new(default_profile_dir: std::path::PathBuf) -> Self {
        Self { default_profile_dir, keyring: KeyringBackend }
    }

    fn service(&self, profile_dir: &Path) -> String {
        service_name(profile_dir, &self.default_profile_dir)
    }

    /// Read the credential blob for `profile_dir`. Tries the keyring
    /// backend first; on any error, falls back to the profile's JSON file.
    pub fn read(&self, profile_dir: &Path) -> Result<CredentialBlob, CredentialError> {
        let service = self.service(profile_dir);
        match self.keyring.read(&service) {
            Ok(blob) => Ok(blob),
            Err(_) => JsonFileBackend::new(profile_dir).read(&service),
        }
    }

    /// Write `blob` for `profile_dir`, atomically. Tries the keyring
    /// backend first; on failure, falls back to the JSON file.
    pub fn write(&self, profile_dir: &Path, blob: &CredentialBlob) -> Result<(), CredentialError> {
        validate_access_token(&blob.access_token)?;
        let service = self.service(profile_dir);
        if self.keyring.write(&service, blob).is_ok() {
            return Ok(());
        }
        JsonFileBackend::new(profile_dir).write(&service, blob)
    }

    pub fn delete(&self, profile_dir: &Path) -> Result<(), CredentialError> {
        let service = self.service(profile_dir);
        let keyring_ok = self.keyring.delete(&service).is_ok();
        let file_ok = JsonFileBackend::new(profile_dir).delete(&service).is_ok();
        if keyring_ok || file_ok {
            Ok(())
        } else {
            Err(CredentialError::NoCredentials)
        }
    }

    /// `true` when `blob` is already past `expires_at`, or carries none.
    pub fn is_expired(&self, blob: &CredentialBlob) -> bool {
        blob.is_expired(now_ms())
    }
}

fn validate_access_token(token: &str) -> Result<(), CredentialError> {
    if token.starts_with(TOKEN_PREFIX) {
        Ok(())
    } else {
        Err(CredentialError::InvalidTokenFormat)
    }
}

fn now_ms() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
