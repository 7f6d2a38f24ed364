// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::path::{Path, PathBuf};

use crate::atomic_file;
use crate::error::CredentialError;
use crate::model::CredentialBlob;

const KEYRING_USER: &str = "default";

/// A storage backend for credential blobs, keyed by service name.
pub trait CredentialBackend {
    fn read(&self, service: &str) -> Result<CredentialBlob, CredentialError>;
    fn write(&self, service: &str, blob: &CredentialBlob) -> Result<(), CredentialError>;
    fn delete(&self, service: &str) -> Result<(), CredentialError>;
}

/// OS-native secret store (macOS Keychain, Linux Secret Service) via the
/// `keyring` crate. One entry per service name, storing the blob as JSON
/// in the entry's password field.
pub struct KeyringBackend;

impl CredentialBackend for KeyringBackend {
    fn read(&self, service: &str) -> Result<CredentialBlob, CredentialError> {
        let entry = keyring::Entry::new(service, KEYRING_USER)
            .map_err(|_| CredentialError::UnsupportedPlatform)?;
        let raw = entry.get_password().map_err(|_| CredentialError::NoCredentials)?;
        serde_json::from_str(&raw).map_err(|_| CredentialError::ParseFailed)
    }

    fn write(&self, service: &str, blob: &CredentialBlob) -> Result<(), CredentialError> {
        let entry = keyring::Entry::new(service, KEYRING_USER)
            .map_err(|_| CredentialError::UnsupportedPlatform)?;
        let raw = serde_json::to_string(blob).map_err(|_| CredentialError::ParseFailed)?;
        entry.set_password(&raw).map_err(|_| CredentialError::KeychainWriteFailed)
    }

    fn delete(&self, service: &str) -> Result<(), CredentialError> {
        let entry = keyring::Entry::new(service, KEYRING_USER)
            .map_err(|_| CredentialError::UnsupportedPlatform)?;
        entry.delete_credential().map_err(|_| CredentialError::NoCredentials)
    }
}

/// Fallback `0600`-permission JSON file inside the profile directory, used
/// when the native backend errors or the platform has none.
pub struct JsonFileBackend {
    profile_dir: PathBuf,
}

impl JsonFileBackend {
    pub fn new(profile_dir: &Path) -> Self {
        Self { profile_dir: profile_dir.to_path_buf() }
    }

    fn path(&self, service: &str) -> PathBuf {
        self.profile_dir.join(format!(".credentials-{service}.json"))
    }
}

impl CredentialBackend for JsonFileBackend {
    fn read(&self, service: &str) -> Result<CredentialBlob, CredentialError> {
        match atomic_file::read::<CredentialBlob>(&self.path(service)) {
            Ok(Some(blob)) => Ok(blob),
            Ok(None) => Err(CredentialError::NoCredentials),
            Err(_) => Err(CredentialError::ParseFailed),
        }
    }

    fn write(&self, service: &str, blob: &CredentialBlob) -> Result<(), CredentialError> {
        atomic_file::write(&self.path(service), blob).map_err(|_| CredentialError::KeychainWriteFailed)
    }

    fn delete(&self, service: &str) -> Result<(), CredentialError> {
        std::fs::remove_file(self.path(service)).map_err(|_| CredentialError::NoCredentials)
    }
}

#[cfg(test)]
#[path = "backend_tests.rs"]
mod tests;
