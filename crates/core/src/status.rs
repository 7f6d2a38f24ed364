// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Structured status snapshot combining the registry and credential
//! store. Not a CLI subcommand itself — the underlying data function any
//! external CLI dispatch layer can call.

use serde::Serialize;

use crate::credential::CredentialStore;
use crate::model::Account;

#[derive(Debug, Clone, Serialize)]
pub struct AccountStatusInfo {
    pub name: String,
    pub profile_dir: String,
    pub has_credentials: bool,
    pub expired: bool,
    pub priority: Option<u32>,
}

/// Build a status snapshot for every registered account: whether a
/// credential blob is present and whether it is expired.
pub fn status_list(accounts: &[Account], store: &CredentialStore) -> Vec<AccountStatusInfo> {
    accounts
        .iter()
        .map(|account| {
            let blob = store.read(&account.profile_dir).ok();
            let (has_credentials, expired) = match &blob {
                Some(b) => (true, store.is_expired(b)),
                None => (false, true),
            };
            AccountStatusInfo {
                name: account.name.clone(),
                profile_dir: account.profile_dir.to_string_lossy().to_string(),
                has_credentials,
                expired,
                priority: account.priority,
            }
        })
        .collect()
}

#[cfg(test)]
#[path = "status_tests.rs"]
mod tests;
