// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Account registry: the durable `{accounts: [...]}` document under the
//! per-user config directory, mutated only through read-modify-write with
//! atomic replacement.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::atomic_file;
use crate::model::{is_valid_account_name, Account, DEFAULT_ACCOUNT_NAME};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("invalid account name: {0}")]
    InvalidName(String),
    #[error("duplicate account name: {0}")]
    DuplicateName(String),
    #[error("cannot delete the default account")]
    CannotDeleteDefault,
    #[error("account not found: {0}")]
    NotFound(String),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct RegistryDoc {
    accounts: Vec<Account>,
}

/// Account registry backed by a single JSON file.
pub struct Registry {
    path: PathBuf,
}

impl Registry {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    fn load(&self) -> anyhow::Result<RegistryDoc> {
        Ok(atomic_file::read(&self.path)?.unwrap_or_default())
    }

    fn save(&self, doc: &RegistryDoc) -> anyhow::Result<()> {
        atomic_file::write(&self.path, doc)
    }

    pub fn list(&self) -> anyhow::Result<Vec<Account>> {
        Ok(self.load()?.accounts)
    }

    /// Add a new account. Rejects an invalid name or a name already
    /// registered.
    pub fn add(&self, account: Account) -> anyhow::Result<()> {
        if !is_valid_account_name(&account.name) {
            anyhow::bail!(RegistryError::InvalidName(account.name));
        }
        let mut doc = self.load()?;
        if doc.accounts.iter().any(|a| a.name == account.name) {
            anyhow::bail!(RegistryError::DuplicateName(account.name));
        }
        doc.accounts.push(account);
        self.save(&doc)
    }

    /// Remove an account by name. Refuses to delete `default`.
    pub fn remove(&self, name: &str) -> anyhow::Result<()> {
        if name == DEFAULT_ACCOUNT_NAME {
            anyhow::bail!(RegistryError::CannotDeleteDefault);
        }
        let mut doc = self.load()?;
        let before = doc.accounts.len();
        doc.accounts.retain(|a| a.name != name);
        if doc.accounts.len() == before {
            anyhow::bail!(RegistryError::NotFound(name.to_string()));
        }
        self.save(&doc)
    }

    pub fn set_priority(&self, name: &str, priority: u32) -> anyhow::Result<()> {
        let mut doc = self.load()?;
        let account = doc
            .accounts
            .iter_mut()
            .find(|a| a.name == name)
            .ok_or_else(|| RegistryError::NotFound(name.to_string()))?;
        account.priority = Some(priority);
        self.save(&doc)
    }

    pub fn clear_priority(&self, name: &str) -> anyhow::Result<()> {
        let mut doc = self.load()?;
        let account = doc
            .accounts
            .iter_mut()
            .find(|a| a.name == name)
            .ok_or_else(|| RegistryError::NotFound(name.to_string()))?;
        account.priority = None;
        self.save(&doc)
    }

    /// Idempotent: if `default_profile_dir` exists on disk and is not
    /// already registered, insert it as account `default`.
    pub fn ensure_default(&self, default_profile_dir: &Path) -> anyhow::Result<()> {
        if !default_profile_dir.exists() {
            return Ok(());
        }
        let mut doc = self.load()?;
        if doc.accounts.iter().any(|a| a.name == DEFAULT_ACCOUNT_NAME) {
            return Ok(());
        }
        doc.accounts.push(Account {
            name: DEFAULT_ACCOUNT_NAME.to_string(),
            profile_dir: default_profile_dir.to_path_buf(),
            priority: None,
        });
        self.save(&doc)
    }
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
