// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared read-modify-write helper for the JSON stores (registry, channel
//! map, progress buffers, the JSON-file credential fallback).
//!
//! Every write goes through [`write`]: serialize to a temp file in the same
//! directory, then rename over the target. No `.tmp` sibling survives a
//! crash mid-write because rename is atomic on the same filesystem, and we
//! never hold the temp file open across an `.await`.

use std::fs::Permissions;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::Serialize;

/// Load and deserialize JSON from `path`. Returns `default()` if the file
/// does not exist; propagates parse errors for a file that does exist but
/// is corrupt, except where the caller prefers tolerant defaults (the
/// progress buffer and channel map override this via [`read_or_default`]).
pub fn read<T: DeserializeOwned>(path: &Path) -> anyhow::Result<Option<T>> {
    match std::fs::read_to_string(path) {
        Ok(contents) => Ok(Some(serde_json::from_str(&contents)?)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Like [`read`], but tolerates a missing OR corrupt file by returning
/// `T::default()`. Used by stores that must never fail a read (the
/// progress buffer in particular: spec.md requires a corrupt file to be
/// treated as empty rather than raising).
pub fn read_or_default<T: DeserializeOwned + Default>(path: &Path) -> T {
    match std::fs::read_to_string(path) {
        Ok(contents) => serde_json::from_str(&contents).unwrap_or_default(),
        Err(_) => T::default(),
    }
}

/// Serialize `value` and atomically replace `path` with it, at file mode
/// `0600`. Creates the parent directory if missing.
pub fn write<T: Serialize>(path: &Path, value: &T) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(value)?;
    let tmp_path = tmp_sibling(path);
    std::fs::write(&tmp_path, json)?;
    std::fs::set_permissions(&tmp_path, Permissions::from_mode(0o600))?;
    std::fs::rename(&tmp_path, path)?;
    Ok(())
}

/// Build the temp-file path used for an atomic write of `path`.
///
/// Suffixed with a process-and-thread-stable marker rather than a fixed
/// `.tmp` extension so concurrent writers targeting the same file from
/// different processes don't clobber each other's temp file mid-write
/// (the final `rename` is still what provides atomicity for readers).
fn tmp_sibling(path: &Path) -> std::path::PathBuf {
    let file_name = path.file_name().and_then(|n| n.to_str()).unwrap_or("atomic");
    let pid = std::process::id();
    let unique = format!(".{file_name}.{pid}.tmp");
    match path.parent() {
        Some(parent) => parent.join(unique),
        None => std::path::PathBuf::from(unique),
    }
}
