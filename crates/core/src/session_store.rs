// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session store: locate a session transcript across profile directories
//! by session id or working directory, and atomically migrate it (plus
//! any sidecar artifacts) between profiles.
//!
//! All path construction composes `profile_dir`, the literal `projects`,
//! a validated [`CwdHash`], and a validated [`SessionId`] through
//! [`transcript_path`] — there is no overload that accepts a raw `&str`,
//! so an unvalidated session id can never reach the filesystem.

use std::path::PathBuf;

use crate::error::SessionError;
use crate::model::{Account, CwdHash, SessionId};

/// Build the path to a session's transcript file. The only way to obtain
/// a [`SessionId`]/[`CwdHash`] is through their respective validating
/// constructors, so this function cannot be called with unverified input.
pub fn transcript_path(profile_dir: &std::path::Path, cwd_hash: &CwdHash, session_id: &SessionId) -> PathBuf {
    profile_dir.join("projects").join(cwd_hash.as_str()).join(format!("{session_id}.jsonl"))
}

/// Path to a session's optional sidecar directory.
pub fn sidecar_dir(profile_dir: &std::path::Path, cwd_hash: &CwdHash, session_id: &SessionId) -> PathBuf {
    profile_dir.join("projects").join(cwd_hash.as_str()).join(session_id.as_str())
}

/// A located session transcript.
pub struct Located {
    pub session_id: SessionId,
    pub path: PathBuf,
}

/// A located session transcript, plus which account and cwd hash it was
/// found under.
pub struct LocatedAcrossProfiles {
    pub account: Account,
    pub cwd_hash: CwdHash,
    pub session_id: SessionId,
    pub path: PathBuf,
}

/// Find the most recently modified transcript for `cwd_hash` under
/// `profile_dir`.
pub fn find_latest_in_profile(profile_dir: &std::path::Path, cwd_hash: &CwdHash) -> Option<Located> {
    let dir = profile_dir.join("projects").join(cwd_hash.as_str());
    latest_jsonl_in(&dir)
}

fn latest_jsonl_in(dir: &std::path::Path) -> Option<Located> {
    let entries = std::fs::read_dir(dir).ok()?;
    let mut best: Option<(std::time::SystemTime, PathBuf, String)> = None;
    for entry in entries.flatten() {
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("jsonl") {
            continue;
        }
        let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else { continue };
        let Ok(modified) = entry.metadata().and_then(|m| m.modified()) else { continue };
        if best.as_ref().map(|(t, _, _)| modified > *t).unwrap_or(true) {
            best = Some((modified, path, stem.to_string()));
        }
    }
    let (_, path, stem) = best?;
    let session_id = crate::model::validate_session_id(&stem).ok()?;
    Some(Located { session_id, path })
}

/// Scan every profile's `projects/<any_hash>/` for `<session_id>.jsonl`,
/// returning the newest match across all profiles.
pub fn find_across_profiles_by_id(accounts: &[Account], session_id: &SessionId) -> Option<LocatedAcrossProfiles> {
    let mut best: Option<(std::time::SystemTime, LocatedAcrossProfiles)> = None;
    for account in accounts {
        let projects_dir = account.profile_dir.join("projects");
        let Ok(hash_dirs) = std::fs::read_dir(&projects_dir) else { continue };
        for hash_entry in hash_dirs.flatten() {
            let hash = CwdHash::from_raw(hash_entry.file_name().to_string_lossy().to_string());
            let candidate = transcript_path(&account.profile_dir, &hash, session_id);
            let Ok(metadata) = std::fs::metadata(&candidate) else { continue };
            let Ok(modified) = metadata.modified() else { continue };
            let is_better = best.as_ref().map(|(t, _)| modified > *t).unwrap_or(true);
            if is_better {
                best = Some((
                    modified,
                    LocatedAcrossProfiles {
                        account: account.clone(),
                        cwd_hash: hash,
                        session_id: session_id.clone(),
                        path: candidate,
                    },
                ));
            }
        }
    }
    best.map(|(_, located)| located)
}

/// Like [`find_across_profiles_by_id`] but restricted to the computed
/// `cwd_hash` for `cwd`.
pub fn find_latest_across_profiles(accounts: &[Account], cwd_hash: &CwdHash) -> Option<LocatedAcrossProfiles> {
    let mut best: Option<(std::time::SystemTime, LocatedAcrossProfiles)> = None;
    for account in accounts {
        let Some(located) = find_latest_in_profile(&account.profile_dir, cwd_hash) else { continue };
        let Ok(metadata) = std::fs::metadata(&located.path) else { continue };
        let Ok(modified) = metadata.modified() else { continue };
        if best.as_ref().map(|(t, _)| modified > *t).unwrap_or(true) {
            best = Some((
                modified,
                LocatedAcrossProfiles {
                    account: account.clone(),
                    cwd_hash: cwd_hash.clone(),
                    session_id: located.session_id,
                    path: located.path,
                },
            ));
        }
    }
    best.map(|(_, located)| located)
}

/// Copy `<session_id>.jsonl` from `from_profile` to `to_profile`
/// (overwriting), plus the `<session_id>/` sidecar directory if present.
/// Returns an error if the source transcript does not exist.
pub fn migrate(
    from_profile: &std::path::Path,
    to_profile: &std::path::Path,
    cwd_hash: &CwdHash,
    session_id: &SessionId,
) -> Result<(), SessionError> {
    let source = transcript_path(from_profile, cwd_hash, session_id);
    if !source.exists() {
        return Err(SessionError::NotFound);
    }

    let dest_dir = to_profile.join("projects").join(cwd_hash.as_str());
    std::fs::create_dir_all(&dest_dir)?;

    let dest = transcript_path(to_profile, cwd_hash, session_id);
    std::fs::copy(&source, &dest)?;

    let source_sidecar = sidecar_dir(from_profile, cwd_hash, session_id);
    if source_sidecar.is_dir() {
        let dest_sidecar = sidecar_dir(to_profile, cwd_hash, session_id);
        copy_dir_recursive(&source_sidecar, &dest_sidecar)?;
    }

    Ok(())
}

fn copy_dir_recursive(src: &std::path::Path, dst: &std::path::Path) -> std::io::Result<()> {
    std::fs::create_dir_all(dst)?;
    for entry in std::fs::read_dir(src)? {
        let entry = entry?;
        let file_type = entry.file_type()?;
        let dest_path = dst.join(entry.file_name());
        if file_type.is_dir() {
            copy_dir_recursive(&entry.path(), &dest_path)?;
        } else {
            std::fs::copy(entry.path(), &dest_path)?;
        }
    }
    Ok(())
}

#[cfg(test)]
#[path = "session_store_tests.rs"]
mod tests;
