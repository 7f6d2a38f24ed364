// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::model::{cwd_hash, validate_session_id};

const SESSION_A: &str = "550e8400-e29b-41d4-a716-446655440000";
const SESSION_B: &str = "660e8400-e29b-41d4-a716-446655440000";

fn make_transcript(profile: &std::path::Path, hash: &CwdHash, id: &SessionId, contents: &str) {
    let path = transcript_path(profile, hash, id);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(&path, contents).unwrap();
}

#[test]
fn migrate_copies_transcript_and_sidecar() {
    let dir = tempfile::tempdir().unwrap();
    let from = dir.path().join("profiles/a");
    let to = dir.path().join("profiles/b");
    let hash = cwd_hash("/home/user/project");
    let id = validate_session_id(SESSION_A).unwrap();

    make_transcript(&from, &hash, &id, "transcript-bytes");
    let sidecar = sidecar_dir(&from, &hash, &id);
    std::fs::create_dir_all(sidecar.join("nested")).unwrap();
    std::fs::write(sidecar.join("nested/artifact.bin"), b"sidecar-bytes").unwrap();

    migrate(&from, &to, &hash, &id).unwrap();

    let dest_transcript = transcript_path(&to, &hash, &id);
    assert_eq!(std::fs::read_to_string(&dest_transcript).unwrap(), "transcript-bytes");

    let dest_sidecar = sidecar_dir(&to, &hash, &id).join("nested/artifact.bin");
    assert_eq!(std::fs::read(&dest_sidecar).unwrap(), b"sidecar-bytes");
}

#[test]
fn migrate_missing_source_errors() {
    let dir = tempfile::tempdir().unwrap();
    let from = dir.path().join("profiles/a");
    let to = dir.path().join("profiles/b");
    let hash = cwd_hash("/home/user/project");
    let id = validate_session_id(SESSION_A).unwrap();

    let err = migrate(&from, &to, &hash, &id).unwrap_err();
    assert_eq!(err, SessionError::NotFound);
}

#[test]
fn find_latest_in_profile_picks_most_recent() {
    let dir = tempfile::tempdir().unwrap();
    let profile = dir.path().join("profile");
    let hash = cwd_hash("/home/user/project");
    let id_a = validate_session_id(SESSION_A).unwrap();
    let id_b = validate_session_id(SESSION_B).unwrap();

    make_transcript(&profile, &hash, &id_a, "older");
    std::thread::sleep(std::time::Duration::from_millis(10));
    make_transcript(&profile, &hash, &id_b, "newer");

    let located = find_latest_in_profile(&profile, &hash).unwrap();
    assert_eq!(located.session_id, id_b);
}

#[test]
fn find_across_profiles_by_id_returns_newest_match() {
    let dir = tempfile::tempdir().unwrap();
    let accounts = vec![
        Account { name: "a".into(), profile_dir: dir.path().join("a"), priority: None },
        Account { name: "b".into(), profile_dir: dir.path().join("b"), priority: None },
    ];
    let hash = cwd_hash("/home/user/project");
    let id = validate_session_id(SESSION_A).unwrap();

    make_transcript(&accounts[0].profile_dir, &hash, &id, "first");
    std::thread::sleep(std::time::Duration::from_millis(10));
    make_transcript(&accounts[1].profile_dir, &hash, &id, "second");

    let located = find_across_profiles_by_id(&accounts, &id).unwrap();
    assert_eq!(located.account.name, "b");
}

#[test]
fn validate_session_id_rejects_traversal_before_any_fs_call() {
    assert!(validate_session_id("../../etc/passwd").is_err());
}