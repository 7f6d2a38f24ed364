// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn json_file_backend_round_trips() {
    let dir = tempfile::tempdir().unwrap();
    let backend = JsonFileBackend::new(dir.path());
    let blob = CredentialBlob {
        access_token: "sk-ant-abc".into(),
        refresh_token: Some("r".into()),
        expires_at: Some(123),
        ..Default::default()
    };
    backend.write("svc", &blob).unwrap();
    let loaded = backend.read("svc").unwrap();
    assert_eq!(loaded.access_token, "sk-ant-abc");
    assert_eq!(loaded.expires_at, Some(123));
}

#[test]
fn json_file_backend_missing_is_no_credentials() {
    let dir = tempfile::tempdir().unwrap();
    let backend = JsonFileBackend::new(dir.path());
    let err = backend.read("svc").unwrap_err();
    assert_eq!(err, CredentialError::NoCredentials);
}

#[test]
fn json_file_backend_delete_removes_entry() {
    let dir = tempfile::tempdir().unwrap();
    let backend = JsonFileBackend::new(dir.path());
    backend.write("svc", &CredentialBlob { access_token: "sk-ant-x".into(), ..Default::default() }).unwrap();
    backend.delete("svc").unwrap();
    assert!(backend.read("svc").is_err());
}