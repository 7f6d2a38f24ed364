// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[tokio::test]
async fn echoes_through_the_pty() {
    let env = ChildEnv {
        config_dir_env: "SWAPSUP_TEST_CONFIG_DIR".to_string(),
        profile_dir: std::env::temp_dir(),
        remote_mode: false,
    };
    let pty = NativePty::spawn(&["/bin/echo".to_string(), "hello".to_string()], 80, 24, &env).unwrap();

    let mut out = Vec::new();
    let mut buf = [0u8; 256];
    loop {
        match pty.read_chunk(&mut buf).await {
            Ok(0) => break,
            Ok(n) => out.extend_from_slice(&buf[..n]),
            Err(_) => break,
        }
        if out.windows(5).any(|w| w == b"hello") {
            break;
        }
    }
    assert!(String::from_utf8_lossy(&out).contains("hello"));

    let status = pty.wait().await.unwrap();
    assert_eq!(status.code, Some(0));
}

#[test]
fn rejects_empty_command() {
    let env = ChildEnv {
        config_dir_env: "SWAPSUP_TEST_CONFIG_DIR".to_string(),
        profile_dir: std::env::temp_dir(),
        remote_mode: false,
    };
    assert!(NativePty::spawn(&[], 80, 24, &env).is_err());
}

#[test]
fn profile_dir_exists_reflects_filesystem() {
    let dir = tempfile::tempdir().unwrap();
    assert!(profile_dir_exists(dir.path()));
    assert!(!profile_dir_exists(&dir.path().join("does-not-exist")));
}
