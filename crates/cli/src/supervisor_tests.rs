// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn terminal_size_falls_back_to_80x24_when_not_a_tty() {
    let (cols, rows) = terminal_size();
    assert!(cols > 0 && rows > 0);
}

#[tokio::test]
async fn run_once_reports_clean_exit() {
    let env = ChildEnv {
        config_dir_env: "SWAPSUP_TEST_CONFIG_DIR".to_string(),
        profile_dir: std::env::temp_dir(),
        remote_mode: false,
    };
    let outcome = run_once(&["/bin/true".to_string()], &env).await.unwrap();
    match outcome {
        RunOutcome::Exited(status) => assert_eq!(status.code, Some(0)),
        RunOutcome::RateLimited(_) => panic!("expected clean exit"),
    }
}

#[tokio::test]
async fn run_once_detects_rate_limit_sentinel_and_escalates() {
    let env = ChildEnv {
        config_dir_env: "SWAPSUP_TEST_CONFIG_DIR".to_string(),
        profile_dir: std::env::temp_dir(),
        remote_mode: false,
    };
    let script = "printf 'Limit reached \xc2\xb7 resets in 2h 30m\\n'; sleep 30";
    let outcome = run_once(&["/bin/sh".to_string(), "-c".to_string(), script.to_string()], &env)
        .await
        .unwrap();
    match outcome {
        RunOutcome::RateLimited(m) => assert_eq!(m.reset_hint, "in 2h 30m"),
        RunOutcome::Exited(status) => panic!("expected rate limit, got {status:?}"),
    }
}
