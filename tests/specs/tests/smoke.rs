// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! End-to-end swap-loop scenarios: real supervisor, real scorer, real
//! session migration, against a mock quota server and a throwaway shell
//! script standing in for the coding-assistant child.

use std::collections::HashMap;
use std::time::Duration;

use swapsup::swaploop::{self, SwapLoopContext, SwapOptions};
use swapsup_core::model::cwd_hash;

use swapsup_specs::{
    always_rate_limited, credential_store, ensure_crypto, mock_usage_server, mock_usage_server_sequenced, rate_limit_n_times_then_clean_exit,
    seed_transcript, test_account, usage_body, usage_body_with_reset,
};

const TIMEOUT: Duration = Duration::from_secs(20);

fn base_options(config_dir_env: &str) -> SwapOptions {
    SwapOptions { max_swaps: None, remote_mode: false, config_dir_env: config_dir_env.to_string() }
}

/// single rate limit, two accounts, lowest-utilization wins; the
/// transcript migrates and the resume args carry the migrated id.
#[tokio::test]
async fn single_rate_limit_two_accounts_lowest_utilization_wins() {
    ensure_crypto();
    let store = credential_store();
    let a = test_account("a", None, &store);
    let b = test_account("b", None, &store);

    let base = mock_usage_server(HashMap::from([
        (a.token.clone(), usage_body(95.0, 80.0)),
        (b.token.clone(), usage_body(20.0, 15.0)),
    ]))
    .await;

    let script_dir = tempfile::tempdir().unwrap();
    let child_args = rate_limit_n_times_then_clean_exit(script_dir.path(), 1);

    let cwd = "/tmp/swapsup-two-accounts".to_string();
    let hash = cwd_hash(&cwd);
    let session_id = "11111111-1111-4111-8111-111111111111";
    seed_transcript(&a.account.profile_dir, &hash, session_id, "{\"line\":1}\n");

    let accounts = vec![a.account.clone(), b.account.clone()];
    let ctx = SwapLoopContext {
        accounts: &accounts,
        credentials: &store,
        client: &reqwest::Client::new(),
        usage_url: &format!("{base}/usage"),
        cwd,
        use_priority: false,
        remote_channel_map: None,
        tmux_session: None,
        notify_sleep: None,
        notify_switch: None,
        reauth: None,
    };
    let opts = base_options("SWAPSUP_TEST_CONFIG_DIR");

    let outcome = tokio::time::timeout(TIMEOUT, swaploop::run(&ctx, &a.account, &child_args, &opts)).await.unwrap();

    assert_eq!(outcome.exit_code, 0);
    assert_eq!(outcome.swaps.len(), 1);
    assert_eq!(outcome.swaps[0].from, "a");
    assert_eq!(outcome.swaps[0].to, "b");

    let migrated = b.account.profile_dir.join("projects").join(hash.as_str()).join(format!("{session_id}.jsonl"));
    assert!(migrated.exists());
    assert_eq!(std::fs::read_to_string(migrated).unwrap(), "{\"line\":1}\n");
}

/// cascading swap through a third account once the second also rate
/// limits.
#[tokio::test]
async fn cascading_swap_to_third_account() {
    ensure_crypto();
    let store = credential_store();
    let alpha = test_account("alpha", None, &store);
    let beta = test_account("beta", None, &store);
    let gamma = test_account("gamma", None, &store);

    let base = mock_usage_server(HashMap::from([
        (alpha.token.clone(), usage_body(95.0, 90.0)),
        (beta.token.clone(), usage_body(30.0, 25.0)),
        (gamma.token.clone(), usage_body(50.0, 45.0)),
    ]))
    .await;

    let script_dir = tempfile::tempdir().unwrap();
    let child_args = rate_limit_n_times_then_clean_exit(script_dir.path(), 2);

    let accounts = vec![alpha.account.clone(), beta.account.clone(), gamma.account.clone()];
    let ctx = SwapLoopContext {
        accounts: &accounts,
        credentials: &store,
        client: &reqwest::Client::new(),
        usage_url: &format!("{base}/usage"),
        cwd: "/tmp/swapsup-cascade".to_string(),
        use_priority: false,
        remote_channel_map: None,
        tmux_session: None,
        notify_sleep: None,
        notify_switch: None,
        reauth: None,
    };
    let opts = base_options("SWAPSUP_TEST_CONFIG_DIR");

    let outcome = tokio::time::timeout(TIMEOUT, swaploop::run(&ctx, &alpha.account, &child_args, &opts)).await.unwrap();

    assert_eq!(outcome.exit_code, 0);
    let path: Vec<(&str, &str)> = outcome.swaps.iter().map(|s| (s.from.as_str(), s.to.as_str())).collect();
    assert_eq!(path, vec![("alpha", "beta"), ("beta", "gamma")]);
}

/// `max_swaps` exhausted after three rate limits in a row.
#[tokio::test]
async fn max_swaps_exhausted_reports_error_and_exact_swap_count() {
    ensure_crypto();
    let store = credential_store();
    let accounts: Vec<_> = ["w", "x", "y", "z"].iter().map(|n| test_account(n, None, &store)).collect();

    let mut bodies = HashMap::new();
    for acct in &accounts {
        bodies.insert(acct.token.clone(), usage_body(50.0, 50.0));
    }
    let base = mock_usage_server(bodies).await;

    let script_dir = tempfile::tempdir().unwrap();
    let child_args = always_rate_limited(script_dir.path());

    let account_list: Vec<_> = accounts.iter().map(|a| a.account.clone()).collect();
    let ctx = SwapLoopContext {
        accounts: &account_list,
        credentials: &store,
        client: &reqwest::Client::new(),
        usage_url: &format!("{base}/usage"),
        cwd: "/tmp/swapsup-exhausted".to_string(),
        use_priority: false,
        remote_channel_map: None,
        tmux_session: None,
        notify_sleep: None,
        notify_switch: None,
        reauth: None,
    };
    let opts = SwapOptions { max_swaps: Some(2), remote_mode: false, config_dir_env: "SWAPSUP_TEST_CONFIG_DIR".to_string() };

    let outcome =
        tokio::time::timeout(TIMEOUT, swaploop::run(&ctx, &account_list[0], &child_args, &opts)).await.unwrap();

    assert_eq!(outcome.exit_code, 1);
    assert_eq!(outcome.swaps.len(), 2);
}

/// every account exhausted sleeps until the earliest reset (clamped,
/// not the 6-hour ceiling), then re-selects without spending an extra
/// swap on the sleep itself.
#[tokio::test]
async fn sleep_until_reset_then_reselects_after_wake() {
    ensure_crypto();
    let store = credential_store();
    let a = test_account("a", None, &store);

    let resets_at = (chrono::Utc::now() + chrono::Duration::seconds(3)).to_rfc3339();
    let base = mock_usage_server_sequenced(HashMap::from([(
        a.token.clone(),
        vec![usage_body_with_reset(99.0, 99.0, &resets_at), usage_body(10.0, 10.0)],
    )]))
    .await;

    let script_dir = tempfile::tempdir().unwrap();
    let child_args = rate_limit_n_times_then_clean_exit(script_dir.path(), 1);

    let accounts = vec![a.account.clone()];
    let ctx = SwapLoopContext {
        accounts: &accounts,
        credentials: &store,
        client: &reqwest::Client::new(),
        usage_url: &format!("{base}/usage"),
        cwd: "/tmp/swapsup-sleep".to_string(),
        use_priority: false,
        remote_channel_map: None,
        tmux_session: None,
        notify_sleep: None,
        notify_switch: None,
        reauth: None,
    };
    let opts = base_options("SWAPSUP_TEST_CONFIG_DIR");

    let start = tokio::time::Instant::now();
    let outcome = tokio::time::timeout(TIMEOUT, swaploop::run(&ctx, &a.account, &child_args, &opts)).await.unwrap();
    let elapsed = start.elapsed();

    assert!(elapsed >= Duration::from_millis(1500), "expected the loop to sleep past the reset, elapsed {elapsed:?}");
    assert_eq!(outcome.exit_code, 0);
    assert_eq!(outcome.swaps.len(), 1, "sleeping itself must not add a second swap entry");
}

/// a traversal-shaped session id is rejected before any path is
/// built from it.
#[tokio::test]
async fn session_id_traversal_rejected_before_filesystem_access() {
    use swapsup_core::error::SessionError;
    use swapsup_core::model::validate_session_id;

    let err = validate_session_id("../../etc/passwd").unwrap_err();
    assert!(matches!(err, SessionError::InvalidSessionId));
}

/// the priority policy prefers the non-exhausted backup over the
/// exhausted higher-priority accounts.
#[tokio::test]
async fn priority_cascade_prefers_non_exhausted_backup() {
    ensure_crypto();
    let store = credential_store();
    let main = test_account("main", Some(1), &store);
    let backup1 = test_account("backup1", Some(2), &store);
    let backup2 = test_account("backup2", Some(3), &store);

    let base = mock_usage_server(HashMap::from([
        (main.token.clone(), usage_body(99.0, 99.0)),
        (backup1.token.clone(), usage_body(99.0, 99.0)),
        (backup2.token.clone(), usage_body(50.0, 50.0)),
    ]))
    .await;

    let script_dir = tempfile::tempdir().unwrap();
    let child_args = rate_limit_n_times_then_clean_exit(script_dir.path(), 1);

    let accounts = vec![main.account.clone(), backup1.account.clone(), backup2.account.clone()];
    let ctx = SwapLoopContext {
        accounts: &accounts,
        credentials: &store,
        client: &reqwest::Client::new(),
        usage_url: &format!("{base}/usage"),
        cwd: "/tmp/swapsup-priority".to_string(),
        use_priority: true,
        remote_channel_map: None,
        tmux_session: None,
        notify_sleep: None,
        notify_switch: None,
        reauth: None,
    };
    let opts = base_options("SWAPSUP_TEST_CONFIG_DIR");

    let outcome = tokio::time::timeout(TIMEOUT, swaploop::run(&ctx, &main.account, &child_args, &opts)).await.unwrap();

    assert_eq!(outcome.exit_code, 0);
    assert_eq!(outcome.swaps.len(), 1);
    assert_eq!(outcome.swaps[0].to, "backup2");
    assert!(outcome.swaps[0].reason.contains("priority 3"));
}

