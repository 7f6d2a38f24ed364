// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Test harness for end-to-end swap-loop scenarios.
//!
//! Runs the real swap loop and supervisor against a throwaway shell
//! script standing in for the child, with account usage served by a
//! local mock HTTP server instead of the real quota API.

use std::collections::HashMap;
use std::os::unix::fs::PermissionsExt;
use std::path::PathBuf;
use std::sync::Once;

use swapsup_core::credential::CredentialStore;
use swapsup_core::model::{Account, CredentialBlob};

static CRYPTO_INIT: Once = Once::new();

/// Install the ring crypto provider for reqwest/rustls.
/// Safe to call multiple times — only the first call has effect.
pub fn ensure_crypto() {
    CRYPTO_INIT.call_once(|| {
        let _ = rustls::crypto::ring::default_provider().install_default();
    });
}

/// One account fixture: the `Account` plus the `TempDir` backing its
/// profile directory, kept alive for the fixture's lifetime.
pub struct TestAccount {
    pub account: Account,
    pub token: String,
    _profile_dir: tempfile::TempDir,
}

/// Create an account fixture with a fresh profile directory and a seeded
/// bearer token, ready to be queried through [`mock_usage_server`].
pub fn test_account(name: &str, priority: Option<u32>, store: &CredentialStore) -> TestAccount {
    let profile_dir = tempfile::tempdir().unwrap();
    let token = format!("sk-ant-{name}");
    store
        .write(profile_dir.path(), &CredentialBlob { access_token: token.clone(), ..Default::default() })
        .unwrap();
    TestAccount {
        account: Account { name: name.to_string(), profile_dir: profile_dir.path().to_path_buf(), priority },
        token,
        _profile_dir: profile_dir,
    }
}

/// A `CredentialStore` whose default profile directory never matches a
/// fixture account, so every fixture gets its own hashed service name.
pub fn credential_store() -> CredentialStore {
    CredentialStore::new(PathBuf::from("/nonexistent-default-profile"))
}

/// Start a mock quota server mapping bearer token to a fixed JSON usage
/// body. Returns the server's base URL (pass `{url}/usage` as
/// `usage_url`); the server runs for the life of the test process.
pub async fn mock_usage_server(responses: HashMap<String, serde_json::Value>) -> String {
    mock_usage_server_sequenced(responses.into_iter().map(|(k, v)| (k, vec![v])).collect()).await
}

/// Start a mock quota server where each bearer token walks through its
/// own sequence of JSON bodies, one per request; the last body in a
/// token's sequence repeats for every request past the end.
pub async fn mock_usage_server_sequenced(responses: HashMap<String, Vec<serde_json::Value>>) -> String {
    use axum::extract::State;
    use axum::http::HeaderMap;
    use axum::routing::get;
    use axum::Router;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct Shared {
        responses: HashMap<String, Vec<serde_json::Value>>,
        counts: HashMap<String, AtomicUsize>,
    }

    let counts = responses.keys().map(|k| (k.clone(), AtomicUsize::new(0))).collect();
    let shared = Arc::new(Shared { responses, counts });

    async fn usage(State(shared): State<Arc<Shared>>, headers: HeaderMap) -> axum::Json<serde_json::Value> {
        let token = headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .unwrap_or("");
        let Some(bodies) = shared.responses.get(token) else {
            return axum::Json(serde_json::json!({}));
        };
        let idx = shared.counts.get(token).map(|c| c.fetch_add(1, Ordering::Relaxed)).unwrap_or(0);
        let body = bodies.get(idx).or_else(|| bodies.last()).cloned().unwrap_or(serde_json::json!({}));
        axum::Json(body)
    }

    let app = Router::new().route("/usage", get(usage)).with_state(shared);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.ok();
    });
    format!("http://{addr}")
}

/// A "nested" quota-response body at a given session/weekly utilization
/// (see `usage::check_usage`'s `UsageResponse::Nested` shape).
pub fn usage_body(session_util: f64, weekly_util: f64) -> serde_json::Value {
    serde_json::json!({
        "five_hour": { "utilization": session_util },
        "seven_day": { "utilization": weekly_util },
    })
}

/// Like [`usage_body`], with both windows' reset timestamps set to
/// `resets_at` (an RFC 3339 string).
pub fn usage_body_with_reset(session_util: f64, weekly_util: f64, resets_at: &str) -> serde_json::Value {
    serde_json::json!({
        "five_hour": { "utilization": session_util, "resets_at": resets_at },
        "seven_day": { "utilization": weekly_util, "resets_at": resets_at },
    })
}

fn write_script(dir: &std::path::Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
    let mut perms = std::fs::metadata(&path).unwrap().permissions();
    perms.set_mode(0o700);
    std::fs::set_permissions(&path, perms).unwrap();
    path
}

/// A standalone child executable (no further argv) that prints the
/// rate-limit sentinel on its first `n` invocations, tracked via a
/// counter file alongside the script, then exits cleanly thereafter.
pub fn rate_limit_n_times_then_clean_exit(dir: &std::path::Path, n: u32) -> Vec<String> {
    let counter = dir.join("count");
    let script = write_script(
        dir,
        "child.sh",
        &format!(
            "count=0; if [ -f {counter} ]; then count=$(cat {counter}); fi; \
             count=$((count + 1)); echo $count > {counter}; \
             if [ $count -le {n} ]; then printf 'Limit reached \u{b7} resets in 2h 30m\\n'; sleep 30; else exit 0; fi",
            counter = counter.display(),
            n = n
        ),
    );
    vec![script.to_string_lossy().into_owned()]
}

/// A standalone child executable that always prints the rate-limit
/// sentinel and never exits cleanly — used to exercise `max_swaps`
/// exhaustion.
pub fn always_rate_limited(dir: &std::path::Path) -> Vec<String> {
    let script = write_script(dir, "child.sh", "printf 'Limit reached \u{b7} resets in 2h 30m\\n'; sleep 30");
    vec![script.to_string_lossy().into_owned()]
}

/// Seed a fake session transcript for `account` under `cwd_hash`, so the
/// swap loop has something to migrate on its first rate limit.
pub fn seed_transcript(profile_dir: &std::path::Path, cwd_hash: &swapsup_core::model::CwdHash, session_id: &str, contents: &str) {
    let dir = profile_dir.join("projects").join(cwd_hash.as_str());
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join(format!("{session_id}.jsonl")), contents).unwrap();
}
