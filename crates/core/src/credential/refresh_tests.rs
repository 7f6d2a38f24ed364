// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use axum::routing::post;
use axum::Router;
use tokio::net::TcpListener;

use super::*;
use crate::credential::CredentialStore;

#[tokio::test]
async fn refresh_without_refresh_token_errors_immediately() {
    let dir = tempfile::tempdir().unwrap();
    let store = CredentialStore::new(dir.path().join("default"));
    store
        .write(dir.path(), &CredentialBlob { access_token: "sk-ant-old".into(), ..Default::default() })
        .unwrap();

    let client = reqwest::Client::new();
    let err = refresh(&store, &client, "http://127.0.0.1:1/token", "client", dir.path())
        .await
        .unwrap_err();
    assert_eq!(err, CredentialError::NoRefreshToken);
}

/// Mock OAuth token endpoint returning one `(status, body)` pair per call,
/// repeating the last pair once the sequence is exhausted.
async fn mock_token_server(responses: Vec<(u16, String)>) -> (String, Arc<AtomicU32>) {
    let call_count = Arc::new(AtomicU32::new(0));
    let call_count_clone = Arc::clone(&call_count);
    let responses = Arc::new(responses);

    let app = Router::new().route(
        "/token",
        post(move |_body: String| {
            let count = Arc::clone(&call_count_clone);
            let resps = Arc::clone(&responses);
            async move {
                let idx = count.fetch_add(1, Ordering::Relaxed) as usize;
                let (status, body) =
                    if idx < resps.len() { resps[idx].clone() } else { resps.last().cloned().unwrap_or((500, "{}".to_owned())) };
                (axum::http::StatusCode::from_u16(status).unwrap_or(axum::http::StatusCode::INTERNAL_SERVER_ERROR), body)
            }
        }),
    );

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.ok();
    });

    (format!("http://{addr}/token"), call_count)
}

#[tokio::test]
async fn do_refresh_server_error_message_is_captured() {
    let error_body = serde_json::json!({
        "error": "invalid_grant",
        "error_description": "Refresh token not found or invalid"
    })
    .to_string();
    let (token_url, _count) = mock_token_server(vec![(400, error_body)]).await;

    let client = reqwest::Client::new();
    let err = do_refresh(&client, &token_url, "client", "dead-refresh").await.unwrap_err();
    assert_eq!(err, CredentialError::ServerMessage("Refresh token not found or invalid".into()));
}

#[tokio::test]
async fn do_refresh_non_json_error_body_falls_back_to_http_status() {
    let (token_url, _count) = mock_token_server(vec![(503, "upstream unavailable".into())]).await;

    let client = reqwest::Client::new();
    let err = do_refresh(&client, &token_url, "client", "refresh").await.unwrap_err();
    assert_eq!(err, CredentialError::Http(503));
}

#[tokio::test]
async fn do_refresh_transient_retries_then_succeeds() {
    let error_body = serde_json::json!({
        "error": "server_error",
        "error_description": "temporary"
    })
    .to_string();
    let success_body = serde_json::json!({
        "access_token": "recovered",
        "expires_in": 3600
    })
    .to_string();

    let (token_url, call_count) = mock_token_server(vec![(500, error_body), (200, success_body)]).await;

    let client = reqwest::Client::new();
    let token = refresh_with_retries(&client, &token_url, "client", "refresh-token").await.unwrap();

    assert_eq!(token.access_token, "recovered");
    assert_eq!(call_count.load(Ordering::Relaxed), 2);
}
