// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Socket-mode consumer: opens a WebSocket connection to the chat system,
//! acknowledges every envelope, and dispatches `events_api` payloads.
//! Reconnects with exponential backoff (1s doubling to 8s) on any error
//! or server-initiated disconnect.

use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio_tungstenite::tungstenite::Message;

const MAX_BACKOFF_SECS: u64 = 8;

/// Run the socket-mode loop forever, calling `on_event` for every
/// `events_api` envelope payload. Returns only if `open_connection`
/// cannot be retried (it never is — this function loops until the
/// process is killed).
pub async fn run<F, Fut>(client: &reqwest::Client, app_token: &str, on_event: F)
where
    F: Fn(Value) -> Fut + Clone,
    Fut: std::future::Future<Output = ()>,
{
    let mut backoff_secs: u64 = 1;

    loop {
        tracing::info!("opening socket-mode connection");
        match open_connection(client, app_token).await {
            Ok(wss_url) => {
                backoff_secs = 1;
                match run_ws_loop(&wss_url, on_event.clone()).await {
                    Ok(reason) => {
                        tracing::info!(reason, "socket closed, reconnecting");
                        backoff_secs = 1;
                    }
                    Err(e) => tracing::error!(error = %e, "socket error, reconnecting"),
                }
            }
            Err(e) => tracing::error!(error = %e, "failed to open socket-mode connection"),
        }

        tracing::info!(backoff_secs, "waiting before reconnect");
        tokio::time::sleep(std::time::Duration::from_secs(backoff_secs)).await;
        backoff_secs = (backoff_secs * 2).min(MAX_BACKOFF_SECS);
    }
}

async fn open_connection(client: &reqwest::Client, app_token: &str) -> anyhow::Result<String> {
    let resp = client
        .post("https://slack.com/api/apps.connections.open")
        .header("Authorization", format!("Bearer {app_token}"))
        .send()
        .await?;
    let body: Value = resp.json().await?;
    if body["ok"].as_bool() != Some(true) {
        let err = body["error"].as_str().unwrap_or("unknown");
        anyhow::bail!("apps.connections.open failed: {err}");
    }
    body["url"].as_str().map(str::to_string).ok_or_else(|| anyhow::anyhow!("missing url in apps.connections.open response"))
}

async fn run_ws_loop<F, Fut>(wss_url: &str, on_event: F) -> anyhow::Result<String>
where
    F: Fn(Value) -> Fut,
    Fut: std::future::Future<Output = ()>,
{
    let (ws_stream, _) = tokio_tungstenite::connect_async(wss_url).await?;
    let (mut write, mut read) = ws_stream.split();

    while let Some(msg) = read.next().await {
        let msg = msg?;
        match msg {
            Message::Text(text) => {
                let Ok(envelope) = serde_json::from_str::<Value>(&text) else { continue };

                if let Some(envelope_id) = envelope["envelope_id"].as_str() {
                    let ack = json!({ "envelope_id": envelope_id }).to_string();
                    let _ = write.send(Message::Text(ack.into())).await;
                }

                match envelope["type"].as_str().unwrap_or("") {
                    "hello" => tracing::info!("socket-mode connection established"),
                    "events_api" => on_event(envelope["payload"].clone()).await,
                    "disconnect" => {
                        let reason = envelope["reason"].as_str().unwrap_or("unknown").to_string();
                        return Ok(reason);
                    }
                    _ => {}
                }
            }
            Message::Ping(data) => {
                let _ = write.send(Message::Pong(data)).await;
            }
            Message::Close(_) => return Ok("close_frame".to_string()),
            _ => {}
        }
    }
    Ok("stream_ended".to_string())
}
