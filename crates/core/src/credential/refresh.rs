// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! OAuth token refresh, with retries. Refresh tokens are single-use: the
//! new blob MUST be written back before this returns, so a crash between
//! receiving and persisting the new pair loses the account rather than
//! the session.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::credential::CredentialStore;
use crate::error::CredentialError;
use crate::model::CredentialBlob;

const REFRESH_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_MAX_RETRIES: u32 = 3;

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: u64,
}

#[derive(Debug, Serialize)]
struct RefreshRequest<'a> {
    grant_type: &'static str,
    refresh_token: &'a str,
    client_id: &'a str,
}

/// OAuth error response body, e.g. `{"error": "invalid_grant", "error_description": "..."}`.
#[derive(Debug, Deserialize)]
struct TokenErrorResponse {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

/// Perform a single refresh request against `token_url`.
async fn do_refresh(
    client: &reqwest::Client,
    token_url: &str,
    client_id: &str,
    refresh_token: &str,
) -> Result<TokenResponse, CredentialError> {
    let resp = client
        .post(token_url)
        .timeout(REFRESH_TIMEOUT)
        .form(&RefreshRequest { grant_type: "refresh_token", refresh_token, client_id })
        .send()
        .await
        .map_err(|e| if e.is_timeout() { CredentialError::Timeout } else { CredentialError::Http(0) })?;

    if !resp.status().is_success() {
        let status = resp.status().as_u16();
        let body = resp.text().await.unwrap_or_default();
        return Err(match serde_json::from_str::<TokenErrorResponse>(&body) {
            Ok(err) => CredentialError::ServerMessage(err.error_description.unwrap_or(err.error)),
            Err(_) => CredentialError::Http(status),
        });
    }

    resp.json::<TokenResponse>().await.map_err(|_| CredentialError::ParseFailed)
}

/// Refresh with capped exponential backoff, up to [`DEFAULT_MAX_RETRIES`]
/// additional attempts after the first failure.
async fn refresh_with_retries(
    client: &reqwest::Client,
    token_url: &str,
    client_id: &str,
    refresh_token: &str,
) -> Result<TokenResponse, CredentialError> {
    let mut backoff = Duration::from_secs(1);
    let max_backoff = Duration::from_secs(8);
    let mut last_err = CredentialError::Timeout;

    for attempt in 0..=DEFAULT_MAX_RETRIES {
        match do_refresh(client, token_url, client_id, refresh_token).await {
            Ok(token) => return Ok(token),
            Err(e) if attempt == DEFAULT_MAX_RETRIES => return Err(e),
            Err(e) => {
                tracing::debug!(attempt, error = %e.as_code(), "credential refresh attempt failed, retrying");
                last_err = e;
                tokio::time::sleep(backoff).await;
                backoff = (backoff * 2).min(max_backoff);
            }
        }
    }
    Err(last_err)
}

/// Refresh the credential at `profile_dir` and persist the result before
/// returning it, per the single-use refresh token discipline.
pub async fn refresh(
    store: &CredentialStore,
    client: &reqwest::Client,
    token_url: &str,
    client_id: &str,
    profile_dir: &std::path::Path,
) -> Result<CredentialBlob, CredentialError> {
    let current = store.read(profile_dir)?;
    let refresh_token = current.refresh_token.as_deref().ok_or(CredentialError::NoRefreshToken)?;

    let token = refresh_with_retries(client, token_url, client_id, refresh_token).await?;

    let expires_at = now_ms() + (token.expires_in as i64) * 1000;
    let new_blob = CredentialBlob {
        access_token: token.access_token,
        refresh_token: token.refresh_token.or(current.refresh_token),
        expires_at: Some(expires_at),
        email: current.email,
        name: current.name,
        error: None,
    };

    store.write(profile_dir, &new_blob)?;
    Ok(new_blob)
}

fn now_ms() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

#[cfg(test)]
#[path = "refresh_tests.rs"]
mod tests;
