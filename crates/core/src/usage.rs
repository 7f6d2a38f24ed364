// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Usage client: query the remote quota API for an authenticated account
//! and parse both response shapes it is known to return.

use std::time::Duration;

use serde::Deserialize;

use crate::model::{normalize_percent, Account, UsageSnapshot, UsageWindow};

const USAGE_TIMEOUT: Duration = Duration::from_secs(10);
const PROFILE_TIMEOUT: Duration = Duration::from_secs(10);

/// `fetch_profile` result.
#[derive(Debug, Clone, Default)]
pub struct ProfileInfo {
    pub name: Option<String>,
    pub email: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProfileResponse {
    account: ProfileAccount,
}

#[derive(Debug, Deserialize, Default)]
struct ProfileAccount {
    full_name: Option<String>,
    display_name: Option<String>,
    email: Option<String>,
}

/// Accepts either response shape the quota endpoint is known to send,
/// rather than inferring the shape from field presence — see the
/// "dynamic shape in usage response" design note.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum UsageResponse {
    Nested { five_hour: Option<RawWindow>, seven_day: Option<RawWindow> },
    Flat {
        five_hour_utilization: Option<f64>,
        seven_day_utilization: Option<f64>,
        five_hour_reset_at: Option<String>,
        seven_day_reset_at: Option<String>,
    },
}

#[derive(Debug, Deserialize)]
struct RawWindow {
    utilization: Option<f64>,
    resets_at: Option<String>,
}

fn window_from_raw(raw: Option<RawWindow>) -> UsageWindow {
    match raw {
        Some(w) => UsageWindow {
            utilization: normalize_percent(w.utilization.unwrap_or(0.0)),
            resets_at: w.resets_at,
        },
        None => UsageWindow { utilization: 0.0, resets_at: None },
    }
}

/// Query the quota API for `token`, returning a snapshot. Errors are
/// carried as data in [`UsageSnapshot::error`] rather than raised, per
/// spec; there are no retries at this layer.
pub async fn check_usage(client: &reqwest::Client, usage_url: &str, token: &str) -> UsageSnapshot {
    let result = client
        .get(usage_url)
        .bearer_auth(token)
        .timeout(USAGE_TIMEOUT)
        .send()
        .await;

    let resp = match result {
        Ok(r) => r,
        Err(e) if e.is_timeout() => return UsageSnapshot { error: Some("timeout".into()), ..Default::default() },
        Err(_) => return UsageSnapshot { error: Some("timeout".into()), ..Default::default() },
    };

    if !resp.status().is_success() {
        return UsageSnapshot { error: Some(format!("HTTP {}", resp.status().as_u16())), ..Default::default() };
    }

    match resp.json::<UsageResponse>().await {
        Ok(UsageResponse::Nested { five_hour, seven_day }) => UsageSnapshot {
            session: Some(window_from_raw(five_hour)),
            weekly: Some(window_from_raw(seven_day)),
            error: None,
        },
        Ok(UsageResponse::Flat {
            five_hour_utilization,
            seven_day_utilization,
            five_hour_reset_at,
            seven_day_reset_at,
        }) => UsageSnapshot {
            session: Some(UsageWindow {
                utilization: normalize_percent(five_hour_utilization.unwrap_or(0.0)),
                resets_at: five_hour_reset_at,
            }),
            weekly: Some(UsageWindow {
                utilization: normalize_percent(seven_day_utilization.unwrap_or(0.0)),
                resets_at: seven_day_reset_at,
            }),
            error: None,
        },
        // Unrecognized shape normalizes to zero utilization with no error;
        // the next poll may succeed.
        Err(_) => UsageSnapshot {
            session: Some(UsageWindow::default()),
            weekly: Some(UsageWindow::default()),
            error: None,
        },
    }
}

/// Fetch display name and email for `token`.
pub async fn fetch_profile(client: &reqwest::Client, profile_url: &str, token: &str) -> Result<ProfileInfo, String> {
    let resp = client
        .get(profile_url)
        .bearer_auth(token)
        .timeout(PROFILE_TIMEOUT)
        .send()
        .await
        .map_err(|e| if e.is_timeout() { "timeout".to_string() } else { e.to_string() })?;

    if !resp.status().is_success() {
        return Err(format!("HTTP {}", resp.status().as_u16()));
    }

    let parsed: ProfileResponse = resp.json().await.map_err(|e| e.to_string())?;
    Ok(ProfileInfo {
        name: parsed.account.full_name.or(parsed.account.display_name),
        email: parsed.account.email,
    })
}

/// An account paired with its freshly queried usage snapshot.
pub struct AccountUsage {
    pub account: Account,
    pub snapshot: UsageSnapshot,
}

/// Fan out `check_usage` across every account's token, preserving input
/// order in the result.
pub async fn check_all(
    client: &reqwest::Client,
    usage_url: &str,
    accounts_with_tokens: Vec<(Account, Option<String>)>,
) -> Vec<AccountUsage> {
    let futures = accounts_with_tokens.into_iter().map(|(account, token)| {
        let client = client.clone();
        let usage_url = usage_url.to_string();
        async move {
            let snapshot = match token {
                Some(t) => check_usage(&client, &usage_url, &t).await,
                None => UsageSnapshot { error: Some("no_credentials".into()), ..Default::default() },
            };
            AccountUsage { account, snapshot }
        }
    });
    futures_util::future::join_all(futures).await
}

#[cfg(test)]
#[path = "usage_tests.rs"]
mod tests;
