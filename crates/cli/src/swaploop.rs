// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The swap loop: run the child, detect a rate limit, migrate the
//! session, pick the next account, and resume — bounded by `max_swaps`,
//! with an interruptible sleep-until-reset gate when every account is
//! exhausted.

use std::time::Duration;

use swapsup_core::channel_map::ChannelMap;
use swapsup_core::credential::CredentialStore;
use swapsup_core::model::{cwd_hash, effective_utilization, Account, SessionId};
use swapsup_core::scorer::{self, Candidate, Pick, ScorerOptions};
use swapsup_core::session_store;
use swapsup_core::usage::{self, AccountUsage};

use crate::pty::ChildEnv;
use crate::supervisor::{self, RunOutcome};

/// `max(5, 2 * accounts.len())` so every account gets at least one
/// chance even after mid-session recoveries.
pub fn default_max_swaps(account_count: usize) -> u32 {
    (2 * account_count as u32).max(5)
}

/// Upper bound on a sleep-until-reset wait, regardless of how far away
/// the earliest reset timestamp is.
const MAX_SLEEP: Duration = Duration::from_secs(6 * 60 * 60);

/// Utilization at/above this, for every account, triggers the
/// sleep-until-reset gate.
const SLEEP_THRESHOLD: f64 = 99.0;

const CONTINUATION_PROMPT: &str = "Continue.";

/// Flags that take a value, for the purposes of `build_resume_args`'s
/// positional-argument stripping on a rate-limit continuation.
const VALUE_FLAGS: &[&str] = &["--append-system-prompt"];

pub struct SwapOptions {
    pub max_swaps: Option<u32>,
    pub remote_mode: bool,
    pub config_dir_env: String,
}

/// One recorded swap, for the audit log and test assertions.
#[derive(Debug, Clone)]
pub struct SwapRecord {
    pub from: String,
    pub to: String,
    pub reason: String,
}

pub struct SwapLoopOutcome {
    pub exit_code: i32,
    pub swaps: Vec<SwapRecord>,
}

/// Everything the swap loop needs to talk to the outside world, gathered
/// so the orchestration function stays unit-testable in isolation from
/// its helpers.
pub struct SwapLoopContext<'a> {
    pub accounts: &'a [Account],
    pub credentials: &'a CredentialStore,
    pub client: &'a reqwest::Client,
    pub usage_url: &'a str,
    pub cwd: String,
    pub use_priority: bool,
    pub remote_channel_map: Option<&'a ChannelMap>,
    pub tmux_session: Option<String>,
    pub notify_sleep: Option<&'a (dyn Fn(&str) + Sync)>,
    /// Emitted on every completed swap when `remote_mode` is set.
    pub notify_switch: Option<&'a (dyn Fn(&str, &str) + Sync)>,
    /// Attempts an interactive re-auth for `account` when its usage error
    /// indicates token rejection (HTTP 401/403); returns whether it
    /// succeeded. Only consulted outside remote mode. The interactive
    /// flow itself is out of scope here — callers not offering one can
    /// leave this `None`, in which case the account is simply dropped
    /// from the candidate set.
    pub reauth: Option<&'a (dyn Fn(&Account) -> bool + Sync)>,
}

fn looks_like_token_rejection(err: &str) -> bool {
    err == "HTTP 401" || err == "HTTP 403"
}

/// Strip `--resume`/`-r` and its value from `args`. On a continuation
/// swap, also strips every positional (non-flag, non-flag-value)
/// argument and appends a fixed continuation prompt, then prepends the
/// new `--resume <id>` if a session id is available.
pub fn build_resume_args(args: &[String], session_id: Option<&str>, continuation: bool) -> Vec<String> {
    let mut kept = Vec::new();
    let mut i = 0;
    while i < args.len() {
        let a = &args[i];
        if a == "--resume" || a == "-r" {
            i += 2;
            continue;
        }
        if VALUE_FLAGS.contains(&a.as_str()) {
            kept.push(a.clone());
            if i + 1 < args.len() {
                kept.push(args[i + 1].clone());
            }
            i += 2;
            continue;
        }
        if continuation && !a.starts_with('-') {
            i += 1;
            continue;
        }
        kept.push(a.clone());
        i += 1;
    }

    let mut out = Vec::new();
    if let Some(id) = session_id {
        out.push("--resume".to_string());
        out.push(id.to_string());
    }
    out.extend(kept);
    if continuation {
        out.push(CONTINUATION_PROMPT.to_string());
    }
    out
}

/// Earliest reset timestamp across every account's session/weekly
/// windows, parsed as RFC 3339. Unparseable or missing timestamps are
/// ignored rather than treated as "already reset".
fn earliest_reset(usages: &[AccountUsage], now: chrono::DateTime<chrono::Utc>) -> Option<Duration> {
    usages
        .iter()
        .flat_map(|u| [u.snapshot.session.as_ref(), u.snapshot.weekly.as_ref()])
        .flatten()
        .filter_map(|w| w.resets_at.as_deref())
        .filter_map(|s| chrono::DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&chrono::Utc))
        .filter(|dt| *dt > now)
        .min()
        .map(|dt| (dt - now).to_std().unwrap_or(Duration::ZERO))
}

fn candidates<'a>(usages: &'a [AccountUsage], tokens: &'a [Option<String>]) -> Vec<Candidate<'a>> {
    usages
        .iter()
        .zip(tokens.iter())
        .map(|(u, token)| Candidate { account: &u.account, token: token.as_deref(), usage: &u.snapshot })
        .collect()
}

async fn query_all(ctx: &SwapLoopContext<'_>) -> Vec<AccountUsage> {
    let with_tokens: Vec<(Account, Option<String>)> = ctx
        .accounts
        .iter()
        .map(|a| {
            let token = ctx.credentials.read(&a.profile_dir).ok().map(|b| b.access_token);
            (a.clone(), token)
        })
        .collect();
    usage::check_all(ctx.client, ctx.usage_url, with_tokens).await
}

fn pick<'a>(usages: &'a [AccountUsage], tokens: &'a [Option<String>], exclude: Option<&str>, use_priority: bool) -> Option<Pick<'a>> {
    let pool = candidates(usages, tokens);
    scorer::pick_best(&pool, exclude, ScorerOptions { use_priority })
}

/// Run the swap loop to completion, returning the process exit code and
/// the swap audit log.
pub async fn run(ctx: &SwapLoopContext<'_>, initial: &Account, child_args: &[String], opts: &SwapOptions) -> SwapLoopOutcome {
    let max_swaps = opts.max_swaps.unwrap_or_else(|| default_max_swaps(ctx.accounts.len()));
    let mut swaps = Vec::new();
    let mut swap_count = 0u32;

    let mut current = initial.clone();
    let program = child_args.first().cloned().unwrap_or_default();
    let mut rest = child_args.get(1..).unwrap_or(&[]).to_vec();
    let mut existing_resume = extract_resume_id(&rest);

    if opts.remote_mode {
        if let (Some(map), Some(tmux)) = (ctx.remote_channel_map, ctx.tmux_session.as_deref()) {
            let _ = map.deactivate_for_tmux(tmux, now_ms());
        }
    }

    loop {
        let env = ChildEnv {
            config_dir_env: opts.config_dir_env.clone(),
            profile_dir: current.profile_dir.clone(),
            remote_mode: opts.remote_mode,
        };

        let full_args: Vec<String> = std::iter::once(program.clone()).chain(rest.iter().cloned()).collect();
        let outcome = match supervisor::run_once(&full_args, &env).await {
            Ok(o) => o,
            Err(_) => return SwapLoopOutcome { exit_code: 1, swaps },
        };

        let rate_limit = match outcome {
            RunOutcome::Exited(status) => {
                let code = status.code.unwrap_or(1);
                return SwapLoopOutcome { exit_code: code, swaps };
            }
            RunOutcome::RateLimited(m) => m,
        };
        tracing::info!("[supervisor] rate limit hit, reset hint: {}", rate_limit.reset_hint);

        swap_count += 1;
        if swap_count > max_swaps {
            return SwapLoopOutcome { exit_code: 1, swaps };
        }

        let hash = cwd_hash(&ctx.cwd);
        let session_id = existing_resume
            .clone()
            .or_else(|| session_store::find_latest_in_profile(&current.profile_dir, &hash).map(|l| l.session_id));

        let usages = query_all(ctx).await;
        let tokens: Vec<Option<String>> = ctx
            .accounts
            .iter()
            .map(|a| ctx.credentials.read(&a.profile_dir).ok().map(|b| b.access_token))
            .collect();

        let mut best = pick(&usages, &tokens, Some(current.name.as_str()), ctx.use_priority);

        if best.as_ref().map(|p| effective_utilization(&usages_for(&usages, p.account.name.as_str()))).unwrap_or(100.0)
            >= SLEEP_THRESHOLD
        {
            if let Some(wait) = earliest_reset(&usages, chrono::Utc::now()) {
                let clamped = wait.min(MAX_SLEEP);
                if let Some(notify) = ctx.notify_sleep {
                    notify(&format!("sleeping {:.0}s until reset", clamped.as_secs_f64()));
                }
                match interruptible_sleep(clamped).await {
                    SleepResult::Completed => {}
                    SleepResult::Interrupted => return SwapLoopOutcome { exit_code: 130, swaps },
                }
                let usages_after = query_all(ctx).await;
                let tokens_after: Vec<Option<String>> = ctx
                    .accounts
                    .iter()
                    .map(|a| ctx.credentials.read(&a.profile_dir).ok().map(|b| b.access_token))
                    .collect();
                best = pick(&usages_after, &tokens_after, None, ctx.use_priority);
            }
        }

        if best.is_none() && !opts.remote_mode {
            if let Some(reauth) = ctx.reauth {
                for u in &usages {
                    let rejected = u.snapshot.error.as_deref().map(looks_like_token_rejection).unwrap_or(false);
                    if rejected {
                        reauth(&u.account);
                    }
                }
                let usages_retry = query_all(ctx).await;
                let tokens_retry: Vec<Option<String>> = ctx
                    .accounts
                    .iter()
                    .map(|a| ctx.credentials.read(&a.profile_dir).ok().map(|b| b.access_token))
                    .collect();
                best = pick(&usages_retry, &tokens_retry, Some(current.name.as_str()), ctx.use_priority);
            }
        }

        let Some(winner) = best else {
            return SwapLoopOutcome { exit_code: 1, swaps };
        };
        let next = winner.account.clone();
        let reason = winner.reason.clone();

        if opts.remote_mode {
            if let Some(notify) = ctx.notify_switch {
                notify(&current.name, &next.name);
            }
        }

        if let Some(sid) = &session_id {
            if let Err(e) = session_store::migrate(&current.profile_dir, &next.profile_dir, &hash, sid) {
                tracing::warn!("[supervisor] migration failed for {}: {e}", sid);
            }
        }

        rest = build_resume_args(&rest, session_id.as_ref().map(SessionId::as_str), true);
        existing_resume = session_id;

        swaps.push(SwapRecord { from: current.name.clone(), to: next.name.clone(), reason });
        tracing::info!("[supervisor] swap {} -> {}", current.name, next.name);
        current = next;
    }
}

fn usages_for<'a>(usages: &'a [AccountUsage], name: &str) -> swapsup_core::model::UsageSnapshot {
    usages
        .iter()
        .find(|u| u.account.name == name)
        .map(|u| u.snapshot.clone())
        .unwrap_or_default()
}

fn extract_resume_id(args: &[String]) -> Option<SessionId> {
    let mut iter = args.iter();
    while let Some(a) = iter.next() {
        if a == "--resume" || a == "-r" {
            if let Some(v) = iter.next() {
                return swapsup_core::model::validate_session_id(v).ok();
            }
        }
    }
    None
}

enum SleepResult {
    Completed,
    Interrupted,
}

async fn interruptible_sleep(d: Duration) -> SleepResult {
    let mut sigint = match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::interrupt()) {
        Ok(s) => s,
        Err(_) => return SleepResult::Completed,
    };
    let mut sigterm = match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
        Ok(s) => s,
        Err(_) => return SleepResult::Completed,
    };
    tokio::select! {
        _ = tokio::time::sleep(d) => SleepResult::Completed,
        _ = sigint.recv() => SleepResult::Interrupted,
        _ = sigterm.recv() => SleepResult::Interrupted,
    }
}

fn now_ms() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

#[cfg(test)]
#[path = "swaploop_tests.rs"]
mod tests;
