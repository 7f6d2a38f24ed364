// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Entrypoint glue: wire the registry, credential store, channel map, and
//! HTTP client together, pick the starting account, and hand off to the
//! swap loop.

use swapsup_core::channel_map::ChannelMap;
use swapsup_core::credential::CredentialStore;
use swapsup_core::model::{Account, DEFAULT_ACCOUNT_NAME};
use swapsup_core::registry::Registry;
use swapsup_core::scorer::{self, Candidate, ScorerOptions};
use swapsup_core::usage;

use crate::config::Config;
use crate::swaploop::{self, SwapLoopContext, SwapOptions};

/// Final result of a full invocation: the exit code to propagate to the
/// shell, plus the swap audit log for anyone embedding this as a library.
pub struct RunResult {
    pub exit_code: i32,
    pub swaps: Vec<swaploop::SwapRecord>,
}

pub async fn run(config: Config) -> anyhow::Result<RunResult> {
    std::fs::create_dir_all(config.effective_config_dir())?;
    std::fs::create_dir_all(config.progress_dir())?;

    let registry = Registry::new(config.registry_path());
    let mut accounts = registry.list()?;
    if accounts.is_empty() {
        accounts.push(Account { name: DEFAULT_ACCOUNT_NAME.to_string(), profile_dir: config.default_profile_dir(), priority: None });
    }

    let credentials = CredentialStore::new(config.default_profile_dir());
    let client = reqwest::Client::new();

    let initial = pick_initial(&config, &accounts, &credentials, &client).await?;

    let channel_map = if config.remote_mode { Some(ChannelMap::new(config.channel_map_path())) } else { None };

    let cwd = std::env::current_dir()?.to_string_lossy().to_string();

    let ctx = SwapLoopContext {
        accounts: &accounts,
        credentials: &credentials,
        client: &client,
        usage_url: &config.usage_url,
        cwd,
        use_priority: config.use_priority,
        remote_channel_map: channel_map.as_ref(),
        tmux_session: config.tmux_session.clone(),
        notify_sleep: None,
        notify_switch: None,
        reauth: None,
    };

    let opts = SwapOptions {
        max_swaps: config.max_swaps,
        remote_mode: config.remote_mode,
        config_dir_env: config.child_config_dir_env.clone(),
    };

    let outcome = swaploop::run(&ctx, &initial, &config.command, &opts).await;
    Ok(RunResult { exit_code: outcome.exit_code, swaps: outcome.swaps })
}

/// Pick the starting account: the one named by `--account` if given and
/// present, else the lowest/priority-ranked candidate among those with
/// readable credentials, else the registry's first entry.
async fn pick_initial(
    config: &Config,
    accounts: &[Account],
    credentials: &CredentialStore,
    client: &reqwest::Client,
) -> anyhow::Result<Account> {
    if let Some(name) = &config.account {
        if let Some(account) = accounts.iter().find(|a| &a.name == name) {
            return Ok(account.clone());
        }
        anyhow::bail!("no such account: {name}");
    }

    let with_tokens: Vec<(Account, Option<String>)> = accounts
        .iter()
        .map(|a| (a.clone(), credentials.read(&a.profile_dir).ok().map(|b| b.access_token)))
        .collect();
    let usages = usage::check_all(client, &config.usage_url, with_tokens).await;
    let tokens: Vec<Option<String>> = accounts.iter().map(|a| credentials.read(&a.profile_dir).ok().map(|b| b.access_token)).collect();
    let candidates: Vec<Candidate> = usages
        .iter()
        .zip(tokens.iter())
        .map(|(u, token)| Candidate { account: &u.account, token: token.as_deref(), usage: &u.snapshot })
        .collect();

    match scorer::pick_best(&candidates, None, ScorerOptions { use_priority: config.use_priority }) {
        Some(pick) => Ok(pick.account.clone()),
        None => accounts.first().cloned().ok_or_else(|| anyhow::anyhow!("no accounts registered")),
    }
}
