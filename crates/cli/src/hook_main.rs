// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Glue between the `hook` subcommand and the stateless event handler in
//! `swapsup_core`'s sibling hook module: read one JSON event from stdin,
//! build the context it needs, dispatch, and map any error to exit 1.

use std::io::Read;

use swapsup_core::channel_map::ChannelMap;
use swapsup_core::chat::ChatClient;

use crate::config::Config;
use crate::hook::{HookContext, HookEvent};

pub async fn run(config: &Config) -> i32 {
    let mut input = String::new();
    if std::io::stdin().read_to_string(&mut input).is_err() {
        return 1;
    }
    let event: HookEvent = match serde_json::from_str(&input) {
        Ok(e) => e,
        Err(e) => {
            tracing::error!("hook: malformed event: {e}");
            return 1;
        }
    };

    let Some(bot_token) = &config.bot_token else {
        tracing::warn!("hook: no bot token configured, dropping event");
        return 0;
    };

    let channel_map = ChannelMap::new(config.channel_map_path());
    let progress_dir = config.progress_dir();
    let chat = ChatClient::new(reqwest::Client::new(), bot_token.clone());

    let ctx = HookContext { channel_map: &channel_map, progress_dir: &progress_dir, chat: &chat };

    match crate::hook::handle(&ctx, event).await {
        Ok(()) => 0,
        Err(e) => {
            tracing::error!("hook: {e:#}");
            1
        }
    }
}
