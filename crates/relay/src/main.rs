// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::Arc;

use clap::Parser;

use swapsup_core::channel_map::ChannelMap;
use swapsup_core::chat::ChatClient;
use swapsup_relay::config::RelayConfig;
use swapsup_relay::relay::{self, RelayContext};
use swapsup_relay::socket;
use swapsup_relay::tmux::Tmux;

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    let _ = rustls::crypto::ring::default_provider().install_default();

    let config = RelayConfig::parse();
    init_tracing(&config);

    let client = reqwest::Client::new();
    let channel_map = Arc::new(ChannelMap::new(config.channel_map_path()));
    let chat = Arc::new(ChatClient::new(client.clone(), config.bot_token.clone()));
    let tmux = Arc::new(Tmux::new(config.tmux_socket.clone()));
    let app_token = config.app_token.clone();
    let config = Arc::new(config);

    socket::run(&client, &app_token, move |payload| {
        let config = config.clone();
        let channel_map = channel_map.clone();
        let chat = chat.clone();
        let tmux = tmux.clone();
        async move {
            let ctx = RelayContext { config: &config, channel_map: &channel_map, chat: &chat, tmux: &tmux };
            relay::handle_event(&ctx, payload).await;
        }
    })
    .await;
}

fn init_tracing(config: &RelayConfig) {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let filter = if std::env::var("SWAPSUP_LOG_LEVEL").is_err() && config.log_level == "info" {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level))
    } else {
        EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info"))
    };

    let result = match config.log_format.as_str() {
        "json" => fmt::fmt().with_env_filter(filter).json().try_init(),
        _ => fmt::fmt().with_env_filter(filter).try_init(),
    };
    let _ = result;
}
