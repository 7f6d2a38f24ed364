// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use clap::Parser;
use tracing::error;

use swapsup::config::Config;

#[derive(Parser)]
#[command(name = "swapsup", version, about = "Runs a single coding-assistant session across multiple accounts.")]
struct Cli {
    #[command(flatten)]
    config: Config,

    #[command(subcommand)]
    subcommand: Option<Commands>,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Stateless worker invoked by the child on lifecycle events; reads
    /// one JSON event from stdin.
    Hook,
}

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    let _ = rustls::crypto::ring::default_provider().install_default();

    let cli = Cli::parse();
    init_tracing(&cli.config);

    match cli.subcommand {
        Some(Commands::Hook) => {
            std::process::exit(swapsup::hook_main::run(&cli.config).await);
        }
        None => {
            if let Err(e) = cli.config.validate() {
                eprintln!("error: {e}");
                std::process::exit(2);
            }

            match swapsup::run::run(cli.config).await {
                Ok(result) => std::process::exit(result.exit_code),
                Err(e) => {
                    error!("fatal: {e:#}");
                    std::process::exit(1);
                }
            }
        }
    }
}

/// Priority: `--log-level`/`SWAPSUP_LOG_LEVEL` > `RUST_LOG` > `"info"`.
fn init_tracing(config: &Config) {
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
