// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use clap::Parser;

use super::Config;

fn parse(args: &[&str]) -> Config {
    Config::parse_from(args)
}

#[test]
fn valid_config_with_command() -> anyhow::Result<()> {
    let config = parse(&["swapsup", "--", "claude"]);
    config.validate()?;
    assert_eq!(config.command, vec!["claude"]);
    Ok(())
}

#[test]
fn invalid_no_command() {
    let config = parse(&["swapsup"]);
    assert!(config.validate().is_err());
}

#[test]
fn remote_mode_requires_tmux_session_and_bot_token() {
    let config = parse(&["swapsup", "--remote-mode", "--", "claude"]);
    let err = config.validate().unwrap_err();
    assert!(err.to_string().contains("tmux-session"));

    let config = parse(&["swapsup", "--remote-mode", "--tmux-session", "proj-abc", "--", "claude"]);
    let err = config.validate().unwrap_err();
    assert!(err.to_string().contains("bot-token"));

    let config = parse(&[
        "swapsup",
        "--remote-mode",
        "--tmux-session",
        "proj-abc",
        "--bot-token",
        "xoxb-test",
        "--",
        "claude",
    ]);
    config.validate().unwrap();
}

#[test]
fn config_dir_defaults_under_home() {
    let config = parse(&["swapsup", "--", "claude"]);
    assert!(config.effective_config_dir().ends_with(".swapsup"));
}

#[test]
fn explicit_config_dir_is_honored() {
    let config = parse(&["swapsup", "--config-dir", "/tmp/custom-swapsup", "--", "claude"]);
    assert_eq!(config.effective_config_dir(), std::path::PathBuf::from("/tmp/custom-swapsup"));
    assert_eq!(config.registry_path(), std::path::PathBuf::from("/tmp/custom-swapsup/accounts.json"));
}
