// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn credential_error_http_renders_status() {
    assert_eq!(CredentialError::Http(401).as_code(), "HTTP 401");
    assert_eq!(CredentialError::NoCredentials.as_code(), "no_credentials");
}

#[test]
fn channel_error_deactivation_set() {
    assert!(ChannelError::ChannelNotFound.should_deactivate());
    assert!(ChannelError::IsArchived.should_deactivate());
    assert!(!ChannelError::NameTaken.should_deactivate());
    assert!(!ChannelError::MessageNotFound.should_deactivate());
}

#[test]
fn swap_error_exit_code_is_one() {
    assert_eq!(SwapError::MaxSwapsReached.exit_code(), 1);
    assert_eq!(SwapError::NoAlternativeAccounts.exit_code(), 1);
    assert_eq!(SwapError::MigrationFailed.exit_code(), 1);
}