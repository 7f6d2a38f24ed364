// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Pseudo-terminal plumbing: non-blocking I/O primitives and the
//! forkpty-based child spawner.

pub mod nbio;
pub mod spawn;

pub use spawn::{ChildEnv, ExitStatus, NativePty};
