// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Runs one child process attempt end to end: spawn in a PTY, pass stdio
//! through, watch for the rate-limit sentinel, forward signals, and tear
//! down idempotently on every exit path.

use std::io::Write;
use std::time::Duration;

use nix::sys::signal::Signal;
use nix::sys::termios;
use tokio::sync::mpsc;

use crate::pty::{ChildEnv, ExitStatus, NativePty};
use crate::sentinel::{SentinelBuffer, SentinelMatch};

const KILL_ESCALATION_DELAY: Duration = Duration::from_secs(3);

/// Why a single child attempt ended.
#[derive(Debug)]
pub enum RunOutcome {
    /// The child exited on its own (or was killed by an external signal).
    Exited(ExitStatus),
    /// The sentinel fired; the child has been sent SIGTERM (and SIGKILL
    /// after the escalation delay if it doesn't exit first).
    RateLimited(SentinelMatch),
}

/// RAII guard that puts stdin into raw mode and restores it on drop.
/// Idempotent: dropping twice (or never entering raw mode) is harmless.
struct RawModeGuard {
    original: termios::Termios,
}

impl RawModeGuard {
    fn enter() -> anyhow::Result<Self> {
        let stdin = std::io::stdin();
        let original = termios::tcgetattr(&stdin)?;
        let mut raw = original.clone();
        termios::cfmakeraw(&mut raw);
        termios::tcsetattr(&stdin, termios::SetArg::TCSAFLUSH, &raw)?;
        Ok(Self { original })
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        let _ = termios::tcsetattr(std::io::stdin(), termios::SetArg::TCSAFLUSH, &self.original);
    }
}

#[allow(unsafe_code)]
fn terminal_size() -> (u16, u16) {
    // SAFETY: TIOCGWINSZ on stdout's fd with a fully-initialized winsize.
    unsafe {
        let mut ws: nix::libc::winsize = std::mem::zeroed();
        let ret = nix::libc::ioctl(1, nix::libc::TIOCGWINSZ, &mut ws);
        if ret == 0 && ws.ws_col > 0 && ws.ws_row > 0 {
            (ws.ws_col, ws.ws_row)
        } else {
            (80, 24)
        }
    }
}

/// Spawn `command` under the given child environment, attach stdio, and
/// run until the child exits or the rate-limit sentinel fires.
pub async fn run_once(command: &[String], env: &ChildEnv) -> anyhow::Result<RunOutcome> {
    let (cols, rows) = terminal_size();
    let pty = NativePty::spawn(command, cols, rows, env)?;
    let raw_guard = RawModeGuard::enter().ok();

    let (stdin_tx, mut stdin_rx) = mpsc::channel::<Vec<u8>>(64);
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        let mut handle = stdin.lock();
        let mut buf = [0u8; 4096];
        loop {
            use std::io::Read;
            match handle.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => {
                    if stdin_tx.blocking_send(buf[..n].to_vec()).is_err() {
                        break;
                    }
                }
                Err(_) => break,
            }
        }
    });

    let mut sigint = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::interrupt())?;
    let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;
    let mut sighup = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::hangup())?;
    let mut sigwinch = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::window_change())?;

    let mut sentinel = SentinelBuffer::new();
    let mut kill_pending = false;
    let mut kill_at: Option<tokio::time::Instant> = None;
    let mut rate_limit_hit: Option<SentinelMatch> = None;
    let mut stdout = std::io::stdout();

    let wait_fut = pty.wait();
    tokio::pin!(wait_fut);

    let outcome = loop {
        tokio::select! {
            biased;

            status = &mut wait_fut => {
                let status = status?;
                if let Some(m) = rate_limit_hit {
                    break RunOutcome::RateLimited(m);
                }
                break RunOutcome::Exited(status);
            }

            chunk = read_pty_chunk(&pty) => {
                match chunk {
                    Some(bytes) => {
                        let _ = stdout.write_all(&bytes);
                        let _ = stdout.flush();
                        if !kill_pending {
                            if let Some(m) = sentinel.push(&bytes) {
                                kill_pending = true;
                                rate_limit_hit = Some(m);
                                let _ = pty.signal(Signal::SIGTERM);
                                kill_at = Some(tokio::time::Instant::now() + KILL_ESCALATION_DELAY);
                            }
                        }
                    }
                    None => {}
                }
            }

            data = stdin_rx.recv(), if !kill_pending => {
                match data {
                    Some(bytes) => { let _ = pty.write_all(&bytes).await; }
                    None => {}
                }
            }

            _ = sigint.recv(), if !kill_pending => {
                let _ = pty.signal(Signal::SIGINT);
            }
            _ = sigterm.recv(), if !kill_pending => {
                let _ = pty.signal(Signal::SIGTERM);
            }
            _ = sighup.recv(), if !kill_pending => {
                let _ = pty.signal(Signal::SIGHUP);
            }
            _ = sigwinch.recv() => {
                let (cols, rows) = terminal_size();
                let _ = pty.resize(cols, rows);
            }

            _ = async {
                match kill_at {
                    Some(at) => tokio::time::sleep_until(at).await,
                    None => std::future::pending().await,
                }
            }, if kill_at.is_some() => {
                let _ = pty.signal(Signal::SIGKILL);
                kill_at = None;
            }
        }
    };

    drop(raw_guard);
    Ok(outcome)
}

async fn read_pty_chunk(pty: &NativePty) -> Option<Vec<u8>> {
    let mut buf = [0u8; 4096];
    match pty.read_chunk(&mut buf).await {
        Ok(0) => None,
        Ok(n) => Some(buf[..n].to_vec()),
        Err(_) => None,
    }
}

#[cfg(test)]
#[path = "supervisor_tests.rs"]
mod tests;
