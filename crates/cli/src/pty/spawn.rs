// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Spawn the child in a pseudo-terminal sized to the host terminal.

use std::ffi::CString;
use std::os::fd::AsRawFd;
use std::path::Path;
use std::sync::atomic::{AtomicU16, Ordering};
use std::sync::Arc;

use anyhow::{bail, Context};
use nix::libc;
use nix::pty::{forkpty, ForkptyResult, Winsize};
use nix::sys::signal::{kill, Signal};
use nix::sys::wait::{waitpid, WaitPidFlag, WaitStatus};
use nix::unistd::{execvp, ForkResult, Pid};
use tokio::io::unix::AsyncFd;

use super::nbio::{read_chunk, set_nonblocking, write_all, PtyFd};

/// Exit status of the reaped child.
#[derive(Debug, Clone, Copy)]
pub struct ExitStatus {
    pub code: Option<i32>,
    pub signal: Option<i32>,
}

/// Environment passed to the spawned child: the config-dir env var points
/// at the selected account's profile, a truecolor flag is set so the
/// child emits styled output (detection strips styling before matching),
/// the "running-inside-assistant" marker is cleared so nested invocations
/// are not confused, and an optional remote-mode flag is set.
pub struct ChildEnv {
    pub config_dir_env: String,
    pub profile_dir: std::path::PathBuf,
    pub remote_mode: bool,
}

fn apply_child_env(env: &ChildEnv) {
    std::env::set_var(&env.config_dir_env, &env.profile_dir);
    std::env::set_var("COLORTERM", "truecolor");
    std::env::remove_var("SWAPSUP_INSIDE");
    if env.remote_mode {
        std::env::set_var("SWAPSUP_REMOTE", "1");
    } else {
        std::env::remove_var("SWAPSUP_REMOTE");
    }
}

/// The spawned child's PTY, attached via `forkpty`.
pub struct NativePty {
    master: AsyncFd<PtyFd>,
    child_pid: Pid,
    cols: Arc<AtomicU16>,
    rows: Arc<AtomicU16>,
}

impl NativePty {
    /// Spawn `command` (must have at least one element: the program to
    /// run) on a new PTY sized `cols` x `rows`.
    #[allow(unsafe_code)]
    pub fn spawn(command: &[String], cols: u16, rows: u16, env: &ChildEnv) -> anyhow::Result<Self> {
        if command.is_empty() {
            bail!("command must have at least one element");
        }
        let winsize = Winsize { ws_col: cols, ws_row: rows, ws_xpixel: 0, ws_ypixel: 0 };

        // SAFETY: forkpty is unsafe because the child is in a
        // partially-initialized state after fork. We immediately exec.
        let result = unsafe { forkpty(&winsize, None) }.context("forkpty failed")?;
        let ForkptyResult { master, fork_result } = result;

        match fork_result {
            ForkResult::Child => {
                apply_child_env(env);

                let c_args: Vec<CString> = command
                    .iter()
                    .map(|s| CString::new(s.as_bytes()))
                    .collect::<Result<_, _>>()
                    .context("invalid command argument")?;

                execvp(&c_args[0], &c_args).context("execvp failed")?;
                unreachable!("execvp replaces the process image on success");
            }
            ForkResult::Parent { child } => {
                set_nonblocking(&master)?;
                let afd = AsyncFd::new(PtyFd(master)).context("AsyncFd::new failed")?;
                Ok(Self {
                    master: afd,
                    child_pid: child,
                    cols: Arc::new(AtomicU16::new(cols)),
                    rows: Arc::new(AtomicU16::new(rows)),
                })
            }
        }
    }

    pub fn child_pid(&self) -> Pid {
        self.child_pid
    }

    pub async fn read_chunk(&self, buf: &mut [u8]) -> std::io::Result<usize> {
        read_chunk(&self.master, buf).await
    }

    pub async fn write_all(&self, data: &[u8]) -> std::io::Result<()> {
        write_all(&self.master, data).await
    }

    /// Propagate a terminal size change to the PTY.
    #[allow(unsafe_code)]
    pub fn resize(&self, cols: u16, rows: u16) -> anyhow::Result<()> {
        self.cols.store(cols, Ordering::Relaxed);
        self.rows.store(rows, Ordering::Relaxed);

        let ws = Winsize { ws_col: cols, ws_row: rows, ws_xpixel: 0, ws_ypixel: 0 };

        // SAFETY: TIOCSWINSZ is a well-defined ioctl that sets the window
        // size on the PTY master fd; `ws` is fully initialized.
        let ret = unsafe { libc::ioctl(self.master.as_raw_fd(), libc::TIOCSWINSZ, &ws) };
        if ret < 0 {
            bail!("TIOCSWINSZ ioctl failed: {}", std::io::Error::last_os_error());
        }
        Ok(())
    }

    /// Send `signal` to the child.
    pub fn signal(&self, signal: Signal) -> anyhow::Result<()> {
        kill(self.child_pid, signal).context("kill failed")
    }

    /// Block (on a blocking thread) until the child exits.
    pub async fn wait(&self) -> anyhow::Result<ExitStatus> {
        let pid = self.child_pid;
        tokio::task::spawn_blocking(move || wait_for_exit(pid)).await.context("join wait thread")?
    }
}

impl Drop for NativePty {
    fn drop(&mut self) {
        let _ = kill(self.child_pid, Signal::SIGHUP);
        let _ = waitpid(self.child_pid, Some(WaitPidFlag::WNOHANG));
    }
}

fn wait_for_exit(pid: Pid) -> anyhow::Result<ExitStatus> {
    loop {
        match waitpid(pid, None) {
            Ok(WaitStatus::Exited(_, code)) => return Ok(ExitStatus { code: Some(code), signal: None }),
            Ok(WaitStatus::Signaled(_, sig, _)) => return Ok(ExitStatus { code: None, signal: Some(sig as i32) }),
            Ok(_) => continue,
            Err(nix::errno::Errno::EINTR) => continue,
            Err(e) => bail!("waitpid failed: {e}"),
        }
    }
}

/// Whether `profile_dir` exists; used by the caller when deciding
/// `ensure_default` semantics.
pub fn profile_dir_exists(profile_dir: &Path) -> bool {
    profile_dir.exists()
}

#[cfg(test)]
#[path = "spawn_tests.rs"]
mod tests;
