// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Singleton gate (component A): exclusive lock on a lockfile, with a
//! liveness heartbeat so an external observer can distinguish a live lock
//! from an abandoned one.

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use fs2::FileExt;
use thiserror::Error;
use tokio::task::JoinHandle;

/// How old a lockfile's mtime may be before an external observer should
/// treat it as abandoned. This daemon does not act on this window itself —
/// it always trusts the OS-level advisory lock — the window exists purely
/// for operator tooling inspecting the file out of process.
pub const STALENESS_WINDOW: Duration = Duration::from_secs(60);

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(15);

#[derive(Debug, Error)]
pub enum SingletonError {
    #[error("daemon is already running")]
    AlreadyRunning,
    #[error("io error acquiring lock: {0}")]
    Io(#[from] std::io::Error),
}

/// Holds the exclusive lock and the background heartbeat task for the
/// lifetime of the daemon. Dropping it releases the lock and stops the
/// heartbeat.
pub struct SingletonGuard {
    _lock_file: File,
    heartbeat: JoinHandle<()>,
}

impl Drop for SingletonGuard {
    fn drop(&mut self) {
        self.heartbeat.abort();
    }
}

/// Acquire the singleton lock at `lock_path`, writing the current PID and
/// starting the 15-second mtime heartbeat. Any failure — already locked,
/// or any other I/O error opening/locking the file — is treated as a
/// conservative refusal to start.
pub fn acquire(lock_path: &Path) -> Result<SingletonGuard, SingletonError> {
    if let Some(parent) = lock_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let lock_file = std::fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(false)
        .open(lock_path)?;

    lock_file
        .try_lock_exclusive()
        .map_err(|_| SingletonError::AlreadyRunning)?;

    let mut lock_file = lock_file;
    lock_file.set_len(0)?;
    writeln!(lock_file, "{}", std::process::id())?;

    let heartbeat = spawn_heartbeat(lock_path.to_path_buf());

    Ok(SingletonGuard {
        _lock_file: lock_file,
        heartbeat,
    })
}

fn spawn_heartbeat(lock_path: PathBuf) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(HEARTBEAT_INTERVAL);
        loop {
            interval.tick().await;
            if let Err(err) = touch_mtime(&lock_path) {
                tracing::warn!(error = %err, path = %lock_path.display(), "failed to touch lockfile mtime");
            }
        }
    })
}

/// Touch the lockfile's mtime by rewriting its content (the PID is
/// unchanged; the write itself advances the filesystem's mtime).
fn touch_mtime(lock_path: &Path) -> std::io::Result<()> {
    let mut file = std::fs::OpenOptions::new().write(true).truncate(true).open(lock_path)?;
    writeln!(file, "{}", std::process::id())
}

#[cfg(test)]
#[path = "singleton_tests.rs"]
mod tests;
