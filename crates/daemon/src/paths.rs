// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! On-disk layout under the well-known config directory (§6.6).

use std::path::PathBuf;

/// Resolved paths for one daemon instance.
#[derive(Debug, Clone)]
pub struct Paths {
    /// `state.json` — persisted [`afkd_storage::ProcessState`].
    pub state_path: PathBuf,
    /// `config.json` — user-editable options (§4.13).
    pub config_path: PathBuf,
    /// `daemon.lock` — the singleton lockfile (§4.1).
    pub lock_path: PathBuf,
    /// `logs/` — structured log output (§4.14).
    pub logs_dir: PathBuf,
    /// Local-stream endpoint (§6.2). Rooted under the config directory
    /// rather than the spec's hardcoded `/tmp` path, so tests can run
    /// multiple isolated daemons side by side under distinct state dirs.
    pub socket_path: PathBuf,
    /// Terminal-binding directory: a sibling of the config directory, per
    /// §6.6 ("one level up in the source").
    pub sessions_by_terminal_dir: PathBuf,
    /// The config directory itself (parent of all the paths above).
    pub state_dir: PathBuf,
}

impl Paths {
    pub fn new(state_dir: PathBuf) -> Self {
        let sessions_by_terminal_dir = state_dir
            .parent()
            .unwrap_or(&state_dir)
            .join("sessions")
            .join("by-terminal");

        Self {
            state_path: state_dir.join("state.json"),
            config_path: state_dir.join("config.json"),
            lock_path: state_dir.join("daemon.lock"),
            logs_dir: state_dir.join("logs"),
            socket_path: state_dir.join("daemon.sock"),
            sessions_by_terminal_dir,
            state_dir,
        }
    }

    pub fn log_file(&self) -> PathBuf {
        self.logs_dir.join("daemon.log")
    }
}
