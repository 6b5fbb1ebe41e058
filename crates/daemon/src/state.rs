// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The daemon's shared, process-wide context: everything the router, reply
//! dispatcher, and resolution watcher touch concurrently.

use std::sync::Arc;

use afkd_adapters::ChatAdapter;
use afkd_core::Options;
use afkd_storage::ProcessState;
use parking_lot::Mutex;
use tracing::warn;

use crate::parked::ParkedReplies;
use crate::paths::Paths;
use crate::session_registry::SessionRegistry;

/// Everything components B/G/H/I share. One instance per daemon process,
/// held behind an `Arc` and cloned into every background task.
pub struct Shared {
    pub state: Mutex<ProcessState>,
    pub sessions: Mutex<SessionRegistry>,
    pub parked: Mutex<ParkedReplies>,
    pub chat: Arc<dyn ChatAdapter>,
    pub options: Options,
    pub paths: Paths,
}

impl Shared {
    pub fn new(chat: Arc<dyn ChatAdapter>, options: Options, paths: Paths, initial: ProcessState) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(initial),
            sessions: Mutex::new(SessionRegistry::default()),
            parked: Mutex::new(ParkedReplies::default()),
            chat,
            options,
            paths,
        })
    }

    /// Persist the current `ProcessState`. Failures are logged and
    /// swallowed (§7: persistence errors are never fatal — the next
    /// mutation retries the write).
    pub fn persist(&self) {
        let snapshot = self.state.lock().clone();
        if let Err(err) = afkd_storage::save(&self.paths.state_path, &snapshot) {
            warn!(error = %err, path = %self.paths.state_path.display(), "failed to persist process state");
        }
    }

    pub fn paired_chat_id(&self) -> Option<i64> {
        self.state.lock().paired_chat_id
    }

    /// Whether the daemon can currently produce a verdict for any session:
    /// chat adapter configured and a chat paired to it.
    pub fn chat_ready(&self) -> bool {
        self.chat.is_configured() && self.paired_chat_id().is_some()
    }
}
