// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The persisted half of a pending request.
//!
//! The live reply channel (the hook's blocked stream) is deliberately not a
//! field here — it cannot be serialized and lives only in the daemon's
//! in-memory parked-reply map, keyed by the same [`MessageId`]. This type is
//! the write-behind record: everything needed to resume after a restart
//! except the ability to actually answer the caller (a restart always
//! discards in-flight requests, see the startup-recovery notice).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::ids::{HostSessionId, MessageId, TerminalId};

/// Which hook request produced this pending prompt, and the fields unique
/// to that request kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PendingKind {
    Permission {
        tool_name: String,
        command_text: String,
        tool_use_id: String,
        /// Whether an "all" reply is accepted for this tool (the tool is in
        /// the configured bulk-approval list).
        bulk_allowed: bool,
    },
    Stop,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingRequest {
    pub message_id: MessageId,
    pub session_id: HostSessionId,
    pub kind: PendingKind,
    pub transcript_path: PathBuf,
    pub project_dir: PathBuf,
    pub terminal_id: TerminalId,
    /// Line offset last examined in `transcript_path` by the resolution watcher.
    pub last_scanned_offset: u64,
    pub first_seen_at: DateTime<Utc>,
    /// Echoed back to the hook on every reply frame for this request.
    pub correlation_id: String,
    pub retry_count: u32,
}

impl PendingRequest {
    pub fn tool_name(&self) -> Option<&str> {
        match &self.kind {
            PendingKind::Permission { tool_name, .. } => Some(tool_name),
            PendingKind::Stop => None,
        }
    }

    pub fn command_text(&self) -> Option<&str> {
        match &self.kind {
            PendingKind::Permission { command_text, .. } => Some(command_text),
            PendingKind::Stop => None,
        }
    }

    pub fn is_permission(&self) -> bool {
        matches!(self.kind, PendingKind::Permission { .. })
    }
}
