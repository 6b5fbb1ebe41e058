// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The persisted aggregate (component J's payload) and the pending-request
//! dual index (component D).

use afkd_core::{HostSessionId, MessageId, PendingRequest};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Process-wide singleton state. Every mutation is followed by a full
/// overwrite of the persisted file (see [`crate::snapshot`]).
#[derive(Debug, Default, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProcessState {
    #[serde(default)]
    pub paired_chat_id: Option<i64>,
    #[serde(default)]
    pub afk_enabled: HashSet<HostSessionId>,
    #[serde(default)]
    pub pending_requests: HashMap<MessageId, PendingRequest>,
    #[serde(default)]
    pub requests_by_session: HashMap<HostSessionId, Vec<MessageId>>,
    #[serde(default)]
    pub session_whitelists: HashMap<HostSessionId, HashSet<String>>,
}

impl ProcessState {
    pub fn is_afk_enabled(&self, session_id: &HostSessionId) -> bool {
        self.afk_enabled.contains(session_id)
    }

    pub fn enable_afk(&mut self, session_id: HostSessionId) {
        self.afk_enabled.insert(session_id);
    }

    pub fn disable_afk(&mut self, session_id: &HostSessionId) {
        self.afk_enabled.remove(session_id);
        self.session_whitelists.remove(session_id);
    }

    pub fn is_whitelisted(&self, session_id: &HostSessionId, tool_name: &str) -> bool {
        self.session_whitelists
            .get(session_id)
            .is_some_and(|set| set.contains(tool_name))
    }

    pub fn whitelist(&mut self, session_id: HostSessionId, tool_name: String) {
        self.session_whitelists.entry(session_id).or_default().insert(tool_name);
    }

    /// Insert a pending request, keeping the dual index consistent
    /// (invariant: every message-id in `pending_requests` appears exactly
    /// once in the matching `requests_by_session` entry).
    pub fn insert_pending(&mut self, request: PendingRequest) {
        let session_id = request.session_id.clone();
        let message_id = request.message_id.clone();
        self.pending_requests.insert(message_id.clone(), request);
        let entry = self.requests_by_session.entry(session_id).or_default();
        if !entry.contains(&message_id) {
            entry.push(message_id);
        }
    }

    /// Remove a pending request by message id, cleaning up both indices.
    pub fn remove_pending(&mut self, message_id: &MessageId) -> Option<PendingRequest> {
        let removed = self.pending_requests.remove(message_id)?;
        if let Some(ids) = self.requests_by_session.get_mut(&removed.session_id) {
            ids.retain(|id| id != message_id);
            if ids.is_empty() {
                self.requests_by_session.remove(&removed.session_id);
            }
        }
        Some(removed)
    }

    pub fn lookup_pending(&self, message_id: &MessageId) -> Option<&PendingRequest> {
        self.pending_requests.get(message_id)
    }

    /// Find an existing pending permission request for the same
    /// (session, tool, command) triple — used to collapse hook retries
    /// into a single prompt (invariant 2).
    pub fn find_pending_by_session_tool_command(
        &self,
        session_id: &HostSessionId,
        tool_name: &str,
        command_text: &str,
    ) -> Option<&PendingRequest> {
        self.requests_by_session
            .get(session_id)?
            .iter()
            .filter_map(|id| self.pending_requests.get(id))
            .find(|req| {
                req.tool_name() == Some(tool_name) && req.command_text() == Some(command_text)
            })
    }

    pub fn list_pending_by_session(&self, session_id: &HostSessionId) -> Vec<&PendingRequest> {
        self.requests_by_session
            .get(session_id)
            .map(|ids| ids.iter().filter_map(|id| self.pending_requests.get(id)).collect())
            .unwrap_or_default()
    }

    pub fn pending_count(&self) -> usize {
        self.pending_requests.len()
    }

    /// Remove every pending request for a session (used when a session is
    /// detected to have restarted or expired).
    pub fn drain_session(&mut self, session_id: &HostSessionId) -> Vec<PendingRequest> {
        let ids = self.requests_by_session.remove(session_id).unwrap_or_default();
        ids.into_iter()
            .filter_map(|id| self.pending_requests.remove(&id))
            .collect()
    }

    /// Remove every pending request (used for the startup-recovery notice).
    /// Returns the removed requests so the caller can notify the paired chat
    /// once per orphan before discarding them.
    pub fn drain_all_pending(&mut self) -> Vec<PendingRequest> {
        self.requests_by_session.clear();
        self.pending_requests.drain().map(|(_, v)| v).collect()
    }
}

#[cfg(test)]
#[path = "process_state_tests.rs"]
mod tests;
