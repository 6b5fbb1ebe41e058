// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Resolution watcher (component I): periodically re-scans transcripts and
//! socket liveness, cancelling pending requests that were resolved outside
//! the remote chat, or whose host session has since restarted (§4.9).

use std::sync::Arc;
use std::time::Duration;

use afkd_core::{HostSessionId, MessageId, PendingKind, PendingRequest};
use tracing::info;

use crate::protocol::Response;
use crate::state::Shared;

/// Sub-agent transcripts are only consulted if touched within this window —
/// an old sibling transcript from an earlier, unrelated tool call should
/// not be mistaken for this request's resolution.
const SIBLING_MTIME_WINDOW: Duration = Duration::from_secs(10);

pub struct Watcher {
    shared: Arc<Shared>,
}

impl Watcher {
    pub fn new(shared: Arc<Shared>) -> Self {
        Self { shared }
    }

    pub async fn tick(&self) {
        let sessions: Vec<HostSessionId> = {
            let state = self.shared.state.lock();
            state.requests_by_session.keys().cloned().collect()
        };

        for session_id in sessions {
            self.scan_session(&session_id).await;
        }
    }

    async fn scan_session(&self, session_id: &HostSessionId) {
        let pendings: Vec<PendingRequest> = {
            let state = self.shared.state.lock();
            state
                .list_pending_by_session(session_id)
                .into_iter()
                .cloned()
                .collect()
        };
        if pendings.is_empty() {
            return;
        }

        if self.session_expired(session_id, &pendings[0]).await {
            self.expire_session(session_id, &pendings).await;
            return;
        }

        for pending in pendings {
            self.scan_request(pending).await;
        }
    }

    async fn session_expired(&self, session_id: &HostSessionId, first: &PendingRequest) -> bool {
        let binding = afkd_adapters::terminal_binding::read_binding(
            &self.shared.paths.sessions_by_terminal_dir,
            &first.terminal_id,
        );
        match binding {
            Some(bound_session) => &bound_session != session_id,
            None => true,
        }
    }

    async fn expire_session(&self, session_id: &HostSessionId, pendings: &[PendingRequest]) {
        info!(session = %session_id, count = pendings.len(), "session expired; clearing pending requests");
        if let Some(chat_id) = self.shared.paired_chat_id() {
            let _ = self.shared.chat.send_message(chat_id, "Session ended.").await;
            for pending in pendings {
                let message_id: i64 = pending.message_id.as_str().parse().unwrap_or_default();
                let _ = self.shared.chat.delete_message(chat_id, message_id).await;
            }
        }
        self.shared.state.lock().drain_session(session_id);
        self.shared.persist();
        for pending in pendings {
            self.close_parked(&pending.message_id, &pending.correlation_id, "session_expired");
        }
    }

    async fn scan_request(&self, pending: PendingRequest) {
        if self.shared.parked.lock().is_closed(&pending.message_id) {
            self.resolve_locally(pending, "connection_closed".to_string()).await;
            return;
        }

        match pending.kind.clone() {
            PendingKind::Permission { tool_use_id, .. } => {
                self.scan_permission(pending, tool_use_id).await;
            }
            PendingKind::Stop => {
                self.scan_stop(pending).await;
            }
        }
    }

    async fn scan_permission(&self, pending: PendingRequest, tool_use_id: String) {
        let result = afkd_adapters::transcript::find_tool_result(
            &pending.transcript_path,
            &tool_use_id,
            pending.last_scanned_offset,
        );
        if let Some(result) = &result {
            if result.found {
                let resolution = if result.is_error { "denied" } else { "approved" };
                self.resolve_locally(pending, resolution.to_string()).await;
                return;
            }
        }

        for sibling in afkd_adapters::transcript::sibling_agent_transcripts(&pending.transcript_path) {
            if !afkd_adapters::transcript::mtime_within(&sibling, SIBLING_MTIME_WINDOW) {
                continue;
            }
            if let Some(sibling_result) = afkd_adapters::transcript::find_tool_result(&sibling, &tool_use_id, 0) {
                if sibling_result.found {
                    let resolution = if sibling_result.is_error { "denied" } else { "approved" };
                    self.resolve_locally(pending, resolution.to_string()).await;
                    return;
                }
            }
        }

        if let Some(result) = result {
            self.advance_offset(&pending.message_id, result.offset_after);
        }
    }

    async fn scan_stop(&self, pending: PendingRequest) {
        match afkd_adapters::transcript::find_user_text(&pending.transcript_path, pending.last_scanned_offset) {
            Some((_, offset_after)) => {
                self.resolve_locally(pending, "local_followup".to_string()).await;
                let _ = offset_after;
            }
            None => {
                let offset_after = afkd_adapters::transcript::line_count(&pending.transcript_path);
                self.advance_offset(&pending.message_id, offset_after);
            }
        }
    }

    fn advance_offset(&self, message_id: &MessageId, offset_after: u64) {
        let mut state = self.shared.state.lock();
        if let Some(pending) = state.pending_requests.get_mut(message_id) {
            pending.last_scanned_offset = offset_after;
        }
        drop(state);
        self.shared.persist();
    }

    /// §4.9 "Local-resolution cleanup": reply `resolved_locally` if the
    /// channel is still alive, delete the remote message, drop from the
    /// store, persist.
    async fn resolve_locally(&self, pending: PendingRequest, resolution: String) {
        self.shared.state.lock().remove_pending(&pending.message_id);
        self.shared.persist();

        if let Some(chat_id) = self.shared.paired_chat_id() {
            let message_id: i64 = pending.message_id.as_str().parse().unwrap_or_default();
            let _ = self.shared.chat.delete_message(chat_id, message_id).await;
        }

        self.close_parked(&pending.message_id, &pending.correlation_id, &resolution);
    }

    fn close_parked(&self, message_id: &MessageId, correlation_id: &str, resolution: &str) {
        if let Some(parked) = self.shared.parked.lock().take(message_id) {
            let response = Response::resolved_locally(correlation_id, resolution);
            let _ = parked.resolve(response);
        }
    }
}
