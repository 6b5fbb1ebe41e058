// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Reply dispatcher (component H): polls the remote chat for updates and
//! wakes the one blocked hook each reply targets (§4.10-4.11).

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use afkd_adapters::{ChatError, ChatMessage};
use afkd_core::{HostSessionId, MessageId, PendingKind};
use tracing::{info, warn};

use crate::protocol::Response;
use crate::state::Shared;

/// After this many consecutive `getUpdates` conflicts, another daemon
/// clearly holds the long-poll slot — cede it and shut down (§4.5).
const CONSECUTIVE_CONFLICT_LIMIT: u32 = 3;

pub struct Dispatcher {
    shared: Arc<Shared>,
    offset: i64,
    consecutive_conflicts: u32,
}

/// Returned to the caller's event loop so it can act on a conflict
/// shutdown without the dispatcher owning process-exit concerns itself.
pub enum TickOutcome {
    Continued,
    ShouldShutDown,
}

impl Dispatcher {
    pub fn new(shared: Arc<Shared>) -> Self {
        Self {
            shared,
            offset: 0,
            consecutive_conflicts: 0,
        }
    }

    pub async fn tick(&mut self) -> TickOutcome {
        let (messages, next_offset) = match self.shared.chat.fetch_updates(self.offset).await {
            Ok(v) => {
                self.consecutive_conflicts = 0;
                v
            }
            Err(ChatError::Conflict) => {
                self.consecutive_conflicts += 1;
                warn!(count = self.consecutive_conflicts, "getUpdates conflict with another daemon");
                if self.consecutive_conflicts >= CONSECUTIVE_CONFLICT_LIMIT {
                    if let Some(chat_id) = self.shared.paired_chat_id() {
                        let _ = self
                            .shared
                            .chat
                            .send_message(chat_id, "Another instance took over updates; shutting down.")
                            .await;
                    }
                    return TickOutcome::ShouldShutDown;
                }
                return TickOutcome::Continued;
            }
            Err(err) => {
                warn!(error = %err, "failed to fetch chat updates");
                return TickOutcome::Continued;
            }
        };
        self.offset = next_offset;

        for message in messages {
            self.process_message(message).await;
        }
        TickOutcome::Continued
    }

    async fn process_message(&mut self, message: ChatMessage) {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or(message.date);
        if now - message.date > self.shared.options.stale_update_threshold as i64 {
            info!(date = message.date, "dropping stale chat update");
            return;
        }

        let Some(text) = message.text.as_deref() else {
            return;
        };

        if text.trim() == "/start" {
            self.handle_pairing(message.chat_id).await;
            return;
        }

        if self.shared.paired_chat_id() != Some(message.chat_id) {
            return;
        }

        if let Some(reply_to) = message.reply_to_message_id {
            let message_id = MessageId::new(reply_to.to_string());
            let had_pending = self.shared.state.lock().lookup_pending(&message_id).is_some();
            if had_pending {
                self.apply_verdict(message.chat_id, message_id, text, message.message_id).await;
            } else {
                self.report_already_handled(message.chat_id, reply_to, message.message_id).await;
            }
            return;
        }

        if self.shared.options.allow_single_pending_fallback {
            let only = {
                let state = self.shared.state.lock();
                let mut ids = state.pending_requests.keys();
                match (ids.next(), ids.next()) {
                    (Some(id), None) => Some(id.clone()),
                    _ => None,
                }
            };
            if let Some(message_id) = only {
                self.apply_verdict_fallback(message.chat_id, message_id, text, message.message_id).await;
                return;
            }
        }

        let pending_exists = !self.shared.state.lock().pending_requests.is_empty();
        if pending_exists {
            let _ = self
                .shared
                .chat
                .send_message(message.chat_id, "Please reply directly to a notification message.")
                .await;
        }
    }

    async fn handle_pairing(&self, chat_id: i64) {
        if self.shared.paired_chat_id().is_some() {
            return;
        }
        {
            let mut state = self.shared.state.lock();
            state.paired_chat_id = Some(chat_id);
        }
        self.shared.persist();
        let _ = self
            .shared
            .chat
            .send_message(chat_id, "Paired. You'll receive permission and stop prompts here.")
            .await;
    }

    /// Apply §4.11's verdict logic for the reply-targeted route. `message_id`
    /// was present in the pending store when the caller checked; it may
    /// since have been purged by a concurrent local resolution.
    async fn apply_verdict(&mut self, chat_id: i64, message_id: MessageId, reply_text: &str, inbound_message_id: i64) {
        self.apply_verdict_inner(chat_id, message_id, reply_text, false, inbound_message_id).await;
    }

    /// Apply §4.11's verdict logic for the single-pending fallback route
    /// (§4.10): identical except a dead parked channel gets a distinct
    /// courtesy message instead of the generic transcript-checked one.
    async fn apply_verdict_fallback(
        &mut self,
        chat_id: i64,
        message_id: MessageId,
        reply_text: &str,
        inbound_message_id: i64,
    ) {
        self.apply_verdict_inner(chat_id, message_id, reply_text, true, inbound_message_id).await;
    }

    async fn apply_verdict_inner(
        &mut self,
        chat_id: i64,
        message_id: MessageId,
        reply_text: &str,
        is_fallback: bool,
        inbound_message_id: i64,
    ) {
        let pending = {
            let state = self.shared.state.lock();
            state.lookup_pending(&message_id).cloned()
        };
        let Some(pending) = pending else {
            // The race this handles: `process_message`'s own lookup already
            // passed, but the resolution watcher's `resolve_locally` purged
            // the entry before we got here.
            if let Ok(outbound_id) = message_id.as_str().parse::<i64>() {
                self.report_already_handled(chat_id, outbound_id, inbound_message_id).await;
            }
            return;
        };

        let session_id = pending.session_id.clone();
        let kind = pending.kind.clone();
        match kind {
            PendingKind::Permission { tool_name, .. } => {
                self.apply_permission_verdict(chat_id, message_id, tool_name, reply_text, session_id, pending, is_fallback)
                    .await;
            }
            PendingKind::Stop => {
                self.apply_stop_verdict(chat_id, message_id, reply_text, pending, is_fallback).await;
            }
        }
    }

    /// Best-effort delete of both halves of an already-resolved exchange —
    /// the outbound prompt and the stale inbound reply to it — then a
    /// courtesy note in the wording §8 scenario 5 expects for this case
    /// (indistinguishable, once the watcher has purged the pending entry,
    /// from a message-id that was never one of ours).
    async fn report_already_handled(&self, chat_id: i64, outbound_message_id: i64, inbound_message_id: i64) {
        let _ = self.shared.chat.delete_message(chat_id, outbound_message_id).await;
        if inbound_message_id != outbound_message_id {
            let _ = self.shared.chat.delete_message(chat_id, inbound_message_id).await;
        }
        let _ = self.shared.chat.send_message(chat_id, "Already handled locally.").await;
    }

    #[allow(clippy::too_many_arguments)]
    async fn apply_permission_verdict(
        &mut self,
        chat_id: i64,
        message_id: MessageId,
        tool_name: String,
        reply_text: &str,
        session_id: HostSessionId,
        pending: afkd_core::PendingRequest,
        is_fallback: bool,
    ) {
        let normalized = reply_text.trim().to_ascii_lowercase();
        let bulk_allowed = self.shared.options.bulk_approval_tools.iter().any(|t| t == &tool_name);

        let approved = matches!(normalized.as_str(), "yes" | "y");
        let denied = matches!(normalized.as_str(), "no" | "n");
        let all = bulk_allowed && matches!(normalized.as_str(), "all" | "yes all" | "y all" | "always");

        if !approved && !denied && !all {
            let _ = self
                .shared
                .chat
                .send_message(chat_id, "Reply 'yes', 'no', or 'all'.")
                .await;
            return;
        }

        self.shared.state.lock().remove_pending(&message_id);
        if all {
            self.shared.state.lock().whitelist(session_id, tool_name.clone());
            let _ = self
                .shared
                .chat
                .send_message(chat_id, &format!("{tool_name} will be auto-approved for this session."))
                .await;
        }
        self.shared.persist();

        let response = if denied {
            Response::denied(String::new(), "User denied")
        } else {
            Response::approved(String::new(), all)
        };

        self.deliver_or_recover(chat_id, message_id, response, &pending, is_fallback).await;
    }

    async fn apply_stop_verdict(
        &mut self,
        chat_id: i64,
        message_id: MessageId,
        reply_text: &str,
        pending: afkd_core::PendingRequest,
        is_fallback: bool,
    ) {
        let instructions = afkd_core::prompt::truncate_instructions(reply_text);
        self.shared.state.lock().remove_pending(&message_id);
        self.shared.persist();

        let response = Response::r#continue(String::new(), instructions);
        self.deliver_or_recover(chat_id, message_id, response, &pending, is_fallback).await;
    }

    /// Deliver `response` on the parked reply; on failure, recover per
    /// §4.11. The single-pending-fallback route (§4.10) reports a distinct
    /// courtesy message on a dead channel instead of consulting the
    /// transcript — the reply-targeted route's recovery path.
    async fn deliver_or_recover(
        &mut self,
        chat_id: i64,
        message_id: MessageId,
        mut response: Response,
        pending: &afkd_core::PendingRequest,
        is_fallback: bool,
    ) {
        response.request_id = pending.correlation_id.clone();
        let parked = self.shared.parked.lock().take(&message_id);
        let delivered = match parked {
            Some(parked) => parked.resolve(response).is_ok(),
            None => false,
        };
        if delivered {
            return;
        }

        if is_fallback {
            if let Ok(raw_id) = message_id.as_str().parse::<i64>() {
                let _ = self.shared.chat.delete_message(chat_id, raw_id).await;
            }
            let _ = self
                .shared
                .chat
                .send_message(chat_id, "Response recorded, session no longer active.")
                .await;
            return;
        }

        let already_resolved = match &pending.kind {
            PendingKind::Permission { tool_use_id, .. } => {
                afkd_adapters::transcript::find_tool_result(&pending.transcript_path, tool_use_id, 0)
                    .is_some_and(|r| r.found)
            }
            PendingKind::Stop => afkd_adapters::transcript::find_user_text(&pending.transcript_path, 0).is_some(),
        };

        let text = if already_resolved {
            "Already handled locally."
        } else {
            "Unable to deliver response — session may have ended."
        };
        let _ = self.shared.chat.send_message(chat_id, text).await;
    }
}
