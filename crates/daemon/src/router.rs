// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Request router (component G): handles every inbound hook request type.
//! Permission and stop requests park their caller instead of replying
//! immediately (§4.2 "Connection lifetime") — see [`RouterOutcome`].

use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use afkd_core::{
    prompt, tool_format, HostSessionId, MessageId, PendingKind, PendingRequest, TerminalId,
};
use chrono::Utc;
use tokio::sync::oneshot;
use tracing::{info, warn};

use crate::protocol::Response;
use crate::state::Shared;

const CONTEXT_MAX_LEN: usize = 500;

/// What the listener should do after calling into the router.
pub enum RouterOutcome {
    /// Reply on the same line-turn.
    Immediate(Response),
    /// The caller has been parked; await `rx` for the eventual verdict and
    /// set `closed` if the connection's read half observes EOF first. The
    /// listener also arms a per-request timeout keyed on `message_id` (§4.7
    /// step 10 / §4.8 step 4) racing alongside `rx`.
    Parked {
        rx: oneshot::Receiver<Response>,
        closed: Arc<AtomicBool>,
        message_id: MessageId,
    },
}

/// Claim ownership of `message_id`'s parked reply (if no other resolution
/// path has already taken it), remove it from the pending store, delete the
/// remote message, and hand back a `timeout_retry` for the listener to send
/// on the still-open connection. Returns `None` if another path won the race.
pub async fn handle_timeout(shared: &Shared, message_id: &MessageId, request_id: &str) -> Option<Response> {
    let parked = shared.parked.lock().take(message_id)?;
    drop(parked);

    shared.state.lock().remove_pending(message_id);
    shared.persist();

    if let Some(chat_id) = shared.paired_chat_id() {
        if let Ok(raw_id) = message_id.as_str().parse::<i64>() {
            let _ = shared.chat.delete_message(chat_id, raw_id).await;
        }
    }

    info!(request_id, "per-request timeout fired");
    Some(Response::timeout_retry(request_id.to_string()))
}

#[allow(clippy::too_many_arguments)]
pub async fn handle_permission_request(
    shared: &Shared,
    request_id: String,
    session_id: HostSessionId,
    terminal_id: TerminalId,
    tool_name: String,
    command_text: String,
    transcript_path: PathBuf,
    cwd: PathBuf,
) -> RouterOutcome {
    let afk_on = {
        let state = shared.state.lock();
        state.is_afk_enabled(&session_id) || shared.options.always_enabled
    };
    if !afk_on {
        return RouterOutcome::Immediate(Response::not_enabled(request_id));
    }

    if !shared.chat_ready() {
        return RouterOutcome::Immediate(Response::not_configured(request_id));
    }

    let whitelisted = shared.state.lock().is_whitelisted(&session_id, &tool_name);
    if whitelisted {
        return RouterOutcome::Immediate(Response::approved(request_id, true));
    }

    let retry_count = {
        let mut state = shared.state.lock();
        let existing = state
            .find_pending_by_session_tool_command(&session_id, &tool_name, &command_text)
            .cloned();
        match existing {
            Some(mut pending) => {
                pending.retry_count += 1;
                if pending.retry_count >= shared.options.max_retries {
                    state.remove_pending(&pending.message_id);
                    drop(state);
                    shared.persist();
                    let chat_id = shared.paired_chat_id();
                    if let Some(chat_id) = chat_id {
                        let message_id: i64 = pending.message_id.as_str().parse().unwrap_or_default();
                        let _ = shared.chat.delete_message(chat_id, message_id).await;
                    }
                    return RouterOutcome::Immediate(Response::timeout_final(request_id));
                }
                // Below the retry ceiling: the old record is superseded by the
                // fresh prompt composed below (same triple, new message-id), so
                // drop it from the store now rather than leave two entries
                // under the same (session, tool, command) triple (invariant 2).
                // Its parked reply channel is left untouched in `shared.parked`
                // — the earlier caller's own per-connection timeout will fire
                // independently and clean that up (§8 scenario 4).
                let retry_count = pending.retry_count;
                state.remove_pending(&pending.message_id);
                retry_count
            }
            None => 0,
        }
    };

    let context_line = afkd_adapters::transcript::last_assistant_text(&transcript_path, CONTEXT_MAX_LEN)
        .or_else(|| {
            afkd_adapters::transcript::last_user_text(&transcript_path, CONTEXT_MAX_LEN)
                .map(|text| format!("User: {text}"))
        })
        .unwrap_or_default();

    let (tool_use_id, formatted_command) =
        match afkd_adapters::transcript::last_tool_use(&transcript_path) {
            Some(tool_use) => (tool_use.id, tool_format::format_tool_input(&tool_use.name, &tool_use.input)),
            None => (String::new(), command_text.clone()),
        };

    let info = shared.sessions.lock().register(session_id.clone(), &cwd);
    let bulk_allowed = shared.options.bulk_approval_tools.iter().any(|t| t == &tool_name);

    let prompt_text = prompt::permission_prompt(
        &info.project_slug,
        &info.short_token,
        &context_line,
        &tool_name,
        &formatted_command,
        bulk_allowed,
    );

    let chat_id = match shared.paired_chat_id() {
        Some(id) => id,
        None => return RouterOutcome::Immediate(Response::not_configured(request_id)),
    };

    let message_id = match shared.chat.send_message(chat_id, &prompt_text).await {
        Ok(id) => id,
        Err(err) => {
            warn!(error = %err, "failed to send permission prompt");
            return RouterOutcome::Immediate(Response::error(request_id, "failed to reach remote chat"));
        }
    };
    let message_id = MessageId::new(message_id.to_string());

    let pending = PendingRequest {
        message_id: message_id.clone(),
        session_id,
        kind: PendingKind::Permission {
            tool_name,
            command_text,
            tool_use_id,
            bulk_allowed,
        },
        transcript_path,
        project_dir: cwd,
        terminal_id,
        last_scanned_offset: 0,
        first_seen_at: Utc::now(),
        correlation_id: request_id,
        retry_count,
    };

    shared.state.lock().insert_pending(pending.clone());
    shared.persist();

    let (rx, closed) = shared.parked.lock().park(message_id.clone(), pending.kind.clone());
    info!(tool = %tool_format_name(&pending), "parked permission request");
    RouterOutcome::Parked { rx, closed, message_id }
}

fn tool_format_name(pending: &PendingRequest) -> String {
    pending.tool_name().unwrap_or("").to_string()
}

pub async fn handle_stop_request(
    shared: &Shared,
    request_id: String,
    session_id: HostSessionId,
    terminal_id: TerminalId,
    transcript_path: PathBuf,
    cwd: PathBuf,
) -> RouterOutcome {
    let afk_on = {
        let state = shared.state.lock();
        state.is_afk_enabled(&session_id) || shared.options.always_enabled
    };
    if !afk_on {
        return RouterOutcome::Immediate(Response::not_enabled(request_id));
    }
    if !shared.chat_ready() {
        return RouterOutcome::Immediate(Response::not_configured(request_id));
    }

    let context_line =
        afkd_adapters::transcript::last_assistant_text(&transcript_path, CONTEXT_MAX_LEN).unwrap_or_default();

    let info = shared.sessions.lock().register(session_id.clone(), &cwd);
    let prompt_text = prompt::stop_prompt(&info.project_slug, &info.short_token, &context_line);

    let chat_id = match shared.paired_chat_id() {
        Some(id) => id,
        None => return RouterOutcome::Immediate(Response::not_configured(request_id)),
    };

    let message_id = match shared.chat.send_message(chat_id, &prompt_text).await {
        Ok(id) => id,
        Err(err) => {
            warn!(error = %err, "failed to send stop prompt");
            return RouterOutcome::Immediate(Response::error(request_id, "failed to reach remote chat"));
        }
    };
    let message_id = MessageId::new(message_id.to_string());
    let last_scanned_offset = afkd_adapters::transcript::line_count(&transcript_path);

    let pending = PendingRequest {
        message_id: message_id.clone(),
        session_id,
        kind: PendingKind::Stop,
        transcript_path,
        project_dir: cwd,
        terminal_id,
        last_scanned_offset,
        first_seen_at: Utc::now(),
        correlation_id: request_id,
        retry_count: 0,
    };

    shared.state.lock().insert_pending(pending.clone());
    shared.persist();

    let (rx, closed) = shared.parked.lock().park(message_id.clone(), pending.kind);
    RouterOutcome::Parked { rx, closed, message_id }
}

pub fn handle_enable_afk(shared: &Shared, request_id: String, session_id: HostSessionId) -> Response {
    shared.state.lock().enable_afk(session_id);
    shared.persist();
    Response::enabled(request_id)
}

pub fn handle_disable_afk(shared: &Shared, request_id: String, session_id: HostSessionId) -> Response {
    shared.state.lock().disable_afk(&session_id);
    shared.persist();
    Response::disabled(request_id)
}

pub fn handle_status(shared: &Shared, request_id: String, _session_id: HostSessionId) -> Response {
    let state = shared.state.lock();
    let afk_sessions: Vec<String> = state.afk_enabled.iter().map(|id| id.as_str().to_string()).collect();
    let session_whitelists = state
        .session_whitelists
        .iter()
        .map(|(id, tools)| (id.as_str().to_string(), tools.iter().cloned().collect()))
        .collect();

    Response::status_response(
        request_id,
        true,
        shared.chat.is_configured(),
        state.paired_chat_id.is_some(),
        afk_sessions,
        state.pending_count(),
        shared.options.always_enabled,
        shared.options.bulk_approval_tools.clone(),
        session_whitelists,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use afkd_adapters::FakeChatAdapter;
    use afkd_storage::ProcessState;

    fn shared_with(chat: FakeChatAdapter, options: afkd_core::Options, paired: bool) -> Arc<Shared> {
        let dir = tempfile::tempdir().unwrap();
        let paths = crate::paths::Paths::new(dir.path().to_path_buf());
        let mut state = ProcessState::default();
        if paired {
            state.paired_chat_id = Some(1);
        }
        Shared::new(Arc::new(chat), options, paths, state)
    }

    fn session() -> HostSessionId {
        HostSessionId::new("s1")
    }

    #[tokio::test]
    async fn permission_request_not_enabled_by_default() {
        let shared = shared_with(FakeChatAdapter::new(), afkd_core::Options::default(), true);
        let outcome = handle_permission_request(
            &shared,
            "r1".into(),
            session(),
            TerminalId::new("t1"),
            "Bash".into(),
            "echo hi".into(),
            PathBuf::from("/tmp/nonexistent.jsonl"),
            PathBuf::from("/tmp/project"),
        )
        .await;
        match outcome {
            RouterOutcome::Immediate(resp) => assert_eq!(resp.status, "not_enabled"),
            RouterOutcome::Parked { .. } => panic!("expected an immediate not_enabled response"),
        }
    }

    #[tokio::test]
    async fn permission_request_not_configured_when_chat_unready() {
        let shared = shared_with(FakeChatAdapter::not_configured(), afkd_core::Options::default(), true);
        shared.state.lock().enable_afk(session());

        let outcome = handle_permission_request(
            &shared,
            "r1".into(),
            session(),
            TerminalId::new("t1"),
            "Bash".into(),
            "echo hi".into(),
            PathBuf::from("/tmp/nonexistent.jsonl"),
            PathBuf::from("/tmp/project"),
        )
        .await;
        match outcome {
            RouterOutcome::Immediate(resp) => assert_eq!(resp.status, "not_configured"),
            RouterOutcome::Parked { .. } => panic!("expected an immediate not_configured response"),
        }
    }

    #[tokio::test]
    async fn whitelisted_tool_is_approved_immediately() {
        let shared = shared_with(FakeChatAdapter::new(), afkd_core::Options::default(), true);
        shared.state.lock().enable_afk(session());
        shared.state.lock().whitelist(session(), "Bash".into());

        let outcome = handle_permission_request(
            &shared,
            "r1".into(),
            session(),
            TerminalId::new("t1"),
            "Bash".into(),
            "echo hi".into(),
            PathBuf::from("/tmp/nonexistent.jsonl"),
            PathBuf::from("/tmp/project"),
        )
        .await;
        match outcome {
            RouterOutcome::Immediate(resp) => {
                assert_eq!(resp.status, "approved");
                assert_eq!(resp.bulk_approved, Some(true));
            }
            RouterOutcome::Parked { .. } => panic!("expected an immediate approved response"),
        }
    }

    #[tokio::test]
    async fn permission_request_parks_when_ready() {
        let shared = shared_with(FakeChatAdapter::new(), afkd_core::Options::default(), true);
        shared.state.lock().enable_afk(session());

        let outcome = handle_permission_request(
            &shared,
            "r1".into(),
            session(),
            TerminalId::new("t1"),
            "Bash".into(),
            "echo hi".into(),
            PathBuf::from("/tmp/nonexistent.jsonl"),
            PathBuf::from("/tmp/project"),
        )
        .await;
        match outcome {
            RouterOutcome::Parked { message_id, .. } => {
                assert_eq!(shared.state.lock().pending_count(), 1);
                assert!(shared.parked.lock().contains(&message_id));
            }
            RouterOutcome::Immediate(resp) => panic!("expected to park, got {resp:?}"),
        }
    }

    #[tokio::test]
    async fn retry_collapse_reaches_timeout_final() {
        let mut options = afkd_core::Options::default();
        options.max_retries = 1;
        let shared = shared_with(FakeChatAdapter::new(), options, true);
        shared.state.lock().enable_afk(session());

        let first = handle_permission_request(
            &shared,
            "r1".into(),
            session(),
            TerminalId::new("t1"),
            "Bash".into(),
            "echo hi".into(),
            PathBuf::from("/tmp/nonexistent.jsonl"),
            PathBuf::from("/tmp/project"),
        )
        .await;
        assert!(matches!(first, RouterOutcome::Parked { .. }));

        let second = handle_permission_request(
            &shared,
            "r2".into(),
            session(),
            TerminalId::new("t1"),
            "Bash".into(),
            "echo hi".into(),
            PathBuf::from("/tmp/nonexistent.jsonl"),
            PathBuf::from("/tmp/project"),
        )
        .await;
        match second {
            RouterOutcome::Immediate(resp) => assert_eq!(resp.status, "timeout_final"),
            RouterOutcome::Parked { .. } => panic!("expected the second retry to collapse into timeout_final"),
        }
        assert_eq!(shared.state.lock().pending_count(), 0);
    }

    #[tokio::test]
    async fn retry_below_ceiling_replaces_rather_than_duplicates() {
        let mut options = afkd_core::Options::default();
        options.max_retries = 5;
        let shared = shared_with(FakeChatAdapter::new(), options, true);
        shared.state.lock().enable_afk(session());

        let first = handle_permission_request(
            &shared,
            "r1".into(),
            session(),
            TerminalId::new("t1"),
            "Bash".into(),
            "echo hi".into(),
            PathBuf::from("/tmp/nonexistent.jsonl"),
            PathBuf::from("/tmp/project"),
        )
        .await;
        let first_message_id = match first {
            RouterOutcome::Parked { message_id, .. } => message_id,
            RouterOutcome::Immediate(resp) => panic!("expected to park, got {resp:?}"),
        };

        let second = handle_permission_request(
            &shared,
            "r2".into(),
            session(),
            TerminalId::new("t1"),
            "Bash".into(),
            "echo hi".into(),
            PathBuf::from("/tmp/nonexistent.jsonl"),
            PathBuf::from("/tmp/project"),
        )
        .await;
        match second {
            RouterOutcome::Parked { message_id, .. } => assert_ne!(message_id, first_message_id),
            RouterOutcome::Immediate(resp) => panic!("expected the retry to park again, got {resp:?}"),
        }

        // Invariant 2: at most one pending request per (session, tool, command).
        assert_eq!(shared.state.lock().pending_count(), 1);
        let state = shared.state.lock();
        let only = state.find_pending_by_session_tool_command(&session(), "Bash", "echo hi").unwrap();
        assert_eq!(only.retry_count, 1);
        // The superseded connection's parked channel is untouched — its own
        // per-connection timeout will resolve it independently.
        assert!(shared.parked.lock().contains(&first_message_id));
    }

    #[tokio::test]
    async fn stop_request_parks_and_records_offset() {
        let shared = shared_with(FakeChatAdapter::new(), afkd_core::Options::default(), true);
        shared.state.lock().enable_afk(session());

        let outcome = handle_stop_request(
            &shared,
            "r1".into(),
            session(),
            TerminalId::new("t1"),
            PathBuf::from("/tmp/nonexistent.jsonl"),
            PathBuf::from("/tmp/project"),
        )
        .await;
        assert!(matches!(outcome, RouterOutcome::Parked { .. }));
    }

    #[test]
    fn enable_then_status_reports_afk_session() {
        let shared = shared_with(FakeChatAdapter::new(), afkd_core::Options::default(), false);
        let resp = handle_enable_afk(&shared, "r1".into(), session());
        assert_eq!(resp.status, "enabled");

        let status = handle_status(&shared, "r2".into(), session());
        assert_eq!(status.afk_sessions.as_deref(), Some(&["s1".to_string()][..]));
    }

    #[test]
    fn disable_afk_clears_whitelist() {
        let shared = shared_with(FakeChatAdapter::new(), afkd_core::Options::default(), false);
        shared.state.lock().enable_afk(session());
        shared.state.lock().whitelist(session(), "Bash".into());

        handle_disable_afk(&shared, "r1".into(), session());

        assert!(!shared.state.lock().is_whitelisted(&session(), "Bash"));
    }
}
