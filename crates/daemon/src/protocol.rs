// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Local IPC wire protocol (component B's payload format, §6.1).
//!
//! Framing is one JSON object per line in both directions. Requests are a
//! tagged enum on `type`; responses are a single flat struct (`status` plus
//! whichever optional fields that status carries) rather than a tagged enum,
//! because the wire shape really is "one object, a status string, and some
//! optional fields" — mirroring it as a sum type would just move the same
//! optionality into enum variants without buying anything.

use std::collections::HashMap;
use std::path::PathBuf;

use afkd_core::{HostSessionId, TerminalId};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Request {
    PermissionRequest {
        request_id: String,
        session_id: HostSessionId,
        terminal_id: TerminalId,
        tool_name: String,
        message: String,
        transcript_path: PathBuf,
        cwd: PathBuf,
    },
    StopRequest {
        request_id: String,
        session_id: HostSessionId,
        terminal_id: TerminalId,
        transcript_path: PathBuf,
        cwd: PathBuf,
    },
    EnableAfk {
        request_id: String,
        session_id: HostSessionId,
    },
    DisableAfk {
        request_id: String,
        session_id: HostSessionId,
    },
    Status {
        request_id: String,
        session_id: HostSessionId,
    },
}

impl Request {
    pub fn request_id(&self) -> &str {
        match self {
            Request::PermissionRequest { request_id, .. }
            | Request::StopRequest { request_id, .. }
            | Request::EnableAfk { request_id, .. }
            | Request::DisableAfk { request_id, .. }
            | Request::Status { request_id, .. } => request_id,
        }
    }

    /// Requests that suspend the connection instead of replying on the same
    /// line-turn (§4.2 "Connection lifetime").
    pub fn is_blocking(&self) -> bool {
        matches!(self, Request::PermissionRequest { .. } | Request::StopRequest { .. })
    }
}

/// A single reply frame. `status` is the wire-level discriminant from
/// §6.1's table; optional fields are populated per status and otherwise
/// omitted from the serialized object.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Response {
    #[serde(rename = "type")]
    pub kind: ResponseKind,
    pub request_id: String,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bulk_approved: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolution: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub daemon_running: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub telegram_configured: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chat_id_configured: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub afk_sessions: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pending_requests: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub always_enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bulk_approval_tools: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_whitelists: Option<HashMap<String, Vec<String>>>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ResponseKind {
    #[default]
    Response,
}

impl Response {
    fn base(request_id: impl Into<String>, status: impl Into<String>) -> Self {
        Self {
            kind: ResponseKind::Response,
            request_id: request_id.into(),
            status: status.into(),
            ..Default::default()
        }
    }

    pub fn approved(request_id: impl Into<String>, bulk_approved: bool) -> Self {
        let mut resp = Self::base(request_id, "approved");
        if bulk_approved {
            resp.bulk_approved = Some(true);
        }
        resp
    }

    pub fn denied(request_id: impl Into<String>, message: impl Into<String>) -> Self {
        let mut resp = Self::base(request_id, "denied");
        resp.message = Some(message.into());
        resp
    }

    pub fn not_enabled(request_id: impl Into<String>) -> Self {
        Self::base(request_id, "not_enabled")
    }

    pub fn not_configured(request_id: impl Into<String>) -> Self {
        Self::base(request_id, "not_configured")
    }

    pub fn timeout_retry(request_id: impl Into<String>) -> Self {
        Self::base(request_id, "timeout_retry")
    }

    pub fn timeout_final(request_id: impl Into<String>) -> Self {
        Self::base(request_id, "timeout_final")
    }

    pub fn resolved_locally(request_id: impl Into<String>, resolution: impl Into<String>) -> Self {
        let mut resp = Self::base(request_id, "resolved_locally");
        resp.resolution = Some(resolution.into());
        resp
    }

    pub fn error(request_id: impl Into<String>, message: impl Into<String>) -> Self {
        let mut resp = Self::base(request_id, "error");
        resp.message = Some(message.into());
        resp
    }

    pub fn r#continue(request_id: impl Into<String>, instructions: impl Into<String>) -> Self {
        let mut resp = Self::base(request_id, "continue");
        resp.instructions = Some(instructions.into());
        resp
    }

    pub fn stop(request_id: impl Into<String>) -> Self {
        Self::base(request_id, "stop")
    }

    pub fn enabled(request_id: impl Into<String>) -> Self {
        Self::base(request_id, "enabled")
    }

    pub fn disabled(request_id: impl Into<String>) -> Self {
        Self::base(request_id, "disabled")
    }

    #[allow(clippy::too_many_arguments)]
    pub fn status_response(
        request_id: impl Into<String>,
        daemon_running: bool,
        telegram_configured: bool,
        chat_id_configured: bool,
        afk_sessions: Vec<String>,
        pending_requests: usize,
        always_enabled: bool,
        bulk_approval_tools: Vec<String>,
        session_whitelists: HashMap<String, Vec<String>>,
    ) -> Self {
        let mut resp = Self::base(request_id, "status_response");
        resp.daemon_running = Some(daemon_running);
        resp.telegram_configured = Some(telegram_configured);
        resp.chat_id_configured = Some(chat_id_configured);
        resp.afk_sessions = Some(afk_sessions);
        resp.pending_requests = Some(pending_requests);
        resp.always_enabled = Some(always_enabled);
        resp.bulk_approval_tools = Some(bulk_approval_tools);
        resp.session_whitelists = Some(session_whitelists);
        resp
    }
}
