// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Terminal-binding reader.
//!
//! `TerminalBinding` (§3.1) is written by the host's session-start hook,
//! external to this daemon. The daemon only ever reads these files, to
//! check whether the session currently occupying a terminal still matches
//! the session a pending request was issued under (component I).

use std::path::Path;

use afkd_core::{HostSessionId, TerminalId};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct BindingFile {
    #[serde(rename = "sessionId")]
    session_id: String,
}

/// Read the host-session currently bound to `terminal_id`, or `None` if
/// the file is missing or unparseable (treated as "no active binding",
/// which the Resolution Watcher interprets as session expiry).
pub fn read_binding(sessions_dir: &Path, terminal_id: &TerminalId) -> Option<HostSessionId> {
    let path = sessions_dir.join(format!("{}.json", terminal_id.as_str()));
    let contents = std::fs::read_to_string(path).ok()?;
    let binding: BindingFile = serde_json::from_str(&contents).ok()?;
    Some(HostSessionId::new(binding.session_id))
}
