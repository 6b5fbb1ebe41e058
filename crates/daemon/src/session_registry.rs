// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session registry (component C)'s slug/token half.
//!
//! `afk_enabled`, `session_whitelists` and the rest of [`HostSession`]'s
//! persisted attributes already live in [`afkd_storage::ProcessState`]
//! (§3.1's `ProcessState` aggregate deliberately omits project-slug and
//! short-token — they're derived, not essential, and regenerate cheaply on
//! restart). This registry holds only that derived half, in memory.
//!
//! [`HostSession`]: afkd_core::ids::HostSessionId

use std::collections::HashMap;
use std::path::Path;

use afkd_core::{project_slug, short_token, HostSessionId};

#[derive(Debug, Clone)]
pub struct SessionInfo {
    pub project_slug: String,
    pub short_token: String,
}

#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: HashMap<HostSessionId, SessionInfo>,
}

impl SessionRegistry {
    /// Register `session_id` if it hasn't been seen before, deriving a
    /// project-slug and short-token from `project_dir`. Idempotent: a
    /// session already registered returns its existing info unchanged.
    pub fn register(&mut self, session_id: HostSessionId, project_dir: &Path) -> SessionInfo {
        self.sessions
            .entry(session_id)
            .or_insert_with(|| {
                let slug = project_slug(project_dir);
                let token = short_token(&slug);
                SessionInfo {
                    project_slug: slug,
                    short_token: token,
                }
            })
            .clone()
    }

    pub fn get(&self, session_id: &HostSessionId) -> Option<&SessionInfo> {
        self.sessions.get(session_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn register_is_idempotent() {
        let mut registry = SessionRegistry::default();
        let first = registry.register(HostSessionId::new("s1"), &PathBuf::from("/work/my-app"));
        let second = registry.register(HostSessionId::new("s1"), &PathBuf::from("/work/my-app"));
        assert_eq!(first.short_token, second.short_token);
        assert!(first.short_token.starts_with("my-app-"));
    }

    #[test]
    fn distinct_sessions_get_distinct_tokens_even_with_same_project() {
        let mut registry = SessionRegistry::default();
        let a = registry.register(HostSessionId::new("s1"), &PathBuf::from("/work/app"));
        let b = registry.register(HostSessionId::new("s2"), &PathBuf::from("/work/app"));
        assert_eq!(a.project_slug, b.project_slug);
        // Vanishingly unlikely to collide; not a correctness guarantee, just signal.
        assert_ne!(a.short_token, b.short_token);
    }
}
