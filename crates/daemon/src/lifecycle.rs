// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon lifecycle: singleton acquisition, config/state loading, startup
//! recovery notification, and the shared context handoff to `main`.

use std::sync::Arc;

use afkd_adapters::{ChatAdapter, SingletonError, SingletonGuard, TelegramChatAdapter};
use afkd_core::Options;
use afkd_storage::ProcessState;
use thiserror::Error;
use tracing::{info, warn};

use crate::env;
use crate::paths::Paths;
use crate::state::Shared;

#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("another daemon instance is already running")]
    AlreadyRunning,
    #[error("could not determine the state directory (HOME not set and no override given)")]
    NoStateDir,
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<SingletonError> for LifecycleError {
    fn from(err: SingletonError) -> Self {
        match err {
            SingletonError::AlreadyRunning => LifecycleError::AlreadyRunning,
            SingletonError::Io(io) => LifecycleError::Io(io),
        }
    }
}

pub struct StartupResult {
    pub shared: Arc<Shared>,
    pub guard: SingletonGuard,
    pub paths: Paths,
}

/// Resolve paths, acquire the singleton lock, load config and persisted
/// state, notify the paired chat of any orphaned requests from a previous
/// run, and hand back the shared context ready for the three background
/// loops (`main` wires those up).
pub async fn startup() -> Result<StartupResult, LifecycleError> {
    let state_dir = env::state_dir().ok_or(LifecycleError::NoStateDir)?;
    let paths = Paths::new(state_dir);
    std::fs::create_dir_all(&paths.state_dir)?;
    std::fs::create_dir_all(&paths.logs_dir)?;

    let guard = afkd_adapters::singleton::acquire(&paths.lock_path)?;

    let options = load_options(&paths);
    let chat: Arc<dyn ChatAdapter> = Arc::new(TelegramChatAdapter::from_env(afkd_adapters::env::TELEGRAM_TOKEN_VAR));

    let initial_state = load_state(&paths);
    let shared = Shared::new(chat, options, paths.clone(), initial_state);

    notify_and_clear_orphans(&shared).await;

    Ok(StartupResult { shared, guard, paths })
}

fn load_options(paths: &Paths) -> Options {
    match std::fs::read_to_string(&paths.config_path) {
        Ok(raw) => match Options::load_merged(&raw) {
            Ok(options) => options,
            Err(err) => {
                warn!(error = %err, path = %paths.config_path.display(), "malformed config.json, using defaults");
                Options::default()
            }
        },
        Err(_) => Options::default(),
    }
}

fn load_state(paths: &Paths) -> ProcessState {
    match afkd_storage::load(&paths.state_path) {
        Ok(Some(state)) => state,
        Ok(None) => ProcessState::default(),
        Err(err) => {
            warn!(error = %err, "failed to load process state, starting fresh");
            ProcessState::default()
        }
    }
}

/// §4.12 startup recovery: any pending request surviving from a previous
/// run refers to a hook process that is long gone. Notify once per orphan,
/// then clear both indices (paired-chat-id is left untouched).
async fn notify_and_clear_orphans(shared: &Arc<Shared>) {
    let orphans = shared.state.lock().drain_all_pending();
    if orphans.is_empty() {
        return;
    }
    info!(count = orphans.len(), "clearing orphaned pending requests from previous run");

    shared.persist();

    let Some(chat_id) = shared.paired_chat_id() else {
        return;
    };
    if !shared.chat.is_configured() {
        return;
    }

    for orphan in orphans {
        let description = orphan
            .tool_name()
            .zip(orphan.command_text())
            .map(|(tool, command)| format!("{tool}: {command}"))
            .unwrap_or_else(|| "stop request".to_string());
        let text =
            format!("daemon restarted; previous request expired: {description}; please re-run if still needed.");
        let _ = shared.chat.send_message(chat_id, &text).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn orphans_are_cleared_even_without_a_paired_chat() {
        use afkd_core::{HostSessionId, MessageId, PendingKind, PendingRequest, TerminalId};
        use chrono::Utc;
        use std::path::PathBuf;

        let chat: Arc<dyn ChatAdapter> = Arc::new(afkd_adapters::FakeChatAdapter::new());
        let mut state = ProcessState::default();
        state.insert_pending(PendingRequest {
            message_id: MessageId::new("1"),
            session_id: HostSessionId::new("s1"),
            kind: PendingKind::Stop,
            transcript_path: PathBuf::from("/tmp/t.jsonl"),
            project_dir: PathBuf::from("/tmp/p"),
            terminal_id: TerminalId::new("t1"),
            last_scanned_offset: 0,
            first_seen_at: Utc::now(),
            correlation_id: "c1".into(),
            retry_count: 0,
        });

        let dir = tempfile::tempdir().unwrap();
        let paths = Paths::new(dir.path().to_path_buf());
        let shared = Shared::new(chat, Options::default(), paths, state);

        notify_and_clear_orphans(&shared).await;

        assert_eq!(shared.state.lock().pending_count(), 0);
    }
}
