// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Remote-chat adapter (component E): send/delete messages and long-poll
//! for updates, with retry, backoff, and conflict detection.

mod telegram;

pub use telegram::TelegramChatAdapter;

#[cfg(any(test, feature = "test-support"))]
mod fake;
#[cfg(any(test, feature = "test-support"))]
pub use fake::{ChatCall, FakeChatAdapter};

use async_trait::async_trait;
use thiserror::Error;

/// Errors from chat operations.
#[derive(Debug, Error)]
pub enum ChatError {
    #[error("chat adapter not configured")]
    NotConfigured,
    #[error("network error: {0}")]
    Network(String),
    #[error("remote chat rejected the request: {0}")]
    Api(String),
    /// Seen three times consecutively: another daemon holds the long-poll slot.
    #[error("conflict: terminated by other getUpdates request")]
    Conflict,
}

/// A single inbound chat message surfaced by `fetch_updates`.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatMessage {
    pub chat_id: i64,
    pub message_id: i64,
    /// Seconds since epoch, as reported by the remote chat service.
    pub date: i64,
    pub text: Option<String>,
    pub reply_to_message_id: Option<i64>,
}

/// Adapter for sending/receiving remote-chat messages.
#[async_trait]
pub trait ChatAdapter: Send + Sync + 'static {
    /// Whether a bot token was found in the process environment at startup.
    fn is_configured(&self) -> bool;

    /// Send `text` to `chat_id`, returning the remote message-id.
    async fn send_message(&self, chat_id: i64, text: &str) -> Result<i64, ChatError>;

    /// Delete a previously sent message. The remote service may refuse
    /// deletes past its own retention window; that is not an error here.
    async fn delete_message(&self, chat_id: i64, message_id: i64) -> Result<(), ChatError>;

    /// Long-poll for new messages starting after `offset`, returning the
    /// messages and the next offset to resume from.
    async fn fetch_updates(&self, offset: i64) -> Result<(Vec<ChatMessage>, i64), ChatError>;
}
