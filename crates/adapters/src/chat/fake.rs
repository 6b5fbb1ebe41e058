// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fake chat adapter for testing
#![cfg_attr(coverage_nightly, coverage(off))]

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use super::{ChatAdapter, ChatError, ChatMessage};

/// Recorded chat-adapter call.
#[derive(Debug, Clone)]
pub enum ChatCall {
    Send { chat_id: i64, text: String },
    Delete { chat_id: i64, message_id: i64 },
    FetchUpdates { offset: i64 },
}

struct FakeChatState {
    calls: Vec<ChatCall>,
    queued_updates: Vec<ChatMessage>,
    configured: bool,
}

/// Fake chat adapter for testing. Queue inbound messages with
/// [`FakeChatAdapter::push_update`]; they are drained on the next
/// `fetch_updates` call.
#[derive(Clone)]
pub struct FakeChatAdapter {
    inner: Arc<Mutex<FakeChatState>>,
    next_message_id: Arc<AtomicI64>,
}

impl Default for FakeChatAdapter {
    fn default() -> Self {
        Self {
            inner: Arc::new(Mutex::new(FakeChatState {
                calls: Vec::new(),
                queued_updates: Vec::new(),
                configured: true,
            })),
            next_message_id: Arc::new(AtomicI64::new(1)),
        }
    }
}

impl FakeChatAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn not_configured() -> Self {
        let adapter = Self::default();
        adapter.inner.lock().configured = false;
        adapter
    }

    pub fn calls(&self) -> Vec<ChatCall> {
        self.inner.lock().calls.clone()
    }

    pub fn push_update(&self, message: ChatMessage) {
        self.inner.lock().queued_updates.push(message);
    }
}

#[async_trait]
impl ChatAdapter for FakeChatAdapter {
    fn is_configured(&self) -> bool {
        self.inner.lock().configured
    }

    async fn send_message(&self, chat_id: i64, text: &str) -> Result<i64, ChatError> {
        if !self.is_configured() {
            return Err(ChatError::NotConfigured);
        }
        let message_id = self.next_message_id.fetch_add(1, Ordering::SeqCst);
        self.inner.lock().calls.push(ChatCall::Send {
            chat_id,
            text: text.to_string(),
        });
        Ok(message_id)
    }

    async fn delete_message(&self, chat_id: i64, message_id: i64) -> Result<(), ChatError> {
        self.inner
            .lock()
            .calls
            .push(ChatCall::Delete { chat_id, message_id });
        Ok(())
    }

    async fn fetch_updates(&self, offset: i64) -> Result<(Vec<ChatMessage>, i64), ChatError> {
        let mut state = self.inner.lock();
        state.calls.push(ChatCall::FetchUpdates { offset });
        let drained: Vec<ChatMessage> = state.queued_updates.drain(..).collect();
        let next_offset = drained
            .iter()
            .map(|m| m.message_id + 1)
            .max()
            .unwrap_or(offset);
        Ok((drained, next_offset))
    }
}

#[cfg(test)]
#[path = "fake_tests.rs"]
mod tests;
