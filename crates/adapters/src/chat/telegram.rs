// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Telegram-shaped implementation of [`ChatAdapter`] over `reqwest`.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use super::{ChatAdapter, ChatError, ChatMessage};

const BASE_BACKOFF: Duration = Duration::from_secs(1);
const MAX_BACKOFF: Duration = Duration::from_secs(30);
const MAX_NETWORK_RETRIES: u32 = 5;
const LONG_POLL_TIMEOUT_SECS: u64 = 30;

pub struct TelegramChatAdapter {
    client: reqwest::Client,
    base_url: Option<String>,
}

impl TelegramChatAdapter {
    /// Build an adapter, reading the bot token from `token_env_var`. An
    /// absent token is not an error — `is_configured()` reports it and
    /// every operation short-circuits with [`ChatError::NotConfigured`].
    pub fn from_env(token_env_var: &str) -> Self {
        let base_url = std::env::var(token_env_var)
            .ok()
            .filter(|t| !t.is_empty())
            .map(|token| format!("https://api.telegram.org/bot{token}"));
        Self {
            client: reqwest::Client::new(),
            base_url,
        }
    }

    fn require_base_url(&self) -> Result<&str, ChatError> {
        self.base_url.as_deref().ok_or(ChatError::NotConfigured)
    }

    async fn post_with_retry(
        &self,
        method: &str,
        body: serde_json::Value,
    ) -> Result<TelegramResponse, ChatError> {
        let base_url = self.require_base_url()?;
        let url = format!("{base_url}/{method}");

        let mut attempt = 0u32;
        loop {
            let result = self.client.post(&url).json(&body).send().await;
            match result {
                Ok(resp) => {
                    let parsed: TelegramResponse = resp
                        .json()
                        .await
                        .map_err(|e| ChatError::Network(e.to_string()))?;
                    if parsed.ok {
                        return Ok(parsed);
                    }
                    let description = parsed.description.clone().unwrap_or_default();
                    if description.contains("terminated by other getUpdates request") {
                        return Err(ChatError::Conflict);
                    }
                    return Err(ChatError::Api(description));
                }
                Err(err) => {
                    if attempt >= MAX_NETWORK_RETRIES {
                        return Err(ChatError::Network(err.to_string()));
                    }
                    let wait = std::cmp::min(BASE_BACKOFF * 2u32.saturating_pow(attempt), MAX_BACKOFF);
                    tracing::warn!(attempt, error = %err, wait_secs = wait.as_secs(), "chat adapter network error, retrying");
                    tokio::time::sleep(wait).await;
                    attempt += 1;
                }
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct TelegramResponse {
    ok: bool,
    description: Option<String>,
    #[serde(default)]
    result: serde_json::Value,
}

#[async_trait]
impl ChatAdapter for TelegramChatAdapter {
    fn is_configured(&self) -> bool {
        self.base_url.is_some()
    }

    async fn send_message(&self, chat_id: i64, text: &str) -> Result<i64, ChatError> {
        let resp = self
            .post_with_retry("sendMessage", json!({ "chat_id": chat_id, "text": text }))
            .await?;
        resp.result
            .get("message_id")
            .and_then(|v| v.as_i64())
            .ok_or_else(|| ChatError::Api("sendMessage response missing message_id".into()))
    }

    async fn delete_message(&self, chat_id: i64, message_id: i64) -> Result<(), ChatError> {
        let base_url = self.require_base_url()?;
        let url = format!("{base_url}/deleteMessage");
        // The service refuses deletes past its own retention window; any
        // failure here is swallowed rather than surfaced.
        let _ = self
            .client
            .post(&url)
            .json(&json!({ "chat_id": chat_id, "message_id": message_id }))
            .send()
            .await;
        Ok(())
    }

    async fn fetch_updates(&self, offset: i64) -> Result<(Vec<ChatMessage>, i64), ChatError> {
        let resp = self
            .post_with_retry(
                "getUpdates",
                json!({
                    "offset": offset,
                    "timeout": LONG_POLL_TIMEOUT_SECS,
                    "allowed_updates": ["message"],
                }),
            )
            .await?;

        let mut next_offset = offset;
        let mut messages = Vec::new();
        let Some(updates) = resp.result.as_array() else {
            return Ok((messages, next_offset));
        };

        for update in updates {
            if let Some(update_id) = update.get("update_id").and_then(|v| v.as_i64()) {
                next_offset = next_offset.max(update_id + 1);
            }
            let Some(message) = update.get("message") else {
                continue;
            };
            let Some(chat_id) = message.get("chat").and_then(|c| c.get("id")).and_then(|v| v.as_i64())
            else {
                continue;
            };
            let Some(message_id) = message.get("message_id").and_then(|v| v.as_i64()) else {
                continue;
            };
            let date = message.get("date").and_then(|v| v.as_i64()).unwrap_or(0);
            let text = message.get("text").and_then(|v| v.as_str()).map(String::from);
            let reply_to_message_id = message
                .get("reply_to_message")
                .and_then(|r| r.get("message_id"))
                .and_then(|v| v.as_i64());
            messages.push(ChatMessage {
                chat_id,
                message_id,
                date,
                text,
                reply_to_message_id,
            });
        }

        Ok((messages, next_offset))
    }
}
