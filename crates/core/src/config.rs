// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `config.json` schema and the deep-merge that layers it onto defaults.
//!
//! Nested objects (`transcript_polling`) merge key-by-key; arrays and
//! scalars are replaced wholesale. A missing or malformed file is never a
//! startup error — the caller falls back to [`Options::default`].
//!
//! `permission_timeout`/`stop_followup_timeout` are the sole, authoritative
//! per-request hook timeouts (armed in `listener::handle_blocking`) — see
//! SPEC_FULL.md §9 for why the nested `hookTimeouts` knob the distilled spec
//! also names was dropped rather than wired up as a second source of truth.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TranscriptPolling {
    pub enabled: bool,
    pub interval_ms: u64,
    pub enable_mtime_optimization: bool,
}

impl Default for TranscriptPolling {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_ms: 3_000,
            enable_mtime_optimization: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Options {
    pub always_enabled: bool,
    pub retry_interval: u64,
    pub max_retries: u32,
    pub permission_timeout: u64,
    pub stop_followup_timeout: u64,
    pub stale_update_threshold: u64,
    pub polling_interval: u64,
    pub allow_single_pending_fallback: bool,
    pub bulk_approval_tools: Vec<String>,
    pub transcript_polling: TranscriptPolling,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            always_enabled: false,
            retry_interval: 2,
            max_retries: 3,
            permission_timeout: 3_600,
            stop_followup_timeout: 3_600,
            stale_update_threshold: 300,
            polling_interval: 2,
            allow_single_pending_fallback: true,
            bulk_approval_tools: Vec::new(),
            transcript_polling: TranscriptPolling::default(),
        }
    }
}

impl Options {
    /// Load options by deep-merging a raw JSON override document onto the
    /// defaults. A malformed document is treated as absent: defaults apply
    /// in full and the parse error is returned to the caller for logging.
    pub fn load_merged(raw: &str) -> Result<Self, serde_json::Error> {
        let defaults = serde_json::to_value(Self::default())?;
        let override_value: serde_json::Value = serde_json::from_str(raw)?;
        let merged = deep_merge(defaults, override_value);
        serde_json::from_value(merged)
    }
}

/// Merge `override_value` onto `base`. Objects merge key-by-key recursively;
/// any other value (array, scalar, or a type mismatch) replaces the base
/// value outright.
fn deep_merge(base: serde_json::Value, override_value: serde_json::Value) -> serde_json::Value {
    use serde_json::Value;
    match (base, override_value) {
        (Value::Object(mut base_map), Value::Object(override_map)) => {
            for (key, value) in override_map {
                let merged = match base_map.remove(&key) {
                    Some(base_value) => deep_merge(base_value, value),
                    None => value,
                };
                base_map.insert(key, merged);
            }
            Value::Object(base_map)
        }
        (_, override_value) => override_value,
    }
}
