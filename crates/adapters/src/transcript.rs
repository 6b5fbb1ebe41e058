// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Transcript probe (component F): incremental reads over the host's
//! append-only JSONL transcript.
//!
//! The transcript format belongs to the host, not this daemon — every
//! operation here returns `None`/empty/`0` on any read or parse error
//! rather than propagating it. Malformed lines are skipped, not fatal.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use serde_json::Value;

/// A tool invocation recorded in an assistant transcript entry.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolUse {
    pub id: String,
    pub name: String,
    pub input: Value,
}

/// The outcome of scanning forward for a tool-result line.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolResult {
    pub found: bool,
    pub is_error: bool,
    pub offset_after: u64,
}

fn read_lines(path: &Path) -> Option<Vec<Value>> {
    let contents = fs::read_to_string(path).ok()?;
    Some(
        contents
            .lines()
            .filter(|line| !line.trim().is_empty())
            .filter_map(|line| serde_json::from_str::<Value>(line).ok())
            .collect(),
    )
}

fn entry_text(entry: &Value, role: &str) -> Option<String> {
    if entry.get("type").and_then(|v| v.as_str()) != Some(role) {
        return None;
    }
    let content = entry.get("message").and_then(|m| m.get("content"))?;
    match content {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Array(blocks) => {
            let text: String = blocks
                .iter()
                .filter_map(|b| b.get("text").and_then(|t| t.as_str()))
                .collect::<Vec<_>>()
                .join("");
            if text.trim().is_empty() { None } else { Some(text) }
        }
        _ => None,
    }
}

fn truncate_with_ellipsis(text: &str, max_length: usize) -> String {
    if text.chars().count() <= max_length {
        text.to_string()
    } else {
        let truncated: String = text.chars().take(max_length).collect();
        format!("{truncated}...")
    }
}

/// Scans backward for the most recent assistant entry with non-empty text.
pub fn last_assistant_text(path: &Path, max_length: usize) -> Option<String> {
    let lines = read_lines(path)?;
    lines
        .iter()
        .rev()
        .find_map(|entry| entry_text(entry, "assistant"))
        .map(|text| truncate_with_ellipsis(&text, max_length))
}

/// Symmetric fallback over user entries.
pub fn last_user_text(path: &Path, max_length: usize) -> Option<String> {
    let lines = read_lines(path)?;
    lines
        .iter()
        .rev()
        .find_map(|entry| entry_text(entry, "user"))
        .map(|text| truncate_with_ellipsis(&text, max_length))
}

/// Scans backward for the last tool-use block.
pub fn last_tool_use(path: &Path) -> Option<ToolUse> {
    let lines = read_lines(path)?;
    lines.iter().rev().find_map(|entry| {
        if entry.get("type").and_then(|v| v.as_str()) != Some("assistant") {
            return None;
        }
        let content = entry.get("message")?.get("content")?.as_array()?;
        content.iter().rev().find_map(|block| {
            if block.get("type").and_then(|v| v.as_str()) != Some("tool_use") {
                return None;
            }
            Some(ToolUse {
                id: block.get("id")?.as_str()?.to_string(),
                name: block.get("name")?.as_str()?.to_string(),
                input: block.get("input").cloned().unwrap_or(Value::Null),
            })
        })
    })
}

/// Scans forward from `after_offset` for a tool-result block matching
/// `tool_use_id`.
pub fn find_tool_result(path: &Path, tool_use_id: &str, after_offset: u64) -> Option<ToolResult> {
    let lines = read_lines(path)?;
    let start = after_offset as usize;
    for (i, entry) in lines.iter().enumerate().skip(start) {
        if entry.get("type").and_then(|v| v.as_str()) != Some("user") {
            continue;
        }
        let Some(content) = entry.get("message").and_then(|m| m.get("content")).and_then(|c| c.as_array())
        else {
            continue;
        };
        for block in content {
            if block.get("type").and_then(|v| v.as_str()) != Some("tool_result") {
                continue;
            }
            if block.get("tool_use_id").and_then(|v| v.as_str()) == Some(tool_use_id) {
                let is_error = block.get("is_error").and_then(|v| v.as_bool()).unwrap_or(false);
                return Some(ToolResult {
                    found: true,
                    is_error,
                    offset_after: (i + 1) as u64,
                });
            }
        }
    }
    Some(ToolResult {
        found: false,
        is_error: false,
        offset_after: lines.len() as u64,
    })
}

/// Scans forward from `after_offset` for the first user entry whose
/// content is a non-empty **string** (array content is a tool-result, not
/// a user prompt, and must be skipped).
pub fn find_user_text(path: &Path, after_offset: u64) -> Option<(String, u64)> {
    let lines = read_lines(path)?;
    let start = after_offset as usize;
    for (i, entry) in lines.iter().enumerate().skip(start) {
        if entry.get("type").and_then(|v| v.as_str()) != Some("user") {
            continue;
        }
        let Some(content) = entry.get("message").and_then(|m| m.get("content")) else {
            continue;
        };
        if let Value::String(s) = content {
            if !s.trim().is_empty() {
                return Some((s.clone(), (i + 1) as u64));
            }
        }
    }
    None
}

/// Number of non-empty lines; `0` on any read error.
pub fn line_count(path: &Path) -> u64 {
    read_lines(path).map(|lines| lines.len() as u64).unwrap_or(0)
}

/// Modification time in milliseconds since epoch, or `None` on error.
pub fn mtime(path: &Path) -> Option<u64> {
    let metadata = fs::metadata(path).ok()?;
    let modified = metadata.modified().ok()?;
    let duration = modified.duration_since(SystemTime::UNIX_EPOCH).ok()?;
    Some(duration.as_millis() as u64)
}

/// Returns `true` if `mtime(path)` is within `window` of now.
pub fn mtime_within(path: &Path, window: Duration) -> bool {
    let Some(ms) = mtime(path) else { return false };
    let Ok(now) = SystemTime::now().duration_since(SystemTime::UNIX_EPOCH) else {
        return false;
    };
    now.as_millis().saturating_sub(ms as u128) <= window.as_millis()
}

/// Sub-agent transcript paths in the same directory as `path`, matched by
/// the `agent-*.jsonl` naming convention.
pub fn sibling_agent_transcripts(path: &Path) -> Vec<PathBuf> {
    let Some(dir) = path.parent() else { return Vec::new() };
    let Ok(entries) = fs::read_dir(dir) else { return Vec::new() };

    entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| {
            p.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with("agent-") && n.ends_with(".jsonl"))
        })
        .collect()
}

#[cfg(test)]
#[path = "transcript_tests.rs"]
mod tests;
