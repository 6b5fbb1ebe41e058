// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Human-readable rendering of a tool invocation's `input` object, and the
//! markup-escaping applied before any text is sent to the remote chat.

use serde_json::Value;

const MAX_RENDER_LEN: usize = 100;

/// Render a tool's `input` object into the text shown to the remote user.
///
/// Falls back, for tools without a dedicated template, to the first
/// non-empty string value in `input`, then to the JSON-stringified object;
/// both are truncated at [`MAX_RENDER_LEN`] characters.
pub fn format_tool_input(tool_name: &str, input: &Value) -> String {
    let field = |key: &str| -> String {
        input
            .get(key)
            .and_then(Value::as_str)
            .map(|s| truncate(s, MAX_RENDER_LEN))
            .unwrap_or_else(|| format!("(unknown {key})"))
    };

    match tool_name {
        "Bash" => field("command"),
        "Write" => format!("Write to {}", field("file_path")),
        "Edit" => format!("Edit {}", field("file_path")),
        "Read" => field("file_path"),
        "Glob" => format!("Pattern: {}", field("pattern")),
        "Grep" => format!("Search: {}", field("pattern")),
        "WebFetch" => field("url"),
        "WebSearch" => field("query"),
        _ => fallback_render(input),
    }
}

fn fallback_render(input: &Value) -> String {
    if let Value::Object(map) = input {
        for value in map.values() {
            if let Some(s) = value.as_str() {
                if !s.is_empty() {
                    return truncate(s, MAX_RENDER_LEN);
                }
            }
        }
    }
    truncate(&input.to_string(), MAX_RENDER_LEN)
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        s.chars().take(max).collect()
    }
}

/// Escape characters that the remote chat's inline markup would otherwise
/// interpret: `_`, `*`, `` ` ``, `[`.
pub fn escape_markup(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        if matches!(ch, '_' | '*' | '`' | '[') {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}
