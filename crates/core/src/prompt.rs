// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Message templates sent to the remote chat (composition only; sending is
//! the chat adapter's job).

use crate::tool_format::escape_markup;

const STOP_FOLLOWUP_MAX_LEN: usize = 2000;

/// Build the permission-request prompt.
///
/// `allow_bulk` controls whether the `/ all` option is offered; the daemon
/// only sets it when the tool is in the configured bulk-approval list.
pub fn permission_prompt(
    project_slug: &str,
    short_token: &str,
    context_line: &str,
    tool_name: &str,
    formatted_command: &str,
    allow_bulk: bool,
) -> String {
    let reply_options = if allow_bulk { "yes / no / all" } else { "yes / no" };
    format!(
        "[{project_slug}] #{short_token}\n\n{}\n\n*Permission:* {}\n{}\n\nReply: {reply_options}",
        escape_markup(context_line),
        escape_markup(tool_name),
        escape_markup(formatted_command),
    )
}

/// Build the stop-notification prompt.
pub fn stop_prompt(project_slug: &str, short_token: &str, context_line: &str) -> String {
    format!(
        "[{project_slug}] #{short_token}\n\n{}\n\nTask complete. Reply with follow-up instructions or ignore to stop.",
        escape_markup(context_line),
    )
}

/// Truncate stop-reply instructions to [`STOP_FOLLOWUP_MAX_LEN`] characters,
/// appending a visible truncation notice with the original length.
pub fn truncate_instructions(instructions: &str) -> String {
    let len = instructions.chars().count();
    if len <= STOP_FOLLOWUP_MAX_LEN {
        return instructions.to_string();
    }
    let truncated: String = instructions.chars().take(STOP_FOLLOWUP_MAX_LEN).collect();
    format!("{truncated}\n\n[truncated, original length: {len} characters]")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn permission_prompt_offers_all_when_bulk_allowed() {
        let text = permission_prompt("my-app", "my-app-abcd", "context", "Bash", "npm test", true);
        assert!(text.contains("Reply: yes / no / all"));
        assert!(text.contains("npm test"));
    }

    #[test]
    fn permission_prompt_omits_all_when_bulk_not_allowed() {
        let text = permission_prompt("my-app", "my-app-abcd", "context", "Bash", "npm test", false);
        assert!(text.contains("Reply: yes / no"));
        assert!(!text.contains("all"));
    }

    #[test]
    fn stop_prompt_contains_token_and_context() {
        let text = stop_prompt("my-app", "my-app-abcd", "did the thing");
        assert!(text.contains("#my-app-abcd"));
        assert!(text.contains("did the thing"));
        assert!(text.contains("Task complete"));
    }

    #[test]
    fn truncate_instructions_passes_short_text_through() {
        assert_eq!(truncate_instructions("short"), "short");
    }

    #[test]
    fn truncate_instructions_appends_notice_on_long_text() {
        let long = "x".repeat(2500);
        let out = truncate_instructions(&long);
        assert!(out.contains("[truncated, original length: 2500 characters]"));
        assert_eq!(out.chars().filter(|&c| c == 'x').count(), STOP_FOLLOWUP_MAX_LEN);
    }
}
