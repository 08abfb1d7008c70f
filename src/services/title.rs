// ABOUTME: Background conversation title synthesis after the first exchange
// ABOUTME: Fire-and-forget task that derives a short title from the opening turn
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Parley Contributors

//! # Title Synthesis
//!
//! After the first streamed exchange in a conversation, a detached task asks
//! the LLM for a short title and writes it back. The task never surfaces
//! errors to the client: a failed synthesis falls back to a truncated copy of
//! the user's message, and a failed database write is logged and dropped. If
//! the conversation was deleted while the title was being generated, the
//! update is a silent no-op.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::database::Database;
use crate::errors::AppResult;
use crate::llm::{title_prompt, ChatRequest, LlmProvider};

/// Maximum accepted title length in characters; longer output is discarded
const MAX_TITLE_CHARS: usize = 30;
/// Number of characters of the user message kept in the fallback title
const FALLBACK_TITLE_CHARS: usize = 20;

/// Spawn a detached task that synthesizes and stores a conversation title
///
/// The caller does not wait for the result; the handle is dropped.
pub fn spawn_title_synthesis(
    database: Database,
    provider: Arc<dyn LlmProvider>,
    conversation_id: i64,
    user_message: String,
    assistant_response: String,
) {
    tokio::spawn(async move {
        if let Err(e) = synthesize_title(
            &database,
            provider.as_ref(),
            conversation_id,
            &user_message,
            &assistant_response,
        )
        .await
        {
            warn!(
                conversation_id,
                "Title synthesis failed: {e}"
            );
        }
    });
}

/// Generate a title from the first exchange and store it
///
/// # Errors
///
/// Returns gateway errors from the LLM call and database errors from the
/// title update.
pub async fn synthesize_title(
    database: &Database,
    provider: &dyn LlmProvider,
    conversation_id: i64,
    user_message: &str,
    assistant_response: &str,
) -> AppResult<()> {
    let prompt = title_prompt(user_message, assistant_response);
    let response = provider.complete(&ChatRequest::new(prompt)).await?;

    let title = resolve_title(&response.content, user_message);

    let updated = database
        .chat()
        .update_conversation_title(conversation_id, &title)
        .await?;

    if updated {
        debug!(conversation_id, title = %title, "Conversation title updated");
    } else {
        // Conversation deleted while the title was being generated
        debug!(conversation_id, "Conversation gone, title discarded");
    }

    Ok(())
}

/// Normalize the model's output and fall back to the user message if unusable
///
/// The raw output is trimmed and a single layer of surrounding quotes is
/// removed. If the result is empty or longer than [`MAX_TITLE_CHARS`]
/// characters, the title becomes the first [`FALLBACK_TITLE_CHARS`]
/// characters of the user message, with a trailing ellipsis when truncated.
fn resolve_title(raw: &str, user_message: &str) -> String {
    let title = normalize_title(raw);

    if title.is_empty() || title.chars().count() > MAX_TITLE_CHARS {
        let truncated: String = user_message.chars().take(FALLBACK_TITLE_CHARS).collect();
        if user_message.chars().count() > FALLBACK_TITLE_CHARS {
            format!("{truncated}...")
        } else {
            truncated
        }
    } else {
        title
    }
}

/// Trim whitespace and strip one leading and one trailing quote character
///
/// Leading and trailing quotes are stripped independently, so unmatched or
/// mixed quote pairs are handled too.
fn normalize_title(raw: &str) -> String {
    let trimmed = raw.trim();
    let stripped = trimmed.strip_prefix(['"', '\'']).unwrap_or(trimmed);
    let stripped = stripped.strip_suffix(['"', '\'']).unwrap_or(stripped);
    stripped.trim().to_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_strips_one_quote_layer() {
        assert_eq!(normalize_title("\"Rust basics\""), "Rust basics");
        assert_eq!(normalize_title("'Rust basics'"), "Rust basics");
        assert_eq!(normalize_title("\"'Nested'\""), "'Nested'");
        assert_eq!(normalize_title("  plain title  "), "plain title");
    }

    #[test]
    fn test_normalize_strips_unmatched_quotes() {
        assert_eq!(normalize_title("\"Title"), "Title");
        assert_eq!(normalize_title("Title\""), "Title");
        assert_eq!(normalize_title("'Title\""), "Title");
        assert_eq!(normalize_title("\""), "");
    }

    #[test]
    fn test_resolve_title_accepts_short_output() {
        assert_eq!(resolve_title("\"Greetings\"", "Hi there"), "Greetings");
    }

    #[test]
    fn test_resolve_title_falls_back_on_empty_output() {
        assert_eq!(resolve_title("   ", "Hi there"), "Hi there");
        assert_eq!(resolve_title("\"\"", "Hi there"), "Hi there");
    }

    #[test]
    fn test_resolve_title_falls_back_on_long_output() {
        let long = "a".repeat(31);
        let user = "What is the capital of France, and why?";
        let fallback = resolve_title(&long, user);
        assert_eq!(fallback, "What is the capital ...");
        assert_eq!(fallback.chars().count(), 23);
    }

    #[test]
    fn test_resolve_title_fallback_counts_chars_not_bytes() {
        let long = "b".repeat(40);
        let user = "你好世界";
        assert_eq!(resolve_title(&long, user), "你好世界");

        let user_long: String = "好".repeat(25);
        let fallback = resolve_title(&long, &user_long);
        assert_eq!(fallback, format!("{}...", "好".repeat(20)));
    }

    #[test]
    fn test_resolve_title_short_user_message_no_ellipsis() {
        let long = "c".repeat(40);
        assert_eq!(resolve_title(&long, "Hi"), "Hi");
    }
}
