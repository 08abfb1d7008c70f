// ABOUTME: Prompt assembly for chat turns and conversation title synthesis
// ABOUTME: Builds role-ordered message lists from stored conversation history
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Parley Contributors

//! # Prompt Assembly
//!
//! Pure functions that build the message lists sent to the LLM gateway.
//! Keeping assembly separate from the HTTP handlers makes the exact prompt
//! shape testable without a database or a live backend.

use super::ChatMessage;

/// System prompt prepended to every chat turn
pub const ASSISTANT_SYSTEM_PROMPT: &str = "You're a helpful assistant";

/// Assemble the full prompt for a chat turn
///
/// The result is: system prompt, then the stored conversation history in
/// chronological order, then the new user input as the final message. The
/// history passed here already contains the just-persisted user message, so
/// the new input appears twice; the trailing copy is what anchors the model
/// on the current turn.
#[must_use]
pub fn assemble_prompt(history: &[ChatMessage], user_input: &str) -> Vec<ChatMessage> {
    let mut messages = Vec::with_capacity(history.len() + 2);
    messages.push(ChatMessage::system(ASSISTANT_SYSTEM_PROMPT));
    messages.extend_from_slice(history);
    messages.push(ChatMessage::user(user_input));
    messages
}

/// Build the prompt for synthesizing a conversation title
///
/// Asks for a short, specific title in the language of the user's question,
/// derived from the first exchange of the conversation.
#[must_use]
pub fn title_prompt(user_message: &str, assistant_response: &str) -> Vec<ChatMessage> {
    vec![
        ChatMessage::system(
            "Based on the user's question and the assistant's answer, generate a short, \
             specific title for the conversation (no more than 20 characters). Respond in \
             the same language as the user's question. Return only the title text, with \
             no other content.",
        ),
        ChatMessage::user(format!(
            "User question: {user_message}\n\nAssistant answer: {assistant_response}"
        )),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::MessageRole;

    #[test]
    fn test_assemble_prompt_ordering() {
        let history = vec![
            ChatMessage::user("Hi"),
            ChatMessage::assistant("Hello!"),
            ChatMessage::user("How are you?"),
        ];

        let prompt = assemble_prompt(&history, "How are you?");

        assert_eq!(prompt.len(), 5);
        assert_eq!(prompt[0].role, MessageRole::System);
        assert_eq!(prompt[0].content, ASSISTANT_SYSTEM_PROMPT);
        assert_eq!(prompt[1].content, "Hi");
        assert_eq!(prompt[2].content, "Hello!");
        // The current input appears both as the last history entry and as
        // the final message.
        assert_eq!(prompt[3].content, "How are you?");
        assert_eq!(prompt[4].role, MessageRole::User);
        assert_eq!(prompt[4].content, "How are you?");
    }

    #[test]
    fn test_assemble_prompt_empty_history() {
        let prompt = assemble_prompt(&[], "First message");
        assert_eq!(prompt.len(), 2);
        assert_eq!(prompt[0].role, MessageRole::System);
        assert_eq!(prompt[1].content, "First message");
    }

    #[test]
    fn test_title_prompt_includes_both_sides() {
        let prompt = title_prompt("What is Rust?", "A systems language.");
        assert_eq!(prompt.len(), 2);
        assert_eq!(prompt[0].role, MessageRole::System);
        assert!(prompt[1].content.contains("What is Rust?"));
        assert!(prompt[1].content.contains("A systems language."));
    }
}
