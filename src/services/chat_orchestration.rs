// ABOUTME: Chat orchestration domain service for multi-step turn operations
// ABOUTME: Extracts conversation verification, persistence, and prompt context from routes
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Parley Contributors

use crate::database::{ChatManager, ConversationRecord, Database, MessageRecord};
use crate::errors::{AppError, AppResult};
use crate::llm::{assemble_prompt, ChatMessage, ChatRequest, LlmProvider, MessageRole};

/// Context gathered before dispatching a streaming turn
pub struct StreamTurnContext {
    /// Whether the just-persisted user message is the first in the conversation
    pub is_first_message: bool,
    /// Full prompt for the LLM, history plus the new input
    pub prompt: Vec<ChatMessage>,
}

/// Verify the conversation exists, returning it
///
/// # Errors
///
/// Returns `AppError::ResourceNotFound` if the conversation does not exist.
/// Returns database errors on lookup failure.
pub async fn require_conversation(
    database: &Database,
    conversation_id: i64,
) -> AppResult<ConversationRecord> {
    database
        .chat()
        .get_conversation(conversation_id)
        .await?
        .ok_or_else(|| AppError::not_found("Conversation"))
}

/// Run a complete non-streaming chat turn
///
/// A single transaction spans the whole turn: the user message insert, the
/// history read, and the assistant message insert. If the LLM call fails the
/// transaction is dropped and nothing is persisted, so a failed turn leaves
/// no half-written exchange behind.
///
/// # Errors
///
/// Returns `AppError::ResourceNotFound` if the conversation does not exist,
/// gateway errors from the LLM call, and database errors on persistence
/// failure.
pub async fn run_turn(
    database: &Database,
    provider: &dyn LlmProvider,
    conversation_id: i64,
    content: &str,
) -> AppResult<MessageRecord> {
    require_conversation(database, conversation_id).await?;

    let chat = database.chat();
    let mut tx = chat.begin().await?;

    ChatManager::add_message_on(&mut *tx, conversation_id, MessageRole::User, content).await?;
    let history = ChatManager::get_messages_on(&mut *tx, conversation_id).await?;

    let prompt = assemble_prompt(&to_chat_messages(&history), content);
    let response = provider.complete(&ChatRequest::new(prompt)).await?;

    let assistant = ChatManager::add_message_on(
        &mut *tx,
        conversation_id,
        MessageRole::Assistant,
        &response.content,
    )
    .await?;

    tx.commit()
        .await
        .map_err(|e| AppError::database(format!("Failed to commit turn: {e}")))?;

    Ok(assistant)
}

/// Persist the user message for a streaming turn and gather prompt context
///
/// Unlike [`run_turn`], the user message is committed immediately: once the
/// response body starts streaming there is no way to report a rollback to the
/// client, so the user's side of the exchange survives a mid-stream failure.
///
/// # Errors
///
/// Returns `AppError::ResourceNotFound` if the conversation does not exist.
/// Returns database errors on persistence failure.
pub async fn begin_stream_turn(
    database: &Database,
    conversation_id: i64,
    content: &str,
) -> AppResult<StreamTurnContext> {
    require_conversation(database, conversation_id).await?;

    let chat = database.chat();
    chat.add_message(conversation_id, MessageRole::User, content)
        .await?;

    let is_first_message = chat.get_message_count(conversation_id).await? == 1;

    let history = chat.get_messages(conversation_id).await?;
    let prompt = assemble_prompt(&to_chat_messages(&history), content);

    Ok(StreamTurnContext {
        is_first_message,
        prompt,
    })
}

/// Persist the accumulated assistant response after a stream drains cleanly
///
/// # Errors
///
/// Returns database errors on persistence failure.
pub async fn persist_assistant_response(
    database: &Database,
    conversation_id: i64,
    content: &str,
) -> AppResult<MessageRecord> {
    database
        .chat()
        .add_message(conversation_id, MessageRole::Assistant, content)
        .await
}

/// Convert stored message records into LLM chat messages
///
/// Records with an unrecognized role are skipped rather than failing the
/// whole turn.
#[must_use]
pub fn to_chat_messages(history: &[MessageRecord]) -> Vec<ChatMessage> {
    history
        .iter()
        .filter_map(|msg| {
            let role: MessageRole = msg.role.parse().ok()?;
            Some(ChatMessage::new(role, msg.content.clone()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(role: &str, content: &str) -> MessageRecord {
        MessageRecord {
            id: 0,
            conversation_id: 1,
            role: role.to_owned(),
            content: content.to_owned(),
            created_at: "2025-01-01T00:00:00Z".to_owned(),
        }
    }

    #[test]
    fn test_to_chat_messages_preserves_order() {
        let history = vec![record("user", "Hi"), record("assistant", "Hello!")];
        let messages = to_chat_messages(&history);

        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, MessageRole::User);
        assert_eq!(messages[1].role, MessageRole::Assistant);
        assert_eq!(messages[1].content, "Hello!");
    }

    #[test]
    fn test_to_chat_messages_skips_unknown_roles() {
        let history = vec![record("user", "Hi"), record("tool", "ignored")];
        let messages = to_chat_messages(&history);

        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].content, "Hi");
    }
}
