// ABOUTME: Chat route handlers for conversation management and turn dispatch
// ABOUTME: Provides REST endpoints for conversations, messages, and NDJSON streaming
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Parley Contributors

//! Chat routes for conversations and turns
//!
//! This module handles conversation management (create, list, delete, title
//! update) and the two turn modes: a synchronous completion that returns the
//! assistant message as JSON, and a streaming completion that emits NDJSON
//! frames while the model generates.
//!
//! Streaming wire format: `application/x-ndjson`, one frame per line.
//! Content frames are `{"chunk": "<fragment>", "done": false}`; a single
//! terminal frame `{"chunk": "", "done": true}` marks clean completion. If
//! the model gateway fails mid-stream, the body simply ends with no terminal
//! frame and the accumulated partial response is discarded.

use crate::{
    errors::AppError,
    llm::ChatRequest,
    resources::ServerResources,
    services::{chat_orchestration, title},
};
use axum::{
    body::Body,
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio_stream::StreamExt;
use tracing::{error, info};

// ============================================================================
// Request/Response Types
// ============================================================================

/// Request to create a new conversation
#[derive(Debug, Deserialize)]
pub struct CreateConversationRequest {
    /// Conversation title
    pub title: String,
}

/// Response for conversation creation and title updates
#[derive(Debug, Serialize, Deserialize)]
pub struct ConversationResponse {
    /// Conversation ID
    pub id: i64,
    /// Conversation title
    pub title: String,
}

/// Summary of a conversation for listing
#[derive(Debug, Serialize, Deserialize)]
pub struct ConversationSummaryResponse {
    /// Conversation ID
    pub id: i64,
    /// Conversation title
    pub title: String,
    /// Last update timestamp
    pub updated_at: String,
}

/// Request to update a conversation title
#[derive(Debug, Deserialize)]
pub struct UpdateTitleRequest {
    /// New title
    pub title: String,
}

/// Request to send a message
#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    /// Message content
    pub content: String,
}

/// A message in a conversation history listing
#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    /// Role (user/assistant/system)
    pub role: String,
    /// Message content
    pub content: String,
    /// Creation timestamp
    pub created_at: String,
}

/// Response for a completed non-streaming turn
#[derive(Debug, Serialize, Deserialize)]
pub struct TurnResponse {
    /// Always "assistant"
    pub role: String,
    /// Generated assistant content
    pub content: String,
}

/// One NDJSON frame of a streaming turn
#[derive(Debug, Serialize, Deserialize)]
pub struct StreamFrame {
    /// Content fragment (empty on the terminal frame)
    pub chunk: String,
    /// Whether this is the terminal frame
    pub done: bool,
}

// ============================================================================
// Chat Routes
// ============================================================================

/// Chat routes handler
pub struct ChatRoutes;

impl ChatRoutes {
    /// Create all chat routes
    pub fn routes(resources: Arc<ServerResources>) -> Router {
        Router::new()
            // Conversation management
            .route("/conversations", post(Self::create_conversation))
            .route("/conversations", get(Self::list_conversations))
            .route(
                "/conversations/:conversation_id",
                delete(Self::delete_conversation),
            )
            .route(
                "/conversations/:conversation_id/title",
                post(Self::update_title),
            )
            // Messages
            .route(
                "/conversations/:conversation_id/messages",
                get(Self::get_messages),
            )
            .route(
                "/conversations/:conversation_id/messages",
                post(Self::send_message),
            )
            // Streaming endpoint
            .route(
                "/conversations/:conversation_id/messages/stream",
                post(Self::send_message_stream),
            )
            .with_state(resources)
    }

    // ========================================================================
    // Conversation Handlers
    // ========================================================================

    /// Create a new conversation
    async fn create_conversation(
        State(resources): State<Arc<ServerResources>>,
        Json(request): Json<CreateConversationRequest>,
    ) -> Result<Response, AppError> {
        let conv = resources
            .database
            .chat()
            .create_conversation(&request.title)
            .await?;

        info!(conversation_id = conv.id, "Conversation created");

        let response = ConversationResponse {
            id: conv.id,
            title: conv.title,
        };

        Ok((StatusCode::CREATED, Json(response)).into_response())
    }

    /// List conversations, most recently updated first
    async fn list_conversations(
        State(resources): State<Arc<ServerResources>>,
    ) -> Result<Response, AppError> {
        let conversations = resources.database.chat().list_conversations().await?;

        let response: Vec<ConversationSummaryResponse> = conversations
            .into_iter()
            .map(|c| ConversationSummaryResponse {
                id: c.id,
                title: c.title,
                updated_at: c.updated_at,
            })
            .collect();

        Ok((StatusCode::OK, Json(response)).into_response())
    }

    /// Delete a conversation and its messages
    async fn delete_conversation(
        State(resources): State<Arc<ServerResources>>,
        Path(conversation_id): Path<i64>,
    ) -> Result<Response, AppError> {
        let deleted = resources
            .database
            .chat()
            .delete_conversation(conversation_id)
            .await?;

        if !deleted {
            return Err(AppError::not_found("Conversation"));
        }

        info!(conversation_id, "Conversation deleted");

        Ok((
            StatusCode::OK,
            Json(serde_json::json!({"status": "success"})),
        )
            .into_response())
    }

    /// Explicitly update a conversation title
    async fn update_title(
        State(resources): State<Arc<ServerResources>>,
        Path(conversation_id): Path<i64>,
        Json(request): Json<UpdateTitleRequest>,
    ) -> Result<Response, AppError> {
        let updated = resources
            .database
            .chat()
            .update_conversation_title(conversation_id, &request.title)
            .await?;

        if !updated {
            return Err(AppError::not_found("Conversation"));
        }

        let response = ConversationResponse {
            id: conversation_id,
            title: request.title,
        };

        Ok((StatusCode::OK, Json(response)).into_response())
    }

    // ========================================================================
    // Message Handlers
    // ========================================================================

    /// Get messages for a conversation in chronological order
    async fn get_messages(
        State(resources): State<Arc<ServerResources>>,
        Path(conversation_id): Path<i64>,
    ) -> Result<Response, AppError> {
        chat_orchestration::require_conversation(&resources.database, conversation_id).await?;

        let messages = resources
            .database
            .chat()
            .get_messages(conversation_id)
            .await?;

        let response: Vec<MessageResponse> = messages
            .into_iter()
            .map(|m| MessageResponse {
                role: m.role,
                content: m.content,
                created_at: m.created_at,
            })
            .collect();

        Ok((StatusCode::OK, Json(response)).into_response())
    }

    /// Send a message and return the complete assistant response
    async fn send_message(
        State(resources): State<Arc<ServerResources>>,
        Path(conversation_id): Path<i64>,
        Json(request): Json<SendMessageRequest>,
    ) -> Result<Response, AppError> {
        let assistant = chat_orchestration::run_turn(
            &resources.database,
            resources.provider.as_ref(),
            conversation_id,
            &request.content,
        )
        .await?;

        let response = TurnResponse {
            role: assistant.role,
            content: assistant.content,
        };

        Ok((StatusCode::CREATED, Json(response)).into_response())
    }

    /// Send a message and stream the assistant response as NDJSON frames
    ///
    /// The user message is committed before the stream starts; the assistant
    /// message is persisted only after the model output drains cleanly. The
    /// first completed turn of a conversation also detaches the title
    /// synthesis task before the terminal frame is emitted.
    async fn send_message_stream(
        State(resources): State<Arc<ServerResources>>,
        Path(conversation_id): Path<i64>,
        Json(request): Json<SendMessageRequest>,
    ) -> Result<Response, AppError> {
        let context = chat_orchestration::begin_stream_turn(
            &resources.database,
            conversation_id,
            &request.content,
        )
        .await?;

        let llm_request = ChatRequest::new(context.prompt).with_streaming();
        let mut llm_stream = resources.provider.complete_stream(&llm_request).await?;

        let database = resources.database.clone();
        let provider = resources.provider.clone();
        let is_first_message = context.is_first_message;
        let user_content = request.content;

        let body_stream = async_stream::stream! {
            let mut full_response = String::new();

            while let Some(chunk_result) = llm_stream.next().await {
                match chunk_result {
                    Ok(chunk) => {
                        if chunk.delta.is_empty() {
                            continue;
                        }
                        full_response.push_str(&chunk.delta);

                        match Self::ndjson_frame(&chunk.delta, false) {
                            Ok(frame) => yield Ok::<_, std::convert::Infallible>(frame),
                            Err(e) => {
                                error!(conversation_id, "Failed to encode stream frame: {e}");
                                return;
                            }
                        }
                    }
                    Err(e) => {
                        // Terminate the body with no terminal frame; the
                        // accumulated partial response is discarded.
                        error!(conversation_id, "Model stream failed: {e}");
                        return;
                    }
                }
            }

            if let Err(e) = chat_orchestration::persist_assistant_response(
                &database,
                conversation_id,
                &full_response,
            )
            .await
            {
                error!(conversation_id, "Failed to persist assistant response: {e}");
                return;
            }

            if is_first_message {
                title::spawn_title_synthesis(
                    database.clone(),
                    provider,
                    conversation_id,
                    user_content,
                    full_response,
                );
            }

            match Self::ndjson_frame("", true) {
                Ok(frame) => yield Ok(frame),
                Err(e) => error!(conversation_id, "Failed to encode terminal frame: {e}"),
            }
        };

        Ok((
            StatusCode::OK,
            [(header::CONTENT_TYPE, "application/x-ndjson")],
            Body::from_stream(body_stream),
        )
            .into_response())
    }

    /// Encode one NDJSON frame, newline-terminated
    fn ndjson_frame(chunk: &str, done: bool) -> Result<String, AppError> {
        let frame = StreamFrame {
            chunk: chunk.to_owned(),
            done,
        };
        let mut line = serde_json::to_string(&frame)
            .map_err(|e| AppError::internal(format!("Frame serialization failed: {e}")))?;
        line.push('\n');
        Ok(line)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ndjson_frame_content() {
        let frame = ChatRoutes::ndjson_frame("Hel", false).unwrap();
        assert_eq!(frame, "{\"chunk\":\"Hel\",\"done\":false}\n");
    }

    #[test]
    fn test_ndjson_frame_terminal() {
        let frame = ChatRoutes::ndjson_frame("", true).unwrap();
        assert_eq!(frame, "{\"chunk\":\"\",\"done\":true}\n");
    }

    #[test]
    fn test_ndjson_frame_preserves_non_ascii() {
        let frame = ChatRoutes::ndjson_frame("你好", false).unwrap();
        assert!(frame.contains("你好"));
        assert!(!frame.contains("\\u"));
    }
}
