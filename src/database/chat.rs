// ABOUTME: Database operations for chat conversations and messages
// ABOUTME: Handles CRUD operations with ordered conversation history retrieval
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Parley Contributors

use crate::errors::{AppError, AppResult};
use crate::llm::MessageRole;
use serde::{Deserialize, Serialize};
use sqlx::{Row, Sqlite, SqliteConnection, SqlitePool, Transaction};

// ============================================================================
// Database Record Types
// ============================================================================

/// Database representation of a conversation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationRecord {
    /// Unique conversation ID
    pub id: i64,
    /// Conversation title (caller-supplied or auto-generated)
    pub title: String,
    /// When the conversation was created (RFC 3339)
    pub created_at: String,
    /// When the conversation was last updated (RFC 3339)
    pub updated_at: String,
}

/// Database representation of a chat message
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageRecord {
    /// Unique message ID
    pub id: i64,
    /// Conversation ID this message belongs to
    pub conversation_id: i64,
    /// Role of the message sender (system, user, assistant)
    pub role: String,
    /// Message content
    pub content: String,
    /// When the message was created (RFC 3339); the sole ordering key
    pub created_at: String,
}

/// Summary of a conversation for listing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationSummary {
    /// Conversation ID
    pub id: i64,
    /// Conversation title
    pub title: String,
    /// When the conversation was last updated
    pub updated_at: String,
}

// ============================================================================
// Chat Manager
// ============================================================================

/// Chat database operations manager
pub struct ChatManager {
    pool: SqlitePool,
}

impl ChatManager {
    /// Create a new chat manager
    #[must_use]
    pub const fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Begin a transaction for multi-statement turn operations
    ///
    /// # Errors
    ///
    /// Returns an error if a connection cannot be acquired.
    pub async fn begin(&self) -> AppResult<Transaction<'static, Sqlite>> {
        self.pool
            .begin()
            .await
            .map_err(|e| AppError::database(format!("Failed to begin transaction: {e}")))
    }

    // ========================================================================
    // Conversation Operations
    // ========================================================================

    /// Create a new conversation
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails
    pub async fn create_conversation(&self, title: &str) -> AppResult<ConversationRecord> {
        let now = chrono::Utc::now().to_rfc3339();

        let result = sqlx::query(
            r"
            INSERT INTO conversations (title, created_at, updated_at)
            VALUES ($1, $2, $2)
            ",
        )
        .bind(title)
        .bind(&now)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to create conversation: {e}")))?;

        Ok(ConversationRecord {
            id: result.last_insert_rowid(),
            title: title.to_owned(),
            created_at: now.clone(),
            updated_at: now,
        })
    }

    /// Get a conversation by ID
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails
    pub async fn get_conversation(
        &self,
        conversation_id: i64,
    ) -> AppResult<Option<ConversationRecord>> {
        let row = sqlx::query(
            r"
            SELECT id, title, created_at, updated_at
            FROM conversations
            WHERE id = $1
            ",
        )
        .bind(conversation_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to get conversation: {e}")))?;

        Ok(row.map(|r| ConversationRecord {
            id: r.get("id"),
            title: r.get("title"),
            created_at: r.get("created_at"),
            updated_at: r.get("updated_at"),
        }))
    }

    /// List all conversations, most recently updated first
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails
    pub async fn list_conversations(&self) -> AppResult<Vec<ConversationSummary>> {
        let rows = sqlx::query(
            r"
            SELECT id, title, updated_at
            FROM conversations
            ORDER BY updated_at DESC
            ",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to list conversations: {e}")))?;

        let summaries = rows
            .into_iter()
            .map(|r| ConversationSummary {
                id: r.get("id"),
                title: r.get("title"),
                updated_at: r.get("updated_at"),
            })
            .collect();

        Ok(summaries)
    }

    /// Update a conversation title, returning whether the row existed
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails
    pub async fn update_conversation_title(
        &self,
        conversation_id: i64,
        title: &str,
    ) -> AppResult<bool> {
        let now = chrono::Utc::now().to_rfc3339();

        let result = sqlx::query(
            r"
            UPDATE conversations
            SET title = $1, updated_at = $2
            WHERE id = $3
            ",
        )
        .bind(title)
        .bind(&now)
        .bind(conversation_id)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to update conversation title: {e}")))?;

        Ok(result.rows_affected() > 0)
    }

    /// Delete a conversation and all its messages (cascade)
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails
    pub async fn delete_conversation(&self, conversation_id: i64) -> AppResult<bool> {
        let mut tx = self.begin().await?;

        sqlx::query(
            r"
            DELETE FROM messages
            WHERE conversation_id = $1
            ",
        )
        .bind(conversation_id)
        .execute(&mut *tx)
        .await
        .map_err(|e| AppError::database(format!("Failed to delete messages: {e}")))?;

        let result = sqlx::query(
            r"
            DELETE FROM conversations
            WHERE id = $1
            ",
        )
        .bind(conversation_id)
        .execute(&mut *tx)
        .await
        .map_err(|e| AppError::database(format!("Failed to delete conversation: {e}")))?;

        tx.commit()
            .await
            .map_err(|e| AppError::database(format!("Failed to commit delete: {e}")))?;

        Ok(result.rows_affected() > 0)
    }

    // ========================================================================
    // Message Operations
    // ========================================================================

    /// Add a message to a conversation and bump its `updated_at`
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails
    pub async fn add_message(
        &self,
        conversation_id: i64,
        role: MessageRole,
        content: &str,
    ) -> AppResult<MessageRecord> {
        let mut conn = self
            .pool
            .acquire()
            .await
            .map_err(|e| AppError::database(format!("Failed to acquire connection: {e}")))?;

        Self::add_message_on(&mut conn, conversation_id, role, content).await
    }

    /// Add a message on an explicit connection (usable inside a transaction)
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails
    pub async fn add_message_on(
        conn: &mut SqliteConnection,
        conversation_id: i64,
        role: MessageRole,
        content: &str,
    ) -> AppResult<MessageRecord> {
        let now = chrono::Utc::now().to_rfc3339();
        let role_str = role.as_str();

        let result = sqlx::query(
            r"
            INSERT INTO messages (conversation_id, role, content, created_at)
            VALUES ($1, $2, $3, $4)
            ",
        )
        .bind(conversation_id)
        .bind(role_str)
        .bind(content)
        .bind(&now)
        .execute(&mut *conn)
        .await
        .map_err(|e| AppError::database(format!("Failed to add message: {e}")))?;

        sqlx::query(
            r"
            UPDATE conversations
            SET updated_at = $1
            WHERE id = $2
            ",
        )
        .bind(&now)
        .bind(conversation_id)
        .execute(&mut *conn)
        .await
        .map_err(|e| AppError::database(format!("Failed to update conversation timestamp: {e}")))?;

        Ok(MessageRecord {
            id: result.last_insert_rowid(),
            conversation_id,
            role: role_str.to_owned(),
            content: content.to_owned(),
            created_at: now,
        })
    }

    /// Get all messages for a conversation in chronological order
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails
    pub async fn get_messages(&self, conversation_id: i64) -> AppResult<Vec<MessageRecord>> {
        let mut conn = self
            .pool
            .acquire()
            .await
            .map_err(|e| AppError::database(format!("Failed to acquire connection: {e}")))?;

        Self::get_messages_on(&mut conn, conversation_id).await
    }

    /// Get ordered messages on an explicit connection (usable inside a transaction)
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails
    pub async fn get_messages_on(
        conn: &mut SqliteConnection,
        conversation_id: i64,
    ) -> AppResult<Vec<MessageRecord>> {
        let rows = sqlx::query(
            r"
            SELECT id, conversation_id, role, content, created_at
            FROM messages
            WHERE conversation_id = $1
            ORDER BY created_at ASC, id ASC
            ",
        )
        .bind(conversation_id)
        .fetch_all(&mut *conn)
        .await
        .map_err(|e| AppError::database(format!("Failed to get messages: {e}")))?;

        let messages = rows
            .into_iter()
            .map(|r| MessageRecord {
                id: r.get("id"),
                conversation_id: r.get("conversation_id"),
                role: r.get("role"),
                content: r.get("content"),
                created_at: r.get("created_at"),
            })
            .collect();

        Ok(messages)
    }

    /// Get message count for a conversation
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails
    pub async fn get_message_count(&self, conversation_id: i64) -> AppResult<i64> {
        let row = sqlx::query(
            r"
            SELECT COUNT(*) as count
            FROM messages
            WHERE conversation_id = $1
            ",
        )
        .bind(conversation_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to get message count: {e}")))?;

        Ok(row.get("count"))
    }
}
