// ABOUTME: Chat and message storage over SQLite
// ABOUTME: Chat CRUD, container moves, and strictly ordered message history
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Prism Labs

//! Chat and message storage.
//!
//! Message history is the conversation's causal order: reads sort by
//! `(created_at, rowid)` so that rows inserted within the same clock tick
//! keep insertion order when replayed to the aggregator.

use std::str::FromStr;

use chrono::Utc;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use super::{parse_timestamp, parse_uuid};
use crate::errors::AppResult;
use crate::models::{Chat, Message, MessageRole};

/// Storage manager for chats and messages
#[derive(Clone)]
pub struct ChatStore {
    pool: SqlitePool,
}

impl ChatStore {
    /// Create a new chat store
    #[must_use]
    pub const fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    // ========================================================================
    // Chat Operations
    // ========================================================================

    /// Create a new chat
    ///
    /// # Errors
    ///
    /// Returns an error if the insert fails.
    pub async fn create(&self, user_id: Uuid, model: &str, title: &str) -> AppResult<Chat> {
        let chat = Chat {
            id: Uuid::new_v4(),
            user_id,
            project_id: None,
            folder_id: None,
            model: model.to_owned(),
            title: title.to_owned(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        sqlx::query(
            r"
            INSERT INTO chats (id, user_id, project_id, folder_id, model, title, created_at, updated_at)
            VALUES (?1, ?2, NULL, NULL, ?3, ?4, ?5, ?5)
            ",
        )
        .bind(chat.id.to_string())
        .bind(chat.user_id.to_string())
        .bind(&chat.model)
        .bind(&chat.title)
        .bind(chat.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(chat)
    }

    /// Get a chat by ID (unscoped; ownership is asserted by the tenant guard)
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn get(&self, chat_id: Uuid) -> AppResult<Option<Chat>> {
        let row = sqlx::query("SELECT * FROM chats WHERE id = ?1")
            .bind(chat_id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        row.map(|r| row_to_chat(&r)).transpose()
    }

    /// List a user's chats, most recently updated first
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn list_for_user(
        &self,
        user_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> AppResult<Vec<Chat>> {
        let rows = sqlx::query(
            "SELECT * FROM chats WHERE user_id = ?1 ORDER BY updated_at DESC LIMIT ?2 OFFSET ?3",
        )
        .bind(user_id.to_string())
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_chat).collect()
    }

    /// Rename a chat
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn rename(&self, chat_id: Uuid, title: &str) -> AppResult<bool> {
        let result = sqlx::query("UPDATE chats SET title = ?1, updated_at = ?2 WHERE id = ?3")
            .bind(title)
            .bind(Utc::now().to_rfc3339())
            .bind(chat_id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Move a chat into (or out of) a project
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn set_project(&self, chat_id: Uuid, project_id: Option<Uuid>) -> AppResult<bool> {
        let result = sqlx::query("UPDATE chats SET project_id = ?1, updated_at = ?2 WHERE id = ?3")
            .bind(project_id.map(|id| id.to_string()))
            .bind(Utc::now().to_rfc3339())
            .bind(chat_id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Move a chat into (or out of) a legacy folder
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn set_folder(&self, chat_id: Uuid, folder_id: Option<Uuid>) -> AppResult<bool> {
        let result = sqlx::query("UPDATE chats SET folder_id = ?1, updated_at = ?2 WHERE id = ?3")
            .bind(folder_id.map(|id| id.to_string()))
            .bind(Utc::now().to_rfc3339())
            .bind(chat_id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Delete a chat; messages cascade
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn delete(&self, chat_id: Uuid) -> AppResult<bool> {
        // SQLite only honors ON DELETE CASCADE with foreign_keys on, so the
        // message delete is explicit.
        sqlx::query("DELETE FROM messages WHERE chat_id = ?1")
            .bind(chat_id.to_string())
            .execute(&self.pool)
            .await?;

        let result = sqlx::query("DELETE FROM chats WHERE id = ?1")
            .bind(chat_id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    // ========================================================================
    // Message Operations
    // ========================================================================

    /// Append a message to a chat
    ///
    /// # Errors
    ///
    /// Returns an error if the insert fails.
    pub async fn add_message(
        &self,
        chat_id: Uuid,
        role: MessageRole,
        content: &str,
        credits_used: i64,
    ) -> AppResult<Message> {
        let message = Message {
            id: Uuid::new_v4(),
            chat_id,
            role,
            content: content.to_owned(),
            credits_used,
            created_at: Utc::now(),
        };

        sqlx::query(
            r"
            INSERT INTO messages (id, chat_id, role, content, credits_used, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ",
        )
        .bind(message.id.to_string())
        .bind(message.chat_id.to_string())
        .bind(message.role.as_str())
        .bind(&message.content)
        .bind(message.credits_used)
        .bind(message.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        sqlx::query("UPDATE chats SET updated_at = ?1 WHERE id = ?2")
            .bind(message.created_at.to_rfc3339())
            .bind(chat_id.to_string())
            .execute(&self.pool)
            .await?;

        Ok(message)
    }

    /// Remove a single message
    ///
    /// Used to roll back an assistant turn whose debit lost a concurrent-send
    /// race.
    ///
    /// # Errors
    ///
    /// Returns an error if the delete fails.
    pub async fn delete_message(&self, message_id: Uuid) -> AppResult<()> {
        sqlx::query("DELETE FROM messages WHERE id = ?1")
            .bind(message_id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Get all messages of a chat in strict creation order
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn get_messages(&self, chat_id: Uuid) -> AppResult<Vec<Message>> {
        let rows = sqlx::query(
            "SELECT * FROM messages WHERE chat_id = ?1 ORDER BY created_at ASC, rowid ASC",
        )
        .bind(chat_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_message).collect()
    }
}

/// Map a database row to a `Chat`
fn row_to_chat(row: &sqlx::sqlite::SqliteRow) -> AppResult<Chat> {
    let id: String = row.try_get("id")?;
    let user_id: String = row.try_get("user_id")?;
    let project_id: Option<String> = row.try_get("project_id")?;
    let folder_id: Option<String> = row.try_get("folder_id")?;
    let created_at: String = row.try_get("created_at")?;
    let updated_at: String = row.try_get("updated_at")?;

    Ok(Chat {
        id: parse_uuid(&id)?,
        user_id: parse_uuid(&user_id)?,
        project_id: project_id.as_deref().map(parse_uuid).transpose()?,
        folder_id: folder_id.as_deref().map(parse_uuid).transpose()?,
        model: row.try_get("model")?,
        title: row.try_get("title")?,
        created_at: parse_timestamp(&created_at)?,
        updated_at: parse_timestamp(&updated_at)?,
    })
}

/// Map a database row to a `Message`
fn row_to_message(row: &sqlx::sqlite::SqliteRow) -> AppResult<Message> {
    let id: String = row.try_get("id")?;
    let chat_id: String = row.try_get("chat_id")?;
    let role: String = row.try_get("role")?;
    let created_at: String = row.try_get("created_at")?;

    Ok(Message {
        id: parse_uuid(&id)?,
        chat_id: parse_uuid(&chat_id)?,
        role: MessageRole::from_str(&role)?,
        content: row.try_get("content")?,
        credits_used: row.try_get("credits_used")?,
        created_at: parse_timestamp(&created_at)?,
    })
}
