// ABOUTME: Prompt template storage with public visibility and usage counting
// ABOUTME: Templates keep raw {{variable}} placeholders; no server-side interpolation
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Prism Labs

//! Prompt template storage.

use chrono::Utc;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use super::{parse_timestamp, parse_uuid};
use crate::errors::AppResult;
use crate::models::PromptTemplate;

/// Storage manager for prompt templates
#[derive(Clone)]
pub struct TemplateStore {
    pool: SqlitePool,
}

impl TemplateStore {
    /// Create a new template store
    #[must_use]
    pub const fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create a template
    ///
    /// # Errors
    ///
    /// Returns an error if the insert fails.
    pub async fn create(
        &self,
        user_id: Uuid,
        title: &str,
        content: &str,
        is_public: bool,
    ) -> AppResult<PromptTemplate> {
        let template = PromptTemplate {
            id: Uuid::new_v4(),
            user_id,
            title: title.to_owned(),
            content: content.to_owned(),
            is_public,
            usage_count: 0,
            created_at: Utc::now(),
        };

        sqlx::query(
            r"
            INSERT INTO prompt_templates (id, user_id, title, content, is_public, usage_count, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, 0, ?6)
            ",
        )
        .bind(template.id.to_string())
        .bind(template.user_id.to_string())
        .bind(&template.title)
        .bind(&template.content)
        .bind(template.is_public)
        .bind(template.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(template)
    }

    /// Get a template by ID
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn get(&self, template_id: Uuid) -> AppResult<Option<PromptTemplate>> {
        let row = sqlx::query("SELECT * FROM prompt_templates WHERE id = ?1")
            .bind(template_id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        row.map(|r| row_to_template(&r)).transpose()
    }

    /// List templates visible to a user: their own plus public ones
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn list_visible(&self, user_id: Uuid) -> AppResult<Vec<PromptTemplate>> {
        let rows = sqlx::query(
            r"
            SELECT * FROM prompt_templates
            WHERE user_id = ?1 OR is_public = 1
            ORDER BY created_at DESC
            ",
        )
        .bind(user_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_template).collect()
    }

    /// Update a template's title, content, and visibility
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn update(
        &self,
        template_id: Uuid,
        title: &str,
        content: &str,
        is_public: bool,
    ) -> AppResult<bool> {
        let result = sqlx::query(
            "UPDATE prompt_templates SET title = ?1, content = ?2, is_public = ?3 WHERE id = ?4",
        )
        .bind(title)
        .bind(content)
        .bind(is_public)
        .bind(template_id.to_string())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Increment a template's usage counter
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn increment_usage(&self, template_id: Uuid) -> AppResult<()> {
        sqlx::query("UPDATE prompt_templates SET usage_count = usage_count + 1 WHERE id = ?1")
            .bind(template_id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Delete a template
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn delete(&self, template_id: Uuid) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM prompt_templates WHERE id = ?1")
            .bind(template_id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

/// Map a database row to a `PromptTemplate`
fn row_to_template(row: &sqlx::sqlite::SqliteRow) -> AppResult<PromptTemplate> {
    let id: String = row.try_get("id")?;
    let user_id: String = row.try_get("user_id")?;
    let created_at: String = row.try_get("created_at")?;

    Ok(PromptTemplate {
        id: parse_uuid(&id)?,
        user_id: parse_uuid(&user_id)?,
        title: row.try_get("title")?,
        content: row.try_get("content")?,
        is_public: row.try_get("is_public")?,
        usage_count: row.try_get("usage_count")?,
        created_at: parse_timestamp(&created_at)?,
    })
}
