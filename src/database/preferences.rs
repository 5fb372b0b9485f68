// ABOUTME: Preference record storage with a get-or-default read path
// ABOUTME: Reads never write; only explicit update/reset calls mutate storage
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Prism Labs

//! Preference record storage.
//!
//! The read path is get-or-default: when a user has no stored row the
//! hard-coded defaults are returned without touching storage. Tone values
//! are validated before persistence, both here and by a schema CHECK.

use std::str::FromStr;

use chrono::Utc;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use super::parse_timestamp;
use crate::errors::AppResult;
use crate::models::{PreferenceRecord, Tone};

/// Storage manager for preference records
#[derive(Clone)]
pub struct PreferenceStore {
    pool: SqlitePool,
}

impl PreferenceStore {
    /// Create a new preference store
    #[must_use]
    pub const fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Get a user's stored preferences, if any
    ///
    /// Returns `None` for users who never saved preferences. Prompt
    /// composition uses this directly so non-personalized accounts keep
    /// their base prompt byte-for-byte.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn get(&self, user_id: Uuid) -> AppResult<Option<PreferenceRecord>> {
        let row = sqlx::query("SELECT * FROM user_preferences WHERE user_id = ?1")
            .bind(user_id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        row.map(|r| row_to_preferences(user_id, &r)).transpose()
    }

    /// Get a user's preferences, falling back to defaults without writing
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn get_or_default(&self, user_id: Uuid) -> AppResult<PreferenceRecord> {
        Ok(self
            .get(user_id)
            .await?
            .unwrap_or_else(|| PreferenceRecord::default_for(user_id)))
    }

    /// Upsert a user's preferences
    ///
    /// The tone, if set, has already been parsed into the `Tone` enum by the
    /// caller, so only valid values can reach this insert.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn upsert(&self, prefs: &PreferenceRecord) -> AppResult<()> {
        sqlx::query(
            r"
            INSERT INTO user_preferences
                (user_id, base_tone, additional_preferences, nickname, occupation,
                 interests, core_values, communication_preferences,
                 allow_saved_memory, allow_reference_history, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            ON CONFLICT (user_id) DO UPDATE SET
                base_tone = excluded.base_tone,
                additional_preferences = excluded.additional_preferences,
                nickname = excluded.nickname,
                occupation = excluded.occupation,
                interests = excluded.interests,
                core_values = excluded.core_values,
                communication_preferences = excluded.communication_preferences,
                allow_saved_memory = excluded.allow_saved_memory,
                allow_reference_history = excluded.allow_reference_history,
                updated_at = excluded.updated_at
            ",
        )
        .bind(prefs.user_id.to_string())
        .bind(prefs.base_tone.map(|t| t.as_str()))
        .bind(&prefs.additional_preferences)
        .bind(&prefs.nickname)
        .bind(&prefs.occupation)
        .bind(&prefs.interests)
        .bind(&prefs.values)
        .bind(&prefs.communication_preferences)
        .bind(prefs.allow_saved_memory)
        .bind(prefs.allow_reference_history)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Delete a user's stored preferences, reverting reads to defaults
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn reset(&self, user_id: Uuid) -> AppResult<()> {
        sqlx::query("DELETE FROM user_preferences WHERE user_id = ?1")
            .bind(user_id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

/// Map a database row to a `PreferenceRecord`
fn row_to_preferences(user_id: Uuid, row: &sqlx::sqlite::SqliteRow) -> AppResult<PreferenceRecord> {
    let base_tone: Option<String> = row.try_get("base_tone")?;
    let updated_at: String = row.try_get("updated_at")?;

    Ok(PreferenceRecord {
        user_id,
        base_tone: base_tone.as_deref().map(Tone::from_str).transpose()?,
        additional_preferences: row.try_get("additional_preferences")?,
        nickname: row.try_get("nickname")?,
        occupation: row.try_get("occupation")?,
        interests: row.try_get("interests")?,
        values: row.try_get("core_values")?,
        communication_preferences: row.try_get("communication_preferences")?,
        allow_saved_memory: row.try_get("allow_saved_memory")?,
        allow_reference_history: row.try_get("allow_reference_history")?,
        updated_at: parse_timestamp(&updated_at)?,
    })
}
