// ABOUTME: User account storage over SQLite
// ABOUTME: Create/lookup users and maintain the last-active timestamp
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Prism Labs

//! User account storage.

use std::str::FromStr;

use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use super::{parse_timestamp, parse_uuid};
use crate::errors::{AppError, AppResult};
use crate::models::{BillingType, User};

/// Storage manager for user accounts
#[derive(Clone)]
pub struct UserStore {
    pool: SqlitePool,
}

impl UserStore {
    /// Create a new user store
    #[must_use]
    pub const fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert a new user
    ///
    /// # Errors
    ///
    /// Returns a conflict error if the email is already registered.
    pub async fn create(&self, user: &User) -> AppResult<Uuid> {
        let result = sqlx::query(
            r"
            INSERT INTO users (id, email, display_name, password_hash, credits, billing_type, created_at, last_active, is_active)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            ",
        )
        .bind(user.id.to_string())
        .bind(&user.email)
        .bind(&user.display_name)
        .bind(&user.password_hash)
        .bind(user.credits)
        .bind(user.billing_type.as_str())
        .bind(user.created_at.to_rfc3339())
        .bind(user.last_active.to_rfc3339())
        .bind(user.is_active)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(user.id),
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => Err(AppError::new(
                crate::errors::ErrorCode::ResourceAlreadyExists,
                "An account with this email already exists",
            )),
            Err(e) => Err(e.into()),
        }
    }

    /// Get a user by ID
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn get(&self, user_id: Uuid) -> AppResult<Option<User>> {
        let row = sqlx::query("SELECT * FROM users WHERE id = ?1")
            .bind(user_id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        row.map(|r| row_to_user(&r)).transpose()
    }

    /// Get a user by email
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn get_by_email(&self, email: &str) -> AppResult<Option<User>> {
        let row = sqlx::query("SELECT * FROM users WHERE email = ?1")
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;

        row.map(|r| row_to_user(&r)).transpose()
    }

    /// Update the user's last-active timestamp
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn touch_last_active(&self, user_id: Uuid) -> AppResult<()> {
        sqlx::query("UPDATE users SET last_active = ?1 WHERE id = ?2")
            .bind(chrono::Utc::now().to_rfc3339())
            .bind(user_id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Switch a user's billing model
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn set_billing_type(&self, user_id: Uuid, billing: BillingType) -> AppResult<()> {
        sqlx::query("UPDATE users SET billing_type = ?1 WHERE id = ?2")
            .bind(billing.as_str())
            .bind(user_id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

/// Map a database row to a `User`
fn row_to_user(row: &sqlx::sqlite::SqliteRow) -> AppResult<User> {
    let id: String = row.try_get("id")?;
    let created_at: String = row.try_get("created_at")?;
    let last_active: String = row.try_get("last_active")?;
    let billing_type: String = row.try_get("billing_type")?;

    Ok(User {
        id: parse_uuid(&id)?,
        email: row.try_get("email")?,
        display_name: row.try_get("display_name")?,
        password_hash: row.try_get("password_hash")?,
        credits: row.try_get("credits")?,
        billing_type: BillingType::from_str(&billing_type)?,
        created_at: parse_timestamp(&created_at)?,
        last_active: parse_timestamp(&last_active)?,
        is_active: row.try_get("is_active")?,
    })
}
