// ABOUTME: Database management for the multi-tenant chat server
// ABOUTME: Owns the SQLite pool, in-code migrations, and per-concern manager accessors
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Prism Labs

//! # Database Management
//!
//! SQLite-backed storage for users, chats, messages, preferences, credit
//! transactions, workspace containers, prompt templates, and the payment
//! idempotency ledger. The schema is created by in-code migrations at
//! startup; every table that stores user-owned rows carries a `user_id`
//! column checked by the tenant guard.

/// Chat and message storage
pub mod chats;
/// Credit balance, transaction log, and monthly usage storage
pub mod credits;
/// Payment idempotency ledger
pub mod payments;
/// Preference record storage
pub mod preferences;
/// Prompt template storage
pub mod templates;
/// User account storage
pub mod users;
/// Project and folder storage
pub mod workspace;

pub use chats::ChatStore;
pub use credits::{CreditStore, DebitOutcome};
pub use payments::PaymentStore;
pub use preferences::PreferenceStore;
pub use templates::TemplateStore;
pub use users::UserStore;
pub use workspace::WorkspaceStore;

use chrono::{DateTime, Utc};
use sqlx::sqlite::SqlitePool;
use uuid::Uuid;

use crate::errors::{AppError, AppResult};

/// Parse a TEXT column holding a UUID
pub(crate) fn parse_uuid(value: &str) -> AppResult<Uuid> {
    Uuid::parse_str(value)
        .map_err(|e| AppError::database(format!("Invalid UUID in database: {e}")))
}

/// Parse a TEXT column holding an RFC 3339 timestamp
pub(crate) fn parse_timestamp(value: &str) -> AppResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| AppError::database(format!("Invalid timestamp in database: {e}")))
}

/// Database handle owning the connection pool
///
/// Cheap to clone; all managers share the same pool.
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Open a database connection and run migrations
    ///
    /// # Errors
    ///
    /// Returns an error if the connection or any migration fails.
    pub async fn new(database_url: &str) -> AppResult<Self> {
        // Ensure SQLite creates the database file if it doesn't exist
        let connection_options = if database_url.starts_with("sqlite:")
            && !database_url.contains(":memory:")
            && !database_url.contains('?')
        {
            format!("{database_url}?mode=rwc")
        } else {
            database_url.to_owned()
        };

        let pool = SqlitePool::connect(&connection_options).await?;

        let db = Self { pool };
        db.migrate().await?;

        Ok(db)
    }

    /// Access the underlying connection pool
    #[must_use]
    pub const fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// User account storage
    #[must_use]
    pub fn users(&self) -> UserStore {
        UserStore::new(self.pool.clone())
    }

    /// Chat and message storage
    #[must_use]
    pub fn chats(&self) -> ChatStore {
        ChatStore::new(self.pool.clone())
    }

    /// Credit ledger storage
    #[must_use]
    pub fn credits(&self) -> CreditStore {
        CreditStore::new(self.pool.clone())
    }

    /// Preference record storage
    #[must_use]
    pub fn preferences(&self) -> PreferenceStore {
        PreferenceStore::new(self.pool.clone())
    }

    /// Project and folder storage
    #[must_use]
    pub fn workspace(&self) -> WorkspaceStore {
        WorkspaceStore::new(self.pool.clone())
    }

    /// Prompt template storage
    #[must_use]
    pub fn templates(&self) -> TemplateStore {
        TemplateStore::new(self.pool.clone())
    }

    /// Payment idempotency ledger
    #[must_use]
    pub fn payments(&self) -> PaymentStore {
        PaymentStore::new(self.pool.clone())
    }

    /// Lightweight connectivity check for the health endpoint
    ///
    /// # Errors
    ///
    /// Returns an error if the database is unreachable.
    pub async fn ping(&self) -> AppResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    /// Run database migrations
    async fn migrate(&self) -> AppResult<()> {
        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS users (
                id TEXT PRIMARY KEY,
                email TEXT UNIQUE NOT NULL,
                display_name TEXT,
                password_hash TEXT NOT NULL,
                credits INTEGER NOT NULL DEFAULT 0,
                billing_type TEXT NOT NULL DEFAULT 'prepaid'
                    CHECK (billing_type IN ('prepaid', 'payg')),
                created_at TEXT NOT NULL,
                last_active TEXT NOT NULL,
                is_active BOOLEAN NOT NULL DEFAULT 1
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_users_email ON users(email)")
            .execute(&self.pool)
            .await?;

        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS user_preferences (
                user_id TEXT PRIMARY KEY REFERENCES users(id) ON DELETE CASCADE,
                base_tone TEXT
                    CHECK (base_tone IN ('formal', 'friendly', 'concise', 'detailed')),
                additional_preferences TEXT,
                nickname TEXT,
                occupation TEXT,
                interests TEXT,
                core_values TEXT,
                communication_preferences TEXT,
                allow_saved_memory BOOLEAN NOT NULL DEFAULT 1,
                allow_reference_history BOOLEAN NOT NULL DEFAULT 1,
                updated_at TEXT NOT NULL
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS projects (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                name TEXT NOT NULL,
                description TEXT,
                created_at TEXT NOT NULL
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS folders (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                name TEXT NOT NULL,
                created_at TEXT NOT NULL
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS chats (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                project_id TEXT REFERENCES projects(id) ON DELETE SET NULL,
                folder_id TEXT REFERENCES folders(id) ON DELETE SET NULL,
                model TEXT NOT NULL,
                title TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_chats_user_id ON chats(user_id)")
            .execute(&self.pool)
            .await?;

        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS messages (
                id TEXT PRIMARY KEY,
                chat_id TEXT NOT NULL REFERENCES chats(id) ON DELETE CASCADE,
                role TEXT NOT NULL CHECK (role IN ('system', 'user', 'assistant')),
                content TEXT NOT NULL,
                credits_used INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_messages_chat_id ON messages(chat_id)")
            .execute(&self.pool)
            .await?;

        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS credit_transactions (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                transaction_type TEXT NOT NULL
                    CHECK (transaction_type IN ('purchase', 'usage', 'refund', 'bonus', 'auto_charge')),
                amount INTEGER NOT NULL,
                balance_after INTEGER NOT NULL,
                message_id TEXT REFERENCES messages(id) ON DELETE SET NULL,
                description TEXT NOT NULL,
                created_at TEXT NOT NULL
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_transactions_user_id ON credit_transactions(user_id)",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS monthly_usage (
                user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                period TEXT NOT NULL,
                credits_used INTEGER NOT NULL DEFAULT 0,
                updated_at TEXT NOT NULL,
                PRIMARY KEY (user_id, period)
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS prompt_templates (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                title TEXT NOT NULL,
                content TEXT NOT NULL,
                is_public BOOLEAN NOT NULL DEFAULT 0,
                usage_count INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_templates_user_id ON prompt_templates(user_id)",
        )
        .execute(&self.pool)
        .await?;

        // Processed payment events: webhook deliveries are at-least-once, so
        // replays must be detectable before crediting.
        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS processed_payment_events (
                event_id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                credits_granted INTEGER NOT NULL,
                processed_at TEXT NOT NULL
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
