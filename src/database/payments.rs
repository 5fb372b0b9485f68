// ABOUTME: Processed payment event ledger for webhook idempotency
// ABOUTME: At-least-once webhook delivery must never double-credit a purchase
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Prism Labs

//! Payment idempotency ledger.
//!
//! The payment processor delivers webhooks at-least-once. Claiming the event
//! id and granting the credits happen in one transaction: a replay fails the
//! claim and becomes a no-op, while a failed grant rolls the claim back so a
//! redelivery can retry.

use chrono::Utc;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::errors::AppResult;
use crate::models::TransactionType;

/// Storage manager for processed payment events
#[derive(Clone)]
pub struct PaymentStore {
    pool: SqlitePool,
}

impl PaymentStore {
    /// Create a new payment store
    #[must_use]
    pub const fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Claim a payment event id and grant its credits, atomically
    ///
    /// Returns the new balance for a first delivery, or `None` for a replay.
    /// The claim uses `INSERT OR IGNORE` on the primary key so concurrent
    /// replays race safely: exactly one delivery observes a fresh claim. All
    /// three statements run in one transaction; if the grant fails the claim
    /// rolls back with it, leaving the event open for redelivery.
    ///
    /// # Errors
    ///
    /// Returns an error if the user does not exist or a query fails. No
    /// claim survives a failed grant.
    pub async fn claim_and_credit(
        &self,
        event_id: &str,
        user_id: Uuid,
        credits: i64,
        description: &str,
    ) -> AppResult<Option<i64>> {
        let mut tx = self.pool.begin().await?;

        let claimed = sqlx::query(
            r"
            INSERT OR IGNORE INTO processed_payment_events
                (event_id, user_id, credits_granted, processed_at)
            VALUES (?1, ?2, ?3, ?4)
            ",
        )
        .bind(event_id)
        .bind(user_id.to_string())
        .bind(credits)
        .bind(Utc::now().to_rfc3339())
        .execute(&mut *tx)
        .await?;

        if claimed.rows_affected() == 0 {
            return Ok(None);
        }

        sqlx::query("UPDATE users SET credits = credits + ?1 WHERE id = ?2")
            .bind(credits)
            .bind(user_id.to_string())
            .execute(&mut *tx)
            .await?;

        let row = sqlx::query("SELECT credits FROM users WHERE id = ?1")
            .bind(user_id.to_string())
            .fetch_one(&mut *tx)
            .await?;
        let new_balance: i64 = row.try_get("credits")?;

        sqlx::query(
            r"
            INSERT INTO credit_transactions
                (id, user_id, transaction_type, amount, balance_after, message_id, description, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            ",
        )
        .bind(Uuid::new_v4().to_string())
        .bind(user_id.to_string())
        .bind(TransactionType::Purchase.as_str())
        .bind(credits)
        .bind(new_balance)
        .bind(Option::<String>::None)
        .bind(description)
        .bind(Utc::now().to_rfc3339())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(Some(new_balance))
    }
}
