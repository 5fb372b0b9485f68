// ABOUTME: Credit balance, transaction log, and monthly usage storage
// ABOUTME: Debits use an atomic conditional decrement so concurrent sends cannot over-spend
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Prism Labs

//! Credit ledger storage.
//!
//! The balance is a shared mutable per-user resource. The debit path never
//! reads-then-writes: it issues a single conditional `UPDATE ... WHERE
//! credits >= amount` and checks the affected-row count, so two concurrent
//! sends against the same account can never both spend the same credits.

use std::str::FromStr;

use chrono::Utc;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use super::{parse_timestamp, parse_uuid};
use crate::errors::AppResult;
use crate::models::{CreditTransaction, TransactionType};

/// Outcome of an attempted conditional debit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebitOutcome {
    /// Debit applied; carries the post-debit balance
    Applied {
        /// Balance after the debit committed
        new_balance: i64,
    },
    /// Balance was below the requested amount; nothing changed
    InsufficientBalance {
        /// Balance observed after the failed attempt
        available: i64,
    },
}

/// Storage manager for the credit ledger
#[derive(Clone)]
pub struct CreditStore {
    pool: SqlitePool,
}

impl CreditStore {
    /// Create a new credit store
    #[must_use]
    pub const fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Current balance for a user
    ///
    /// # Errors
    ///
    /// Returns an error if the user does not exist or the query fails.
    pub async fn balance(&self, user_id: Uuid) -> AppResult<i64> {
        let row = sqlx::query("SELECT credits FROM users WHERE id = ?1")
            .bind(user_id.to_string())
            .fetch_one(&self.pool)
            .await?;
        Ok(row.try_get("credits")?)
    }

    /// Atomically debit `amount` credits if and only if the balance covers it
    ///
    /// Single conditional UPDATE; the affected-row count decides the outcome.
    /// This is the serialization point that closes the concurrent-send race.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn try_debit(&self, user_id: Uuid, amount: i64) -> AppResult<DebitOutcome> {
        let result = sqlx::query(
            "UPDATE users SET credits = credits - ?1 WHERE id = ?2 AND credits >= ?1",
        )
        .bind(amount)
        .bind(user_id.to_string())
        .execute(&self.pool)
        .await?;

        let available = self.balance(user_id).await?;
        if result.rows_affected() > 0 {
            Ok(DebitOutcome::Applied {
                new_balance: available,
            })
        } else {
            Ok(DebitOutcome::InsufficientBalance { available })
        }
    }

    /// Add credits to a user's balance (purchase, refund, bonus, auto charge)
    ///
    /// # Errors
    ///
    /// Returns an error if the user does not exist or the query fails.
    pub async fn add(&self, user_id: Uuid, amount: i64) -> AppResult<i64> {
        sqlx::query("UPDATE users SET credits = credits + ?1 WHERE id = ?2")
            .bind(amount)
            .bind(user_id.to_string())
            .execute(&self.pool)
            .await?;
        self.balance(user_id).await
    }

    /// Record an immutable transaction row
    ///
    /// # Errors
    ///
    /// Returns an error if the insert fails.
    pub async fn record_transaction(
        &self,
        user_id: Uuid,
        transaction_type: TransactionType,
        amount: i64,
        balance_after: i64,
        message_id: Option<Uuid>,
        description: &str,
    ) -> AppResult<CreditTransaction> {
        let transaction = CreditTransaction {
            id: Uuid::new_v4(),
            user_id,
            transaction_type,
            amount,
            balance_after,
            message_id,
            description: description.to_owned(),
            created_at: Utc::now(),
        };

        sqlx::query(
            r"
            INSERT INTO credit_transactions
                (id, user_id, transaction_type, amount, balance_after, message_id, description, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            ",
        )
        .bind(transaction.id.to_string())
        .bind(transaction.user_id.to_string())
        .bind(transaction.transaction_type.as_str())
        .bind(transaction.amount)
        .bind(transaction.balance_after)
        .bind(transaction.message_id.map(|id| id.to_string()))
        .bind(&transaction.description)
        .bind(transaction.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(transaction)
    }

    /// List a user's transactions, newest first
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn list_transactions(
        &self,
        user_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> AppResult<Vec<CreditTransaction>> {
        let rows = sqlx::query(
            r"
            SELECT * FROM credit_transactions
            WHERE user_id = ?1
            ORDER BY created_at DESC, rowid DESC
            LIMIT ?2 OFFSET ?3
            ",
        )
        .bind(user_id.to_string())
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_transaction).collect()
    }

    /// Sum of all transaction amounts for a user, in creation order from 0
    ///
    /// Auditability contract: this equals the current balance minus any
    /// out-of-band adjustments.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn transaction_sum(&self, user_id: Uuid) -> AppResult<i64> {
        let row = sqlx::query(
            "SELECT COALESCE(SUM(amount), 0) AS total FROM credit_transactions WHERE user_id = ?1",
        )
        .bind(user_id.to_string())
        .fetch_one(&self.pool)
        .await?;
        Ok(row.try_get("total")?)
    }

    /// Upsert the monthly usage counter for a payg user
    ///
    /// First usage in a month creates the row; later usage increments it.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn record_monthly_usage(
        &self,
        user_id: Uuid,
        period: &str,
        amount: i64,
    ) -> AppResult<()> {
        sqlx::query(
            r"
            INSERT INTO monthly_usage (user_id, period, credits_used, updated_at)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT (user_id, period)
            DO UPDATE SET credits_used = credits_used + excluded.credits_used,
                          updated_at = excluded.updated_at
            ",
        )
        .bind(user_id.to_string())
        .bind(period)
        .bind(amount)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Read the monthly usage counter for a user and period
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn monthly_usage(&self, user_id: Uuid, period: &str) -> AppResult<i64> {
        let row = sqlx::query(
            "SELECT credits_used FROM monthly_usage WHERE user_id = ?1 AND period = ?2",
        )
        .bind(user_id.to_string())
        .bind(period)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(r) => Ok(r.try_get("credits_used")?),
            None => Ok(0),
        }
    }
}

/// Map a database row to a `CreditTransaction`
fn row_to_transaction(row: &sqlx::sqlite::SqliteRow) -> AppResult<CreditTransaction> {
    let id: String = row.try_get("id")?;
    let user_id: String = row.try_get("user_id")?;
    let transaction_type: String = row.try_get("transaction_type")?;
    let message_id: Option<String> = row.try_get("message_id")?;
    let created_at: String = row.try_get("created_at")?;

    Ok(CreditTransaction {
        id: parse_uuid(&id)?,
        user_id: parse_uuid(&user_id)?,
        transaction_type: TransactionType::from_str(&transaction_type)?,
        amount: row.try_get("amount")?,
        balance_after: row.try_get("balance_after")?,
        message_id: message_id.as_deref().map(parse_uuid).transpose()?,
        description: row.try_get("description")?,
        created_at: parse_timestamp(&created_at)?,
    })
}
