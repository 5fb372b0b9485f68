// ABOUTME: Credit ledger service enforcing check-before-call and debit-after-success
// ABOUTME: Prepaid accounts gate on balance; payg accounts accrue a monthly counter
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Prism Labs

//! # Credit Ledger
//!
//! The ledger stands between the chat pipeline and the user's balance. Its
//! central invariant: no upstream call that could incur liability is made on
//! insufficient balance, and a debit only ever follows a fully completed
//! response. Every debit writes exactly one immutable `usage` transaction
//! with the post-debit balance snapshot, so replaying a user's transactions
//! from zero reproduces their current balance.

use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::database::{CreditStore, DebitOutcome};
use crate::errors::{AppError, AppResult};
use crate::models::{BillingType, TransactionType, User};

/// Outcome of a successful post-completion charge
#[derive(Debug, Clone, Copy)]
pub struct ChargeReceipt {
    /// Credits debited for this response
    pub credits_used: i64,
    /// Balance after the debit (prepaid) or current balance (payg)
    pub new_balance: i64,
}

/// Service wrapper applying billing policy on top of [`CreditStore`]
#[derive(Clone)]
pub struct CreditLedger {
    store: CreditStore,
}

impl CreditLedger {
    /// Create a ledger over a credit store
    #[must_use]
    pub const fn new(store: CreditStore) -> Self {
        Self { store }
    }

    /// Access to the underlying store for balance and history reads
    #[must_use]
    pub const fn store(&self) -> &CreditStore {
        &self.store
    }

    /// Reject before any upstream call when a prepaid balance cannot cover `cost`
    ///
    /// Pay-as-you-go accounts bypass the gate; their usage is billed
    /// out-of-band from the monthly counter.
    ///
    /// # Errors
    ///
    /// Returns an insufficient-credits error stating the shortfall.
    pub async fn ensure_sufficient(&self, user: &User, cost: i64) -> AppResult<()> {
        if user.billing_type == BillingType::Payg {
            return Ok(());
        }

        let balance = self.store.balance(user.id).await?;
        if balance < cost {
            warn!(
                user_id = %user.id,
                balance,
                cost,
                "Rejecting send on insufficient balance"
            );
            return Err(AppError::insufficient_credits(cost, balance));
        }
        Ok(())
    }

    /// Charge a user for one completed response
    ///
    /// Called only after the response content has fully arrived (and, for
    /// streams, been persisted). Prepaid accounts debit through a single
    /// conditional UPDATE, so a concurrent send that spent the balance since
    /// the pre-check fails here instead of overdrawing. Payg accounts skip
    /// the balance entirely and upsert the `YYYY-MM` usage counter.
    ///
    /// # Errors
    ///
    /// Returns an insufficient-credits error if the balance no longer covers
    /// the cost, or a database error.
    pub async fn charge(
        &self,
        user: &User,
        cost: i64,
        message_id: Option<Uuid>,
        description: &str,
    ) -> AppResult<ChargeReceipt> {
        if user.billing_type == BillingType::Payg {
            let period = Utc::now().format("%Y-%m").to_string();
            self.store
                .record_monthly_usage(user.id, &period, cost)
                .await?;
            let balance = self.store.balance(user.id).await?;
            self.store
                .record_transaction(
                    user.id,
                    TransactionType::AutoCharge,
                    -cost,
                    balance,
                    message_id,
                    description,
                )
                .await?;
            info!(user_id = %user.id, cost, period, "Accrued payg usage");
            return Ok(ChargeReceipt {
                credits_used: cost,
                new_balance: balance,
            });
        }

        match self.store.try_debit(user.id, cost).await? {
            DebitOutcome::Applied { new_balance } => {
                self.store
                    .record_transaction(
                        user.id,
                        TransactionType::Usage,
                        -cost,
                        new_balance,
                        message_id,
                        description,
                    )
                    .await?;
                info!(user_id = %user.id, cost, new_balance, "Debited credits");
                Ok(ChargeReceipt {
                    credits_used: cost,
                    new_balance,
                })
            }
            DebitOutcome::InsufficientBalance { available } => {
                // A concurrent send consumed the balance between pre-check
                // and debit. The conditional UPDATE left it untouched.
                warn!(
                    user_id = %user.id,
                    available,
                    cost,
                    "Debit lost the race; balance unchanged"
                );
                Err(AppError::insufficient_credits(cost, available))
            }
        }
    }

    /// Credit purchased or granted credits and record the transaction
    ///
    /// # Errors
    ///
    /// Returns a database error if the update fails.
    pub async fn credit(
        &self,
        user_id: Uuid,
        amount: i64,
        transaction_type: TransactionType,
        description: &str,
    ) -> AppResult<i64> {
        let new_balance = self.store.add(user_id, amount).await?;
        self.store
            .record_transaction(user_id, transaction_type, amount, new_balance, None, description)
            .await?;
        info!(user_id = %user_id, amount, new_balance, ?transaction_type, "Credited account");
        Ok(new_balance)
    }
}
