// ABOUTME: Balance, transaction history, checkout, and payment webhook endpoints
// ABOUTME: The webhook verifies its HMAC signature over raw body bytes before parsing
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Prism Labs

//! Credit and payment routes.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::require_user;
use crate::errors::AppError;
use crate::models::{BillingType, CreditTransaction};
use crate::payments::{CreditPlan, WebhookEvent, PLANS};
use crate::server::ServerResources;

/// Default page size for transaction history
const DEFAULT_LIMIT: i64 = 50;

/// Pagination query parameters
#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    /// Maximum rows to return
    #[serde(default)]
    pub limit: Option<i64>,
    /// Rows to skip
    #[serde(default)]
    pub offset: Option<i64>,
}

/// Balance response
#[derive(Debug, Serialize)]
pub struct BalanceResponse {
    /// Current credit balance
    pub credits: i64,
    /// Billing type of the account
    pub billing_type: BillingType,
    /// Credits accrued this month, present for payg accounts
    #[serde(skip_serializing_if = "Option::is_none")]
    pub monthly_usage: Option<i64>,
}

/// Transaction history response
#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    /// Transactions, newest first
    pub transactions: Vec<CreditTransaction>,
}

/// Available plans response
#[derive(Debug, Serialize)]
pub struct PlansResponse {
    /// Purchasable credit bundles
    pub plans: &'static [CreditPlan],
}

/// Request to start a checkout
#[derive(Debug, Deserialize)]
pub struct CheckoutRequest {
    /// Plan to purchase
    pub plan_id: String,
    /// Redirect after successful payment
    pub success_url: String,
    /// Redirect after cancelled payment
    pub cancel_url: String,
}

/// Checkout response
#[derive(Debug, Serialize)]
pub struct CheckoutResponse {
    /// Hosted checkout page URL
    pub checkout_url: String,
}

/// Credit routes handler
pub struct CreditRoutes;

impl CreditRoutes {
    /// Create all credit and payment routes
    pub fn routes(resources: Arc<ServerResources>) -> Router {
        Router::new()
            .route("/api/credits", get(Self::balance))
            .route("/api/credits/transactions", get(Self::history))
            .route("/api/credits/plans", get(Self::plans))
            .route("/api/credits/checkout", post(Self::checkout))
            .route("/api/webhooks/payments", post(Self::payment_webhook))
            .with_state(resources)
    }

    async fn balance(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
    ) -> Result<Json<BalanceResponse>, AppError> {
        let user = require_user(&headers, &resources).await?;
        let credits = resources.ledger.store().balance(user.id).await?;

        let monthly_usage = if user.billing_type == BillingType::Payg {
            let period = Utc::now().format("%Y-%m").to_string();
            Some(resources.ledger.store().monthly_usage(user.id, &period).await?)
        } else {
            None
        };

        Ok(Json(BalanceResponse {
            credits,
            billing_type: user.billing_type,
            monthly_usage,
        }))
    }

    async fn history(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Query(query): Query<HistoryQuery>,
    ) -> Result<Json<HistoryResponse>, AppError> {
        let user = require_user(&headers, &resources).await?;
        let transactions = resources
            .ledger
            .store()
            .list_transactions(
                user.id,
                query.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, 200),
                query.offset.unwrap_or(0).max(0),
            )
            .await?;
        Ok(Json(HistoryResponse { transactions }))
    }

    async fn plans(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
    ) -> Result<Json<PlansResponse>, AppError> {
        require_user(&headers, &resources).await?;
        Ok(Json(PlansResponse { plans: PLANS }))
    }

    async fn checkout(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Json(request): Json<CheckoutRequest>,
    ) -> Result<Json<CheckoutResponse>, AppError> {
        let user = require_user(&headers, &resources).await?;
        let checkout_url = resources
            .payments
            .create_checkout(
                user.id,
                &request.plan_id,
                &request.success_url,
                &request.cancel_url,
            )
            .await?;
        Ok(Json(CheckoutResponse { checkout_url }))
    }

    /// Inbound payment processor webhook
    ///
    /// Authenticated by signature, not by session. The raw body is verified
    /// before any parsing, and crediting is idempotent per event id.
    async fn payment_webhook(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        body: Bytes,
    ) -> Result<StatusCode, AppError> {
        let signature = headers
            .get("x-webhook-signature")
            .and_then(|h| h.to_str().ok())
            .ok_or_else(|| {
                warn!("Webhook delivery without signature header");
                AppError::auth_invalid("Missing webhook signature")
            })?;

        resources.payments.verify_signature(&body, signature)?;

        let event: WebhookEvent = serde_json::from_slice(&body)
            .map_err(|e| AppError::invalid_input(format!("Malformed webhook payload: {e}")))?;

        resources.payments.handle_event(&event).await?;
        Ok(StatusCode::OK)
    }
}
