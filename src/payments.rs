// ABOUTME: Hosted checkout creation and signed webhook processing for credit purchases
// ABOUTME: Webhook handling is idempotent; replayed events never double-credit
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Prism Labs

//! # Payments
//!
//! Credits are purchased through a hosted checkout page. The processor
//! notifies us of completed checkouts over a webhook signed with a shared
//! HMAC-SHA256 secret. Delivery is at-least-once, so every event id is
//! claimed in a processed-events table before crediting; a replayed event
//! finds its id already claimed and is acknowledged without a second credit.

use reqwest::Client;
use ring::hmac;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::config::PaymentConfig;
use crate::database::PaymentStore;
use crate::errors::{AppError, AppResult, ErrorCode};

const CONNECT_TIMEOUT_SECS: u64 = 10;
const REQUEST_TIMEOUT_SECS: u64 = 30;

// ============================================================================
// Plans
// ============================================================================

/// A purchasable credit bundle
#[derive(Debug, Clone, Copy, Serialize)]
pub struct CreditPlan {
    /// Plan identifier sent to the processor
    pub id: &'static str,
    /// Credits granted on completed checkout
    pub credits: i64,
    /// Price in cents, for display
    pub price_cents: i64,
}

/// Plans offered for purchase
pub const PLANS: &[CreditPlan] = &[
    CreditPlan {
        id: "starter",
        credits: 100,
        price_cents: 500,
    },
    CreditPlan {
        id: "plus",
        credits: 500,
        price_cents: 2000,
    },
    CreditPlan {
        id: "pro",
        credits: 1500,
        price_cents: 5000,
    },
];

/// Look up a plan by id
///
/// # Errors
///
/// Returns a validation error for an unknown plan id.
pub fn plan_by_id(plan_id: &str) -> AppResult<&'static CreditPlan> {
    PLANS
        .iter()
        .find(|plan| plan.id == plan_id)
        .ok_or_else(|| AppError::invalid_input(format!("Unknown credit plan: {plan_id}")))
}

// ============================================================================
// Wire types
// ============================================================================

#[derive(Debug, Serialize)]
struct CheckoutRequest<'a> {
    plan_id: &'a str,
    client_reference: String,
    success_url: &'a str,
    cancel_url: &'a str,
}

#[derive(Debug, Deserialize)]
struct CheckoutResponse {
    checkout_url: String,
}

/// An inbound webhook event from the payment processor
#[derive(Debug, Deserialize)]
pub struct WebhookEvent {
    /// Processor-assigned event id, unique per delivery attempt group
    pub id: String,
    /// Event type, e.g. `checkout.completed`
    #[serde(rename = "type")]
    pub event_type: String,
    /// Event payload
    pub data: WebhookEventData,
}

/// Payload of a checkout event
#[derive(Debug, Deserialize)]
pub struct WebhookEventData {
    /// Our user id, echoed back from the client reference
    pub client_reference: String,
    /// Plan that was purchased
    pub plan_id: String,
}

// ============================================================================
// Processor
// ============================================================================

/// Checkout creation and webhook handling
#[derive(Clone)]
pub struct PaymentProcessor {
    client: Client,
    config: PaymentConfig,
    store: PaymentStore,
}

impl PaymentProcessor {
    /// Create a processor from configuration and storage
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn new(config: PaymentConfig, store: PaymentStore) -> AppResult<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| AppError::internal(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            config,
            store,
        })
    }

    /// Create a hosted checkout session and return its URL
    ///
    /// # Errors
    ///
    /// Returns a validation error for an unknown plan, or an upstream failure
    /// if the processor cannot be reached.
    pub async fn create_checkout(
        &self,
        user_id: Uuid,
        plan_id: &str,
        success_url: &str,
        cancel_url: &str,
    ) -> AppResult<String> {
        let plan = plan_by_id(plan_id)?;

        let body = CheckoutRequest {
            plan_id: plan.id,
            client_reference: user_id.to_string(),
            success_url,
            cancel_url,
        };

        let response = self
            .client
            .post(format!(
                "{}/checkout/sessions",
                self.config.base_url.trim_end_matches('/')
            ))
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                error!("Failed to reach payment processor: {e}");
                AppError::new(
                    ErrorCode::ExternalServiceUnavailable,
                    "Payment processor is unreachable",
                )
            })?;

        let status = response.status();
        let text = response.text().await.map_err(|e| {
            AppError::external_service("payments", format!("Failed to read response: {e}"))
        })?;

        if !status.is_success() {
            error!(%status, "Checkout creation failed");
            return Err(AppError::external_service(
                "payments",
                format!("Checkout creation failed ({status})"),
            ));
        }

        let parsed: CheckoutResponse = serde_json::from_str(&text).map_err(|e| {
            AppError::external_service("payments", format!("Failed to parse response: {e}"))
        })?;

        info!(user_id = %user_id, plan = plan.id, "Created checkout session");
        Ok(parsed.checkout_url)
    }

    /// Verify a webhook signature over the raw request body
    ///
    /// # Errors
    ///
    /// Returns an authentication error for a malformed or mismatched
    /// signature.
    pub fn verify_signature(&self, body: &[u8], signature_hex: &str) -> AppResult<()> {
        verify_webhook_signature(&self.config.webhook_secret, body, signature_hex)
    }

    /// Process a verified webhook event, crediting at most once per event id
    ///
    /// # Errors
    ///
    /// Returns a validation error for malformed events or a database error.
    pub async fn handle_event(&self, event: &WebhookEvent) -> AppResult<()> {
        if event.event_type != "checkout.completed" {
            info!(event_type = %event.event_type, "Ignoring webhook event type");
            return Ok(());
        }

        let user_id = Uuid::parse_str(&event.data.client_reference).map_err(|_| {
            AppError::invalid_input("Webhook client_reference is not a valid user id")
        })?;
        let plan = plan_by_id(&event.data.plan_id)?;

        // Claim and credit commit together. A replayed delivery loses the
        // claim and is acknowledged without touching the balance; a failed
        // grant rolls the claim back so redelivery retries it.
        let Some(new_balance) = self
            .store
            .claim_and_credit(
                &event.id,
                user_id,
                plan.credits,
                &format!("Purchased {} plan", plan.id),
            )
            .await?
        else {
            warn!(event_id = %event.id, "Replayed webhook event; already credited");
            return Ok(());
        };

        info!(
            user_id = %user_id,
            event_id = %event.id,
            credits = plan.credits,
            new_balance,
            "Credited completed checkout"
        );
        Ok(())
    }
}

/// Verify an HMAC-SHA256 hex signature over exact body bytes
///
/// The processor signs each delivery with the shared secret and sends the
/// hex digest in a header. Verification happens before the body is parsed.
///
/// # Errors
///
/// Returns an authentication error for a malformed or mismatched signature.
pub fn verify_webhook_signature(
    secret: &str,
    body: &[u8],
    signature_hex: &str,
) -> AppResult<()> {
    let expected = hex::decode(signature_hex.trim())
        .map_err(|_| AppError::auth_invalid("Webhook signature is not valid hex"))?;

    let key = hmac::Key::new(hmac::HMAC_SHA256, secret.as_bytes());
    hmac::verify(&key, body, &expected)
        .map_err(|_| AppError::auth_invalid("Webhook signature verification failed"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plan_lookup() {
        assert!(plan_by_id("starter").is_ok());
        assert!(plan_by_id("enterprise").is_err());
    }

    #[test]
    fn test_signature_round_trip() {
        let secret = "whsec_test";
        let body = br#"{"id":"evt_1"}"#;
        let key = hmac::Key::new(hmac::HMAC_SHA256, secret.as_bytes());
        let tag = hex::encode(hmac::sign(&key, body).as_ref());

        assert!(verify_webhook_signature(secret, body, &tag).is_ok());
        assert!(verify_webhook_signature(secret, body, &hex::encode([0u8; 32])).is_err());
        assert!(verify_webhook_signature(secret, body, "not hex").is_err());
    }

    #[test]
    fn test_signature_covers_exact_body_bytes() {
        let secret = "whsec_test";
        let key = hmac::Key::new(hmac::HMAC_SHA256, secret.as_bytes());
        let tag = hex::encode(hmac::sign(&key, br#"{"id":"evt_1"}"#).as_ref());

        assert!(verify_webhook_signature(secret, br#"{"id":"evt_2"}"#, &tag).is_err());
    }
}
