// ABOUTME: Integration tests for the credit gate around completion sends
// ABOUTME: Covers pre-check rejection, debit-after-success, race safety, and the audit trail
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Prism Labs

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs)]

mod common;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use common::{create_payg_user, create_test_service, create_test_user, Script};
use prism_chat_server::{
    chat_service::ChatService,
    credits::CreditLedger,
    database::{CreditStore, DebitOutcome},
    errors::{AppError, ErrorCode},
    llm::{ChatRequest, ChatResponse, ChatStream, LlmProvider},
    models::{MessageRole, TransactionType},
};
use uuid::Uuid;

// gpt-4o costs 8, o3-mini costs 6, gpt-4o-mini costs 1 per response.

#[tokio::test]
async fn successful_send_debits_exact_cost() {
    let (db, provider, service) = create_test_service(Script::Reply("Hello there")).await;
    let user = create_test_user(&db, 10).await;

    let outcome = service
        .send(&user, None, Some("gpt-4o"), "First question")
        .await
        .unwrap();

    assert_eq!(outcome.credits_used, 8);
    assert_eq!(outcome.new_balance, 2);
    assert_eq!(outcome.assistant_message.content, "Hello there");
    assert_eq!(outcome.assistant_message.role, MessageRole::Assistant);
    assert_eq!(provider.calls(), 1);

    assert_eq!(db.credits().balance(user.id).await.unwrap(), 2);

    let transactions = db.credits().list_transactions(user.id, 10, 0).await.unwrap();
    assert_eq!(transactions.len(), 1);
    assert_eq!(transactions[0].transaction_type, TransactionType::Usage);
    assert_eq!(transactions[0].amount, -8);
    assert_eq!(transactions[0].balance_after, 2);
    assert_eq!(transactions[0].message_id, Some(outcome.assistant_message.id));
}

#[tokio::test]
async fn send_is_rejected_before_any_state_changes() {
    let (db, provider, service) = create_test_service(Script::Reply("unreachable")).await;
    let user = create_test_user(&db, 5).await;

    let err = service
        .send(&user, None, Some("gpt-4o"), "Too expensive for me")
        .await
        .unwrap_err();

    assert_eq!(err.code, ErrorCode::InsufficientCredits);
    // The aggregator is never contacted and nothing is persisted or debited.
    assert_eq!(provider.calls(), 0);
    assert_eq!(db.credits().balance(user.id).await.unwrap(), 5);
    assert!(db.credits().list_transactions(user.id, 10, 0).await.unwrap().is_empty());
    assert!(db.chats().list_for_user(user.id, 10, 0).await.unwrap().is_empty());
}

#[tokio::test]
async fn rejection_on_existing_chat_appends_nothing() {
    let (db, provider, service) = create_test_service(Script::Reply("cheap")).await;
    let user = create_test_user(&db, 2).await;

    // Default model costs 1; the follow-up asks for a model costing 8.
    let outcome = service.send(&user, None, None, "Affordable").await.unwrap();
    let user = db.users().get(user.id).await.unwrap().unwrap();

    let err = service
        .send(&user, Some(outcome.chat.id), Some("gpt-4o"), "Too rich")
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::InsufficientCredits);

    let messages = db.chats().get_messages(outcome.chat.id).await.unwrap();
    assert_eq!(messages.len(), 2);
    assert_eq!(provider.calls(), 1);
}

#[tokio::test]
async fn content_limit_counts_characters_not_bytes() {
    let (db, _provider, service) = create_test_service(Script::Reply("ok")).await;
    let user = create_test_user(&db, 10).await;

    // 32_000 two-byte characters are exactly at the limit.
    let at_limit = "é".repeat(32_000);
    assert!(service.send(&user, None, None, &at_limit).await.is_ok());

    let over_limit = "é".repeat(32_001);
    let err = service.send(&user, None, None, &over_limit).await.unwrap_err();
    assert_eq!(err.code, ErrorCode::InvalidInput);
}

#[tokio::test]
async fn upstream_failure_never_debits() {
    let (db, provider, service) = create_test_service(Script::Fail("aggregator down")).await;
    let user = create_test_user(&db, 10).await;

    let err = service
        .send(&user, None, Some("gpt-4o"), "Doomed request")
        .await
        .unwrap_err();

    assert_eq!(err.code, ErrorCode::ExternalServiceError);
    assert_eq!(provider.calls(), 1);
    assert_eq!(db.credits().balance(user.id).await.unwrap(), 10);
    assert!(db.credits().list_transactions(user.id, 10, 0).await.unwrap().is_empty());

    // The user message survived but no assistant reply was stored.
    let chats = db.chats().list_for_user(user.id, 10, 0).await.unwrap();
    assert_eq!(chats.len(), 1);
    let messages = db.chats().get_messages(chats[0].id).await.unwrap();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].role, MessageRole::User);
}

/// Provider that simulates a rival send whose debit lands while this
/// request is in flight, after the pre-check has already passed.
struct RivalDebitProvider {
    store: CreditStore,
    user_id: Uuid,
}

#[async_trait]
impl LlmProvider for RivalDebitProvider {
    fn name(&self) -> &'static str {
        "rival"
    }

    async fn complete(&self, request: &ChatRequest) -> Result<ChatResponse, AppError> {
        let outcome = self.store.try_debit(self.user_id, 6).await?;
        assert!(matches!(outcome, DebitOutcome::Applied { new_balance: 4 }));
        Ok(ChatResponse {
            content: "racing".to_owned(),
            model: request.model.clone(),
            usage: None,
            finish_reason: Some("stop".to_owned()),
        })
    }

    async fn complete_stream(&self, _request: &ChatRequest) -> Result<ChatStream, AppError> {
        Err(AppError::internal("buffered-only test provider"))
    }
}

#[tokio::test]
async fn concurrent_sends_cannot_overdraw() {
    let db = common::create_test_database().await;
    let user = create_test_user(&db, 10).await;

    // Both tabs pass the pre-check against a balance of 10, but only one
    // conditional debit of 6 can land. The rival's debit commits while
    // this send waits on the aggregator.
    let provider = Arc::new(RivalDebitProvider {
        store: db.credits(),
        user_id: user.id,
    });
    let ledger = CreditLedger::new(db.credits());
    let service = ChatService::new(db.clone(), ledger, provider);

    let err = service
        .send(&user, None, Some("o3-mini"), "From tab two")
        .await
        .unwrap_err();

    assert_eq!(err.code, ErrorCode::InsufficientCredits);
    // Only the rival's debit applied; the losing turn was rolled back.
    assert_eq!(db.credits().balance(user.id).await.unwrap(), 4);
    let chats = db.chats().list_for_user(user.id, 10, 0).await.unwrap();
    let messages = db.chats().get_messages(chats[0].id).await.unwrap();
    assert!(messages.iter().all(|m| m.role != MessageRole::Assistant));
}

#[tokio::test]
async fn payg_user_bypasses_the_gate_and_accrues_monthly_usage() {
    let (db, provider, service) = create_test_service(Script::Reply("metered")).await;
    let user = create_payg_user(&db, 0).await;

    service.send(&user, None, Some("gpt-4o"), "First").await.unwrap();
    service.send(&user, None, Some("o3-mini"), "Second").await.unwrap();

    assert_eq!(provider.calls(), 2);

    // Usage lands on one row per calendar month, summed across sends.
    let period = Utc::now().format("%Y-%m").to_string();
    assert_eq!(db.credits().monthly_usage(user.id, &period).await.unwrap(), 14);

    let transactions = db.credits().list_transactions(user.id, 10, 0).await.unwrap();
    assert_eq!(transactions.len(), 2);
    assert!(transactions
        .iter()
        .all(|t| t.transaction_type == TransactionType::AutoCharge));
}

#[tokio::test]
async fn transaction_sum_matches_balance_movement() {
    let (db, _provider, service) = create_test_service(Script::Reply("audited")).await;
    let user = create_test_user(&db, 0).await;

    let ledger = CreditLedger::new(db.credits());
    ledger
        .credit(user.id, 25, TransactionType::Bonus, "Signup bonus")
        .await
        .unwrap();

    let user = db.users().get(user.id).await.unwrap().unwrap();
    service.send(&user, None, Some("gpt-4o"), "Spend some").await.unwrap();

    let balance = db.credits().balance(user.id).await.unwrap();
    assert_eq!(balance, 17);
    assert_eq!(db.credits().transaction_sum(user.id).await.unwrap(), balance);
}
