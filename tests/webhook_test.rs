// ABOUTME: Integration tests for payment webhook handling
// ABOUTME: Covers signature verification, crediting, and delivery idempotency
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Prism Labs

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs)]

mod common;

use common::{create_test_database, create_test_user};
use prism_chat_server::{
    auth::hash_password,
    config::PaymentConfig,
    database::Database,
    models::{TransactionType, User},
    payments::{PaymentProcessor, WebhookEvent, WebhookEventData},
};

fn test_processor(db: &Database) -> PaymentProcessor {
    let config = PaymentConfig {
        base_url: "https://payments.invalid".to_owned(),
        api_key: "test-key".to_owned(),
        webhook_secret: "test-webhook-secret".to_owned(),
    };
    PaymentProcessor::new(config, db.payments()).unwrap()
}

fn checkout_completed(event_id: &str, user_id: uuid::Uuid, plan_id: &str) -> WebhookEvent {
    WebhookEvent {
        id: event_id.to_owned(),
        event_type: "checkout.completed".to_owned(),
        data: WebhookEventData {
            client_reference: user_id.to_string(),
            plan_id: plan_id.to_owned(),
        },
    }
}

#[tokio::test]
async fn completed_checkout_credits_the_plan() {
    let db = create_test_database().await;
    let user = create_test_user(&db, 10).await;
    let processor = test_processor(&db);

    processor
        .handle_event(&checkout_completed("evt_001", user.id, "starter"))
        .await
        .unwrap();

    assert_eq!(db.credits().balance(user.id).await.unwrap(), 110);
    let transactions = db.credits().list_transactions(user.id, 10, 0).await.unwrap();
    assert_eq!(transactions.len(), 1);
    assert_eq!(transactions[0].transaction_type, TransactionType::Purchase);
    assert_eq!(transactions[0].amount, 100);
}

#[tokio::test]
async fn redelivered_event_credits_only_once() {
    let db = create_test_database().await;
    let user = create_test_user(&db, 0).await;
    let processor = test_processor(&db);
    let event = checkout_completed("evt_dup", user.id, "plus");

    processor.handle_event(&event).await.unwrap();
    // The processor retries delivery; the event id has already been claimed.
    processor.handle_event(&event).await.unwrap();

    assert_eq!(db.credits().balance(user.id).await.unwrap(), 500);
    let transactions = db.credits().list_transactions(user.id, 10, 0).await.unwrap();
    assert_eq!(transactions.len(), 1);
}

#[tokio::test]
async fn distinct_events_each_credit() {
    let db = create_test_database().await;
    let user = create_test_user(&db, 0).await;
    let processor = test_processor(&db);

    processor
        .handle_event(&checkout_completed("evt_a", user.id, "starter"))
        .await
        .unwrap();
    processor
        .handle_event(&checkout_completed("evt_b", user.id, "starter"))
        .await
        .unwrap();

    assert_eq!(db.credits().balance(user.id).await.unwrap(), 200);
}

#[tokio::test]
async fn unrelated_event_types_are_ignored() {
    let db = create_test_database().await;
    let user = create_test_user(&db, 0).await;
    let processor = test_processor(&db);

    let mut event = checkout_completed("evt_other", user.id, "starter");
    event.event_type = "checkout.expired".to_owned();
    processor.handle_event(&event).await.unwrap();

    assert_eq!(db.credits().balance(user.id).await.unwrap(), 0);
    assert!(db.credits().list_transactions(user.id, 10, 0).await.unwrap().is_empty());
}

#[tokio::test]
async fn failed_grant_releases_the_event_claim() {
    let db = create_test_database().await;
    let processor = test_processor(&db);

    // No account exists for this id yet, so the grant inside the claim
    // transaction fails and rolls the claim back with it.
    let orphan_id = uuid::Uuid::new_v4();
    let event = checkout_completed("evt_retry", orphan_id, "starter");
    assert!(processor.handle_event(&event).await.is_err());

    let mut user = User::new(
        format!("retry-{orphan_id}@example.com"),
        hash_password("test-password-123").unwrap(),
        None,
        0,
    );
    user.id = orphan_id;
    db.users().create(&user).await.unwrap();

    // Redelivery of the same event id now succeeds: the claim was released.
    processor.handle_event(&event).await.unwrap();
    assert_eq!(db.credits().balance(orphan_id).await.unwrap(), 100);
}

#[tokio::test]
async fn unknown_plan_is_rejected() {
    let db = create_test_database().await;
    let user = create_test_user(&db, 0).await;
    let processor = test_processor(&db);

    let err = processor
        .handle_event(&checkout_completed("evt_bad", user.id, "platinum"))
        .await
        .unwrap_err();
    assert!(err.message.contains("platinum"));
    assert_eq!(db.credits().balance(user.id).await.unwrap(), 0);
}
