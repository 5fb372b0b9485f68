// ABOUTME: Integration tests for cross-tenant access checks
// ABOUTME: Foreign resources fail with a uniform access-denied error
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Prism Labs

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs)]

mod common;

use common::{create_test_service, create_test_user, Script};
use prism_chat_server::{
    errors::ErrorCode,
    models::MessageRole,
    tenant::{assert_owned, assert_template_readable},
};

#[tokio::test]
async fn sending_into_a_foreign_chat_is_denied() {
    let (db, provider, service) = create_test_service(Script::Reply("private")).await;
    let owner = create_test_user(&db, 50).await;
    let intruder = create_test_user(&db, 50).await;

    let outcome = service
        .send(&owner, None, None, "Owner's opening message")
        .await
        .unwrap();

    let err = service
        .send(&intruder, Some(outcome.chat.id), None, "Let me in")
        .await
        .unwrap_err();

    // The denial is generic; it never reveals whose chat it is.
    assert_eq!(err.code, ErrorCode::PermissionDenied);
    assert_eq!(err.message, "Access denied");

    // The intruder's message was never appended and they were not charged.
    let messages = db.chats().get_messages(outcome.chat.id).await.unwrap();
    assert_eq!(messages.len(), 2);
    assert!(messages
        .iter()
        .filter(|m| m.role == MessageRole::User)
        .all(|m| m.content == "Owner's opening message"));
    assert_eq!(db.credits().balance(intruder.id).await.unwrap(), 50);
    assert_eq!(provider.calls(), 1);
}

#[tokio::test]
async fn owner_can_continue_their_own_chat() {
    let (db, _provider, service) = create_test_service(Script::Reply("reply")).await;
    let owner = create_test_user(&db, 50).await;

    let first = service.send(&owner, None, None, "Opening").await.unwrap();
    let second = service
        .send(&owner, Some(first.chat.id), None, "Follow-up")
        .await
        .unwrap();

    assert_eq!(second.chat.id, first.chat.id);
    let messages = db.chats().get_messages(first.chat.id).await.unwrap();
    assert_eq!(messages.len(), 4);
}

#[tokio::test]
async fn ownership_checks_cover_stored_resources() {
    let db = common::create_test_database().await;
    let owner = create_test_user(&db, 0).await;
    let intruder = create_test_user(&db, 0).await;

    let private = db
        .templates()
        .create(owner.id, "Draft", "Body", false)
        .await
        .unwrap();
    let public = db
        .templates()
        .create(owner.id, "Shared", "Body", true)
        .await
        .unwrap();

    let err = assert_template_readable(&private, intruder.id).unwrap_err();
    assert_eq!(err.code, ErrorCode::PermissionDenied);
    assert!(assert_template_readable(&public, intruder.id).is_ok());

    // Public visibility never grants write access.
    let err = assert_owned(&public, intruder.id).unwrap_err();
    assert_eq!(err.code, ErrorCode::PermissionDenied);
    assert!(assert_owned(&public, owner.id).is_ok());
}
