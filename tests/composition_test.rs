// ABOUTME: Integration tests for the prompt sent to the aggregator
// ABOUTME: Covers personalization, history ordering, and model routing
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Prism Labs

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs)]

mod common;

use chrono::Utc;
use common::{create_test_service, create_test_user, Script};
use prism_chat_server::models::{MessageRole, PreferenceRecord, Tone};

#[tokio::test]
async fn unconfigured_user_gets_the_plain_base_prompt() {
    let (db, provider, service) = create_test_service(Script::Reply("hi")).await;
    let user = create_test_user(&db, 10).await;

    service.send(&user, None, None, "Hello").await.unwrap();

    let request = provider.last_request().unwrap();
    assert_eq!(request.messages[0].role, MessageRole::System);
    assert!(request.messages[0].content.starts_with("You are Prism"));
    assert!(!request.messages[0].content.contains("Personalization settings:"));
}

#[tokio::test]
async fn preferences_shape_the_system_prompt() {
    let (db, provider, service) = create_test_service(Script::Reply("hi")).await;
    let user = create_test_user(&db, 10).await;

    let prefs = PreferenceRecord {
        user_id: user.id,
        base_tone: Some(Tone::Formal),
        additional_preferences: None,
        nickname: Some("Ace".to_owned()),
        occupation: None,
        interests: Some("astronomy".to_owned()),
        values: None,
        communication_preferences: None,
        allow_saved_memory: true,
        allow_reference_history: true,
        updated_at: Utc::now(),
    };
    db.preferences().upsert(&prefs).await.unwrap();

    service.send(&user, None, None, "Hello").await.unwrap();

    let request = provider.last_request().unwrap();
    let system = &request.messages[0].content;
    assert!(system.contains("Personalization settings:"));
    assert!(system.contains("formal, professional tone"));
    assert!(system.contains("Address the user as \"Ace\"."));
    assert!(system.contains("astronomy"));
}

#[tokio::test]
async fn history_is_replayed_in_order() {
    let (db, provider, service) = create_test_service(Script::Reply("first answer")).await;
    let user = create_test_user(&db, 50).await;

    let first = service.send(&user, None, None, "First question").await.unwrap();
    provider.set_script(Script::Reply("second answer"));
    service
        .send(&user, Some(first.chat.id), None, "Second question")
        .await
        .unwrap();

    let request = provider.last_request().unwrap();
    let roles: Vec<MessageRole> = request.messages.iter().map(|m| m.role).collect();
    assert_eq!(
        roles,
        vec![
            MessageRole::System,
            MessageRole::User,
            MessageRole::Assistant,
            MessageRole::User,
        ]
    );
    assert_eq!(request.messages[1].content, "First question");
    assert_eq!(request.messages[2].content, "first answer");
    assert_eq!(request.messages[3].content, "Second question");
}

#[tokio::test]
async fn model_names_are_routed_to_aggregator_ids() {
    let (db, provider, service) = create_test_service(Script::Reply("hi")).await;
    let user = create_test_user(&db, 50).await;

    service.send(&user, None, None, "Default model").await.unwrap();
    assert_eq!(provider.last_request().unwrap().model, "openai/gpt-4o-mini");

    service
        .send(&user, None, Some("claude-haiku"), "Cheap model")
        .await
        .unwrap();
    assert_eq!(
        provider.last_request().unwrap().model,
        "anthropic/claude-3.5-haiku"
    );
}
