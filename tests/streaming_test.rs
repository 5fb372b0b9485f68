// ABOUTME: Integration tests for streaming sends
// ABOUTME: Covers delta accumulation, the terminal event contract, and failure handling
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Prism Labs

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs)]

mod common;

use common::{create_test_service, create_test_user, Script, ScriptedChunk};
use prism_chat_server::{
    chat_service::ChatEvent,
    errors::{AppError, ErrorCode},
    models::{MessageRole, TransactionType},
};
use tokio_stream::StreamExt;

async fn collect_events(
    stream: impl tokio_stream::Stream<Item = Result<ChatEvent, AppError>>,
) -> Vec<Result<ChatEvent, AppError>> {
    tokio::pin!(stream);
    let mut events = Vec::new();
    while let Some(event) = stream.next().await {
        events.push(event);
    }
    events
}

#[tokio::test]
async fn stream_accumulates_deltas_and_commits_once() {
    let script = Script::Stream(vec![
        ScriptedChunk::Delta("Hel"),
        ScriptedChunk::Delta("lo"),
        ScriptedChunk::Final,
    ]);
    let (db, provider, service) = create_test_service(script).await;
    let user = create_test_user(&db, 10).await;

    let stream = service
        .send_streaming(&user, None, Some("gpt-4o"), "Say hello")
        .await
        .unwrap();
    let events = collect_events(stream).await;

    assert_eq!(events.len(), 3);
    assert!(matches!(&events[0], Ok(ChatEvent::Delta { content }) if content == "Hel"));
    assert!(matches!(&events[1], Ok(ChatEvent::Delta { content }) if content == "lo"));

    // The terminal event carries the debit the stream just committed.
    let Ok(ChatEvent::Completed {
        chat_id,
        message_id,
        credits_used,
        new_balance,
    }) = &events[2]
    else {
        panic!("expected a completed event, got {:?}", events[2]);
    };
    assert_eq!(*credits_used, 8);
    assert_eq!(*new_balance, 2);

    let messages = db.chats().get_messages(*chat_id).await.unwrap();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[1].role, MessageRole::Assistant);
    assert_eq!(messages[1].content, "Hello");
    assert_eq!(messages[1].id, *message_id);
    assert_eq!(messages[1].credits_used, 8);

    assert_eq!(db.credits().balance(user.id).await.unwrap(), 2);
    let transactions = db.credits().list_transactions(user.id, 10, 0).await.unwrap();
    assert_eq!(transactions.len(), 1);
    assert_eq!(transactions[0].transaction_type, TransactionType::Usage);
    assert_eq!(provider.calls(), 1);
}

#[tokio::test]
async fn mid_stream_failure_discards_partial_content() {
    let script = Script::Stream(vec![
        ScriptedChunk::Delta("par"),
        ScriptedChunk::Error("connection reset"),
    ]);
    let (db, _provider, service) = create_test_service(script).await;
    let user = create_test_user(&db, 10).await;

    let stream = service
        .send_streaming(&user, None, Some("gpt-4o"), "Doomed")
        .await
        .unwrap();
    let events = collect_events(stream).await;

    assert!(matches!(&events[0], Ok(ChatEvent::Delta { content }) if content == "par"));
    let Err(err) = events.last().unwrap() else {
        panic!("expected the stream to end in an error");
    };
    assert_eq!(err.code, ErrorCode::ExternalServiceError);

    // The partial "par" is never persisted and nothing is debited.
    let chats = db.chats().list_for_user(user.id, 10, 0).await.unwrap();
    let messages = db.chats().get_messages(chats[0].id).await.unwrap();
    assert!(messages.iter().all(|m| m.role != MessageRole::Assistant));
    assert_eq!(db.credits().balance(user.id).await.unwrap(), 10);
    assert!(db.credits().list_transactions(user.id, 10, 0).await.unwrap().is_empty());
}

#[tokio::test]
async fn stream_without_terminal_chunk_is_a_failure() {
    let script = Script::Stream(vec![ScriptedChunk::Delta("truncated")]);
    let (db, _provider, service) = create_test_service(script).await;
    let user = create_test_user(&db, 10).await;

    let stream = service
        .send_streaming(&user, None, Some("gpt-4o"), "Cut off")
        .await
        .unwrap();
    let events = collect_events(stream).await;

    let Err(err) = events.last().unwrap() else {
        panic!("expected an error after the upstream went silent");
    };
    assert_eq!(err.code, ErrorCode::ExternalServiceError);
    assert_eq!(db.credits().balance(user.id).await.unwrap(), 10);
}

#[tokio::test]
async fn dropped_stream_commits_nothing() {
    let script = Script::Stream(vec![
        ScriptedChunk::Delta("Hel"),
        ScriptedChunk::Delta("lo"),
        ScriptedChunk::Final,
    ]);
    let (db, _provider, service) = create_test_service(script).await;
    let user = create_test_user(&db, 10).await;

    let stream = service
        .send_streaming(&user, None, Some("gpt-4o"), "Abandoned")
        .await
        .unwrap();
    {
        tokio::pin!(stream);
        let first = stream.next().await;
        assert!(matches!(first, Some(Ok(ChatEvent::Delta { .. }))));
        // Client disconnects here; the generator is dropped mid-flight.
    }

    let chats = db.chats().list_for_user(user.id, 10, 0).await.unwrap();
    let messages = db.chats().get_messages(chats[0].id).await.unwrap();
    assert!(messages.iter().all(|m| m.role != MessageRole::Assistant));
    assert_eq!(db.credits().balance(user.id).await.unwrap(), 10);
}

#[tokio::test]
async fn streaming_setup_errors_surface_before_any_event() {
    let (db, provider, service) = create_test_service(Script::Reply("unused")).await;
    let user = create_test_user(&db, 3).await;

    let err = match service
        .send_streaming(&user, None, Some("gpt-4o"), "Too expensive")
        .await
    {
        Ok(_) => panic!("expected the credit gate to reject the stream"),
        Err(e) => e,
    };

    assert_eq!(err.code, ErrorCode::InsufficientCredits);
    assert_eq!(provider.calls(), 0);
}
