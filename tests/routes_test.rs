// ABOUTME: In-process HTTP tests over the full router
// ABOUTME: Covers registration, auth enforcement, the send endpoint, and the webhook
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Prism Labs

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs)]

mod common;

use axum::body::Body;
use axum::Router;
use common::{create_test_app, Script, TEST_WEBHOOK_SECRET};
use http::{header, Request, StatusCode};
use serde_json::{json, Value};
use tower::ServiceExt;

async fn request(
    app: &Router,
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    let request = if let Some(body) = body {
        builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    } else {
        builder.body(Body::empty()).unwrap()
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, body)
}

async fn register(app: &Router, email: &str) -> String {
    let (status, body) = request(
        app,
        "POST",
        "/api/auth/register",
        None,
        Some(json!({ "email": email, "password": "hunter2hunter2" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    body["token"].as_str().unwrap().to_owned()
}

#[tokio::test]
async fn health_endpoints_respond() {
    let (_db, _provider, app) = create_test_app(Script::Reply("ok")).await;

    let (status, _) = request(&app, "GET", "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = request(&app, "GET", "/health/ready", None, None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn register_login_and_read_balance() {
    let (_db, _provider, app) = create_test_app(Script::Reply("ok")).await;

    let token = register(&app, "alice@example.com").await;

    // The signup bonus from test_config is visible immediately.
    let (status, body) = request(&app, "GET", "/api/credits", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["credits"], 20);

    let (status, body) = request(
        &app,
        "POST",
        "/api/auth/login",
        None,
        Some(json!({ "email": "alice@example.com", "password": "hunter2hunter2" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["token"].as_str().is_some());

    let (status, body) = request(
        &app,
        "POST",
        "/api/auth/login",
        None,
        Some(json!({ "email": "alice@example.com", "password": "wrong-password" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["message"], "Invalid email or password");
}

#[tokio::test]
async fn protected_routes_require_a_token() {
    let (_db, _provider, app) = create_test_app(Script::Reply("ok")).await;

    let (status, _) = request(&app, "GET", "/api/chats", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = request(&app, "GET", "/api/chats", Some("not-a-jwt"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn send_endpoint_returns_the_full_outcome() {
    let (db, _provider, app) = create_test_app(Script::Reply("Sure thing")).await;
    let token = register(&app, "bob@example.com").await;

    let (status, body) = request(
        &app,
        "POST",
        "/api/chat/send",
        Some(&token),
        Some(json!({ "model": "gpt-4o", "content": "Please help" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["assistant_message"]["content"], "Sure thing");
    assert_eq!(body["credits_used"], 8);
    assert_eq!(body["new_balance"], 12);

    let user_id = body["chat"]["user_id"].as_str().unwrap().parse().unwrap();
    assert_eq!(db.credits().balance(user_id).await.unwrap(), 12);
}

#[tokio::test]
async fn foreign_chat_reads_are_denied_over_http() {
    let (_db, _provider, app) = create_test_app(Script::Reply("mine")).await;
    let owner = register(&app, "owner@example.com").await;
    let intruder = register(&app, "intruder@example.com").await;

    let (status, body) = request(
        &app,
        "POST",
        "/api/chat/send",
        Some(&owner),
        Some(json!({ "content": "Owner's chat" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let chat_id = body["chat"]["id"].as_str().unwrap().to_owned();

    let (status, body) = request(
        &app,
        "GET",
        &format!("/api/chats/{chat_id}"),
        Some(&intruder),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"]["message"], "Access denied");
}

fn sign_webhook(body: &[u8]) -> String {
    let key = ring::hmac::Key::new(ring::hmac::HMAC_SHA256, TEST_WEBHOOK_SECRET.as_bytes());
    hex::encode(ring::hmac::sign(&key, body).as_ref())
}

#[tokio::test]
async fn webhook_rejects_bad_signatures_and_accepts_good_ones() {
    let (db, _provider, app) = create_test_app(Script::Reply("ok")).await;
    let token = register(&app, "buyer@example.com").await;

    let (_, body) = request(&app, "GET", "/api/credits", Some(&token), None).await;
    assert_eq!(body["credits"], 20);

    let user = db
        .users()
        .get_by_email("buyer@example.com")
        .await
        .unwrap()
        .unwrap();
    let payload = json!({
        "id": "evt_http_1",
        "type": "checkout.completed",
        "data": { "client_reference": user.id.to_string(), "plan_id": "starter" }
    })
    .to_string();

    // Missing signature header.
    let unsigned = Request::builder()
        .method("POST")
        .uri("/api/webhooks/payments")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(payload.clone()))
        .unwrap();
    let response = app.clone().oneshot(unsigned).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    // Tampered signature.
    let tampered = Request::builder()
        .method("POST")
        .uri("/api/webhooks/payments")
        .header(header::CONTENT_TYPE, "application/json")
        .header("x-webhook-signature", sign_webhook(b"different body"))
        .body(Body::from(payload.clone()))
        .unwrap();
    let response = app.clone().oneshot(tampered).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(db.credits().balance(user.id).await.unwrap(), 20);

    // Valid signature over the exact body bytes.
    let signed = Request::builder()
        .method("POST")
        .uri("/api/webhooks/payments")
        .header(header::CONTENT_TYPE, "application/json")
        .header("x-webhook-signature", sign_webhook(payload.as_bytes()))
        .body(Body::from(payload))
        .unwrap();
    let response = app.clone().oneshot(signed).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(db.credits().balance(user.id).await.unwrap(), 120);
}
