// ABOUTME: Shared test utilities for integration tests
// ABOUTME: In-memory database setup, user fixtures, and a scripted completion provider
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Prism Labs

#![allow(dead_code, clippy::unwrap_used, clippy::expect_used, clippy::missing_panics_doc)]

//! Shared test setup for `prism_chat_server` integration tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Once};

use async_trait::async_trait;
use axum::Router;
use prism_chat_server::{
    auth::hash_password,
    chat_service::ChatService,
    config::{AggregatorConfig, ImageProviderConfig, PaymentConfig, ServerConfig},
    credits::CreditLedger,
    database::Database,
    errors::AppError,
    llm::{ChatRequest, ChatResponse, ChatStream, LlmProvider, StreamChunk},
    models::{BillingType, User},
    server::{self, ServerResources},
};
use uuid::Uuid;

/// Webhook signing secret used by [`test_config`]
pub const TEST_WEBHOOK_SECRET: &str = "test-webhook-secret";

static INIT_LOGGER: Once = Once::new();

/// Initialize quiet logging once per test process
pub fn init_test_logging() {
    INIT_LOGGER.call_once(|| {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::WARN)
            .with_test_writer()
            .init();
    });
}

/// In-memory database with migrations applied
pub async fn create_test_database() -> Database {
    init_test_logging();
    Database::new("sqlite::memory:")
        .await
        .expect("in-memory database")
}

/// Create a stored user with the given starting balance
pub async fn create_test_user(database: &Database, credits: i64) -> User {
    let email = format!("user-{}@example.com", Uuid::new_v4());
    let password_hash = hash_password("test-password-123").unwrap();
    let user = User::new(email, password_hash, None, credits);
    database.users().create(&user).await.unwrap();
    user
}

/// Create a stored pay-as-you-go user
pub async fn create_payg_user(database: &Database, credits: i64) -> User {
    let mut user = create_test_user(database, credits).await;
    database
        .users()
        .set_billing_type(user.id, BillingType::Payg)
        .await
        .unwrap();
    user.billing_type = BillingType::Payg;
    user
}

/// One scripted streaming item
#[derive(Debug, Clone)]
pub enum ScriptedChunk {
    /// A content delta
    Delta(&'static str),
    /// The terminal chunk
    Final,
    /// A mid-stream failure
    Error(&'static str),
}

/// What the scripted provider does when called
#[derive(Debug, Clone)]
pub enum Script {
    /// Buffered success with this content
    Reply(&'static str),
    /// Buffered or initial-request failure
    Fail(&'static str),
    /// Streamed items in order
    Stream(Vec<ScriptedChunk>),
}

/// Completion provider with scripted behavior and a call counter
pub struct ScriptedProvider {
    calls: AtomicUsize,
    script: Mutex<Script>,
    last_request: Mutex<Option<ChatRequest>>,
}

impl ScriptedProvider {
    pub fn new(script: Script) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            script: Mutex::new(script),
            last_request: Mutex::new(None),
        })
    }

    /// Number of upstream calls made
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// The most recent request sent upstream
    pub fn last_request(&self) -> Option<ChatRequest> {
        self.last_request.lock().unwrap().clone()
    }

    /// Replace the script for the next call
    pub fn set_script(&self, script: Script) {
        *self.script.lock().unwrap() = script;
    }

    fn current_script(&self) -> Script {
        self.script.lock().unwrap().clone()
    }
}

#[async_trait]
impl LlmProvider for ScriptedProvider {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn complete(&self, request: &ChatRequest) -> Result<ChatResponse, AppError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_request.lock().unwrap() = Some(request.clone());
        match self.current_script() {
            Script::Reply(content) => Ok(ChatResponse {
                content: content.to_owned(),
                model: request.model.clone(),
                usage: None,
                finish_reason: Some("stop".to_owned()),
            }),
            Script::Fail(message) => Err(AppError::external_service("scripted", message)),
            Script::Stream(_) => Err(AppError::internal("script expects a streaming call")),
        }
    }

    async fn complete_stream(&self, request: &ChatRequest) -> Result<ChatStream, AppError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_request.lock().unwrap() = Some(request.clone());
        match self.current_script() {
            Script::Fail(message) => Err(AppError::external_service("scripted", message)),
            Script::Reply(_) => Err(AppError::internal("script expects a buffered call")),
            Script::Stream(chunks) => {
                let items: Vec<Result<StreamChunk, AppError>> = chunks
                    .into_iter()
                    .map(|chunk| match chunk {
                        ScriptedChunk::Delta(delta) => Ok(StreamChunk {
                            delta: delta.to_owned(),
                            is_final: false,
                            finish_reason: None,
                        }),
                        ScriptedChunk::Final => Ok(StreamChunk {
                            delta: String::new(),
                            is_final: true,
                            finish_reason: Some("stop".to_owned()),
                        }),
                        ScriptedChunk::Error(message) => {
                            Err(AppError::external_service("scripted", message))
                        }
                    })
                    .collect();
                Ok(Box::pin(tokio_stream::iter(items)))
            }
        }
    }
}

/// A dispatcher over an in-memory database and a scripted provider
pub async fn create_test_service(script: Script) -> (Database, Arc<ScriptedProvider>, ChatService) {
    let database = create_test_database().await;
    let provider = ScriptedProvider::new(script);
    let ledger = CreditLedger::new(database.credits());
    let service = ChatService::new(database.clone(), ledger, provider.clone());
    (database, provider, service)
}

/// Configuration for in-process router tests
pub fn test_config() -> ServerConfig {
    ServerConfig {
        http_port: 0,
        database_url: "sqlite::memory:".to_owned(),
        jwt_secret: "test-jwt-secret-with-enough-entropy".to_owned(),
        jwt_expiry_hours: 24,
        signup_bonus_credits: 20,
        aggregator: AggregatorConfig {
            base_url: "https://aggregator.invalid".to_owned(),
            api_key: "test-aggregator-key".to_owned(),
        },
        images: ImageProviderConfig::default(),
        payment: PaymentConfig {
            base_url: "https://payments.invalid".to_owned(),
            api_key: "test-payment-key".to_owned(),
            webhook_secret: TEST_WEBHOOK_SECRET.to_owned(),
        },
    }
}

/// The full application router over a scripted provider
pub async fn create_test_app(script: Script) -> (Database, Arc<ScriptedProvider>, Router) {
    let database = create_test_database().await;
    let provider = ScriptedProvider::new(script);
    let resources =
        ServerResources::with_provider(test_config(), database.clone(), provider.clone())
            .expect("test resources");
    let app = server::router(Arc::new(resources));
    (database, provider, app)
}
