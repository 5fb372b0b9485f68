// ABOUTME: Server resources, router assembly, and the HTTP serve loop
// ABOUTME: Wires storage, auth, ledger, dispatcher, and external clients into axum
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Prism Labs

//! # HTTP Server
//!
//! [`ServerResources`] bundles every shared service behind one `Arc` that
//! flows through axum state. Construction happens once at startup; request
//! handlers only borrow.

use std::sync::Arc;

use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::auth::AuthManager;
use crate::chat_service::ChatService;
use crate::config::ServerConfig;
use crate::credits::CreditLedger;
use crate::database::Database;
use crate::errors::{AppError, AppResult};
use crate::images::ImageClient;
use crate::llm::{AggregatorProvider, LlmProvider};
use crate::payments::PaymentProcessor;
use crate::routes;

/// Shared services for request handlers
pub struct ServerResources {
    /// Storage
    pub database: Database,
    /// Token generation and validation
    pub auth_manager: AuthManager,
    /// Balance policy and transaction log
    pub ledger: CreditLedger,
    /// The send pipeline
    pub chat_service: ChatService,
    /// Image generation dispatch
    pub image_client: ImageClient,
    /// Checkout and webhook handling
    pub payments: PaymentProcessor,
    /// Loaded configuration
    pub config: ServerConfig,
}

impl ServerResources {
    /// Build all services from configuration and a connected database
    ///
    /// # Errors
    ///
    /// Returns an error if an HTTP client cannot be constructed.
    pub fn new(config: ServerConfig, database: Database) -> AppResult<Self> {
        let provider: Arc<dyn LlmProvider> =
            Arc::new(AggregatorProvider::new(config.aggregator.clone())?);
        Self::with_provider(config, database, provider)
    }

    /// Build services with an explicit completion provider
    ///
    /// Tests inject scripted providers here; production uses
    /// [`ServerResources::new`].
    ///
    /// # Errors
    ///
    /// Returns an error if an HTTP client cannot be constructed.
    pub fn with_provider(
        config: ServerConfig,
        database: Database,
        provider: Arc<dyn LlmProvider>,
    ) -> AppResult<Self> {
        let auth_manager =
            AuthManager::new(config.jwt_secret.as_bytes(), config.jwt_expiry_hours);
        let ledger = CreditLedger::new(database.credits());
        let chat_service = ChatService::new(database.clone(), ledger.clone(), provider);
        let image_client = ImageClient::new(config.images.clone())?;
        let payments = PaymentProcessor::new(config.payment.clone(), database.payments())?;

        Ok(Self {
            database,
            auth_manager,
            ledger,
            chat_service,
            image_client,
            payments,
            config,
        })
    }
}

/// Assemble the full application router
pub fn router(resources: Arc<ServerResources>) -> Router {
    Router::new()
        .merge(routes::auth::AuthRoutes::routes(resources.clone()))
        .merge(routes::chat::ChatRoutes::routes(resources.clone()))
        .merge(routes::preferences::PreferenceRoutes::routes(
            resources.clone(),
        ))
        .merge(routes::workspace::WorkspaceRoutes::routes(resources.clone()))
        .merge(routes::templates::TemplateRoutes::routes(resources.clone()))
        .merge(routes::credits::CreditRoutes::routes(resources.clone()))
        .merge(routes::images::ImageRoutes::routes(resources.clone()))
        .merge(routes::health::HealthRoutes::routes(resources))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(CorsLayer::permissive())
}

/// Bind and serve until shutdown
///
/// # Errors
///
/// Returns an error if the listener cannot bind or the server fails.
pub async fn serve(resources: Arc<ServerResources>) -> AppResult<()> {
    let port = resources.config.http_port;
    let app = router(resources);

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port))
        .await
        .map_err(|e| AppError::internal(format!("Failed to bind port {port}: {e}")))?;

    info!(port, "HTTP server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| AppError::internal(format!("Server error: {e}")))
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("Shutdown signal received");
    }
}
