// ABOUTME: Liveness and readiness endpoints
// ABOUTME: Readiness pings the database; liveness always answers
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Prism Labs

//! Health routes.

use std::sync::Arc;

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;

use crate::errors::AppError;
use crate::server::ServerResources;

/// Health response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Overall status
    pub status: &'static str,
}

/// Health routes handler
pub struct HealthRoutes;

impl HealthRoutes {
    /// Create all health routes
    pub fn routes(resources: Arc<ServerResources>) -> Router {
        Router::new()
            .route("/health", get(Self::liveness))
            .route("/health/ready", get(Self::readiness))
            .with_state(resources)
    }

    async fn liveness() -> Json<HealthResponse> {
        Json(HealthResponse { status: "ok" })
    }

    async fn readiness(
        State(resources): State<Arc<ServerResources>>,
    ) -> Result<Json<HealthResponse>, AppError> {
        resources.database.ping().await?;
        Ok(Json(HealthResponse { status: "ready" }))
    }
}
