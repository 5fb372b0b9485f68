// ABOUTME: Image generation endpoint applying the same credit gate as chat sends
// ABOUTME: Validates the provider:model target and prompt before any charge or call
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Prism Labs

//! Image generation routes.
//!
//! The credit order mirrors chat sends: gate first, generate, debit only
//! after the backend returned an image. A failed generation charges nothing.

use std::sync::Arc;

use axum::{
    extract::State,
    http::HeaderMap,
    routing::post,
    Json, Router,
};
use serde::Deserialize;
use tracing::info;

use super::require_user;
use crate::errors::AppError;
use crate::images::{GeneratedImage, ImageRequest, ImageTarget};
use crate::server::ServerResources;

/// Request to generate an image
#[derive(Debug, Deserialize)]
pub struct GenerateRequest {
    /// Composite `provider:model` target
    pub model: String,
    /// Text prompt
    pub prompt: String,
    /// Output size as `WIDTHxHEIGHT`
    #[serde(default)]
    pub size: Option<String>,
}

/// Image routes handler
pub struct ImageRoutes;

impl ImageRoutes {
    /// Create all image routes
    pub fn routes(resources: Arc<ServerResources>) -> Router {
        Router::new()
            .route("/api/images/generate", post(Self::generate))
            .with_state(resources)
    }

    async fn generate(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Json(request): Json<GenerateRequest>,
    ) -> Result<Json<GeneratedImage>, AppError> {
        let user = require_user(&headers, &resources).await?;

        // Unsupported targets fail here, before the credit gate.
        let target: ImageTarget = request.model.parse()?;
        let image_request = ImageRequest {
            prompt: request.prompt,
            size: request.size,
        };
        image_request.validate()?;

        resources.ledger.ensure_sufficient(&user, target.cost).await?;

        let image = resources
            .image_client
            .generate(&target, &image_request)
            .await?;

        // Debit after the backend succeeded. A payg account accrues instead.
        let receipt = resources
            .ledger
            .charge(
                &user,
                target.cost,
                None,
                &format!("Image generation ({target})"),
            )
            .await?;

        info!(
            user_id = %user.id,
            target = %target,
            credits_used = receipt.credits_used,
            "Generated image"
        );

        Ok(Json(image))
    }
}
