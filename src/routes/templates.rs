// ABOUTME: Prompt template CRUD with public-read, owner-write visibility
// ABOUTME: Using a template bumps its usage counter without exposing ownership
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Prism Labs

//! Template routes.
//!
//! Public templates are readable by any authenticated user; every mutation
//! requires ownership. Placeholders in template bodies are never
//! interpolated server-side.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    routing::{delete, get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::require_user;
use crate::errors::AppError;
use crate::models::PromptTemplate;
use crate::server::ServerResources;
use crate::tenant::{assert_owned, assert_template_readable};

/// Request to create or replace a template
#[derive(Debug, Deserialize)]
pub struct TemplateRequest {
    /// Template title
    pub title: String,
    /// Template body
    pub content: String,
    /// Whether the template is publicly readable
    #[serde(default)]
    pub is_public: bool,
}

/// Template list response
#[derive(Debug, Serialize)]
pub struct TemplateListResponse {
    /// Own and public templates, newest first
    pub templates: Vec<PromptTemplate>,
}

/// Template routes handler
pub struct TemplateRoutes;

impl TemplateRoutes {
    /// Create all template routes
    pub fn routes(resources: Arc<ServerResources>) -> Router {
        Router::new()
            .route("/api/templates", post(Self::create_template))
            .route("/api/templates", get(Self::list_templates))
            .route("/api/templates/:template_id", get(Self::get_template))
            .route("/api/templates/:template_id", put(Self::update_template))
            .route("/api/templates/:template_id", delete(Self::delete_template))
            .route("/api/templates/:template_id/use", post(Self::use_template))
            .with_state(resources)
    }

    fn validate(request: &TemplateRequest) -> Result<(), AppError> {
        if request.title.trim().is_empty() {
            return Err(AppError::required_field("title"));
        }
        if request.content.trim().is_empty() {
            return Err(AppError::required_field("content"));
        }
        Ok(())
    }

    async fn load(
        resources: &Arc<ServerResources>,
        template_id: Uuid,
    ) -> Result<PromptTemplate, AppError> {
        resources
            .database
            .templates()
            .get(template_id)
            .await?
            .ok_or_else(|| AppError::not_found("Template"))
    }

    async fn create_template(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Json(request): Json<TemplateRequest>,
    ) -> Result<(StatusCode, Json<PromptTemplate>), AppError> {
        let user = require_user(&headers, &resources).await?;
        Self::validate(&request)?;

        let template = resources
            .database
            .templates()
            .create(
                user.id,
                request.title.trim(),
                &request.content,
                request.is_public,
            )
            .await?;
        Ok((StatusCode::CREATED, Json(template)))
    }

    async fn list_templates(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
    ) -> Result<Json<TemplateListResponse>, AppError> {
        let user = require_user(&headers, &resources).await?;
        let templates = resources.database.templates().list_visible(user.id).await?;
        Ok(Json(TemplateListResponse { templates }))
    }

    async fn get_template(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Path(template_id): Path<Uuid>,
    ) -> Result<Json<PromptTemplate>, AppError> {
        let user = require_user(&headers, &resources).await?;
        let template = Self::load(&resources, template_id).await?;
        assert_template_readable(&template, user.id)?;
        Ok(Json(template))
    }

    async fn update_template(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Path(template_id): Path<Uuid>,
        Json(request): Json<TemplateRequest>,
    ) -> Result<Json<PromptTemplate>, AppError> {
        let user = require_user(&headers, &resources).await?;
        Self::validate(&request)?;

        let template = Self::load(&resources, template_id).await?;
        assert_owned(&template, user.id)?;

        resources
            .database
            .templates()
            .update(
                template_id,
                request.title.trim(),
                &request.content,
                request.is_public,
            )
            .await?;

        let updated = Self::load(&resources, template_id).await?;
        Ok(Json(updated))
    }

    async fn delete_template(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Path(template_id): Path<Uuid>,
    ) -> Result<StatusCode, AppError> {
        let user = require_user(&headers, &resources).await?;
        let template = Self::load(&resources, template_id).await?;
        assert_owned(&template, user.id)?;

        resources.database.templates().delete(template_id).await?;
        Ok(StatusCode::NO_CONTENT)
    }

    async fn use_template(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Path(template_id): Path<Uuid>,
    ) -> Result<Json<PromptTemplate>, AppError> {
        let user = require_user(&headers, &resources).await?;
        let template = Self::load(&resources, template_id).await?;
        assert_template_readable(&template, user.id)?;

        resources
            .database
            .templates()
            .increment_usage(template_id)
            .await?;
        let updated = Self::load(&resources, template_id).await?;
        Ok(Json(updated))
    }
}
