// ABOUTME: Personalization preference endpoints with get-or-default reads
// ABOUTME: Tone values are validated before any mutation reaches storage
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Prism Labs

//! Preference routes.

use std::sync::Arc;

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    routing::{delete, get, put},
    Json, Router,
};
use chrono::Utc;
use serde::Deserialize;

use super::require_user;
use crate::errors::AppError;
use crate::models::{PreferenceRecord, Tone};
use crate::server::ServerResources;

/// Request to replace a user's preferences
#[derive(Debug, Deserialize)]
pub struct UpdatePreferencesRequest {
    /// Base tone name, cleared when absent
    #[serde(default)]
    pub base_tone: Option<String>,
    /// JSON string array of extra directives
    #[serde(default)]
    pub additional_preferences: Option<String>,
    /// How the model should address the user
    #[serde(default)]
    pub nickname: Option<String>,
    /// User's occupation
    #[serde(default)]
    pub occupation: Option<String>,
    /// User's interests
    #[serde(default)]
    pub interests: Option<String>,
    /// User's values
    #[serde(default)]
    pub values: Option<String>,
    /// Communication preferences
    #[serde(default)]
    pub communication_preferences: Option<String>,
    /// Whether saved memory may be used
    #[serde(default = "default_true")]
    pub allow_saved_memory: bool,
    /// Whether conversation history may be referenced
    #[serde(default = "default_true")]
    pub allow_reference_history: bool,
}

const fn default_true() -> bool {
    true
}

/// Preference routes handler
pub struct PreferenceRoutes;

impl PreferenceRoutes {
    /// Create all preference routes
    pub fn routes(resources: Arc<ServerResources>) -> Router {
        Router::new()
            .route("/api/preferences", get(Self::get_preferences))
            .route("/api/preferences", put(Self::update_preferences))
            .route("/api/preferences", delete(Self::reset_preferences))
            .with_state(resources)
    }

    async fn get_preferences(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
    ) -> Result<Json<PreferenceRecord>, AppError> {
        let user = require_user(&headers, &resources).await?;
        let prefs = resources
            .database
            .preferences()
            .get_or_default(user.id)
            .await?;
        Ok(Json(prefs))
    }

    async fn update_preferences(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Json(request): Json<UpdatePreferencesRequest>,
    ) -> Result<Json<PreferenceRecord>, AppError> {
        let user = require_user(&headers, &resources).await?;

        // Validation before mutation: an unknown tone never reaches storage.
        let base_tone = request
            .base_tone
            .as_deref()
            .map(str::parse::<Tone>)
            .transpose()?;

        let prefs = PreferenceRecord {
            user_id: user.id,
            base_tone,
            additional_preferences: request.additional_preferences,
            nickname: request.nickname,
            occupation: request.occupation,
            interests: request.interests,
            values: request.values,
            communication_preferences: request.communication_preferences,
            allow_saved_memory: request.allow_saved_memory,
            allow_reference_history: request.allow_reference_history,
            updated_at: Utc::now(),
        };

        resources.database.preferences().upsert(&prefs).await?;
        Ok(Json(prefs))
    }

    async fn reset_preferences(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
    ) -> Result<StatusCode, AppError> {
        let user = require_user(&headers, &resources).await?;
        resources.database.preferences().reset(user.id).await?;
        Ok(StatusCode::NO_CONTENT)
    }
}
