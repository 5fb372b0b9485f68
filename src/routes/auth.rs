// ABOUTME: Registration and login endpoints issuing JWT session tokens
// ABOUTME: New accounts start prepaid with a signup bonus and a bonus transaction
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Prism Labs

//! Authentication routes.

use std::sync::Arc;

use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::auth::{hash_password, verify_password};
use crate::errors::AppError;
use crate::models::{TransactionType, User};
use crate::server::ServerResources;

/// Request to register a new account
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    /// Email address
    pub email: String,
    /// Plaintext password
    pub password: String,
    /// Optional display name
    #[serde(default)]
    pub display_name: Option<String>,
}

/// Request to log in
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    /// Email address
    pub email: String,
    /// Plaintext password
    pub password: String,
}

/// Session response for both register and login
#[derive(Debug, Serialize)]
pub struct SessionResponse {
    /// Bearer token for subsequent requests
    pub token: String,
    /// The authenticated user
    pub user: User,
}

/// Authentication routes handler
pub struct AuthRoutes;

impl AuthRoutes {
    /// Create all authentication routes
    pub fn routes(resources: Arc<ServerResources>) -> Router {
        Router::new()
            .route("/api/auth/register", post(Self::register))
            .route("/api/auth/login", post(Self::login))
            .with_state(resources)
    }

    async fn register(
        State(resources): State<Arc<ServerResources>>,
        Json(request): Json<RegisterRequest>,
    ) -> Result<(StatusCode, Json<SessionResponse>), AppError> {
        let email = request.email.trim().to_lowercase();
        if email.is_empty() || !email.contains('@') {
            return Err(AppError::invalid_input("A valid email address is required"));
        }
        if request.password.len() < 8 {
            return Err(AppError::invalid_input(
                "Password must be at least 8 characters",
            ));
        }

        let password_hash = hash_password(&request.password)?;
        let bonus = resources.config.signup_bonus_credits;
        let user = User::new(email, password_hash, request.display_name, bonus);

        resources.database.users().create(&user).await?;
        if bonus > 0 {
            resources
                .ledger
                .store()
                .record_transaction(
                    user.id,
                    TransactionType::Bonus,
                    bonus,
                    bonus,
                    None,
                    "Signup bonus",
                )
                .await?;
        }

        let token = resources.auth_manager.generate_token(&user)?;
        info!(user_id = %user.id, "Registered new account");

        Ok((StatusCode::CREATED, Json(SessionResponse { token, user })))
    }

    async fn login(
        State(resources): State<Arc<ServerResources>>,
        Json(request): Json<LoginRequest>,
    ) -> Result<Json<SessionResponse>, AppError> {
        let email = request.email.trim().to_lowercase();

        // Same error for unknown account and wrong password.
        let user = resources
            .database
            .users()
            .get_by_email(&email)
            .await?
            .ok_or_else(|| AppError::auth_invalid("Invalid email or password"))?;

        if !verify_password(&request.password, &user.password_hash)? {
            return Err(AppError::auth_invalid("Invalid email or password"));
        }

        resources.database.users().touch_last_active(user.id).await?;
        let token = resources.auth_manager.generate_token(&user)?;
        info!(user_id = %user.id, "Login succeeded");

        Ok(Json(SessionResponse { token, user }))
    }
}
