// ABOUTME: HTTP route modules and the shared request authentication helper
// ABOUTME: Every resource route resolves the acting user before touching storage
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Prism Labs

//! HTTP API routes.
//!
//! Each module owns one resource surface and assembles its own `Router`
//! against shared [`ServerResources`](crate::server::ServerResources) state.
//! Authentication runs first in every handler; tenant ownership checks run
//! before any read or mutation of a user-owned resource.

pub mod auth;
pub mod chat;
pub mod credits;
pub mod health;
pub mod images;
pub mod preferences;
pub mod templates;
pub mod workspace;

use std::sync::Arc;

use axum::http::HeaderMap;

use crate::errors::{AppError, AppResult};
use crate::models::User;
use crate::server::ServerResources;

/// Authenticate a request and load the acting user
///
/// # Errors
///
/// Returns an authentication error for a missing or invalid token, or if the
/// token's subject no longer exists.
pub(crate) async fn require_user(
    headers: &HeaderMap,
    resources: &Arc<ServerResources>,
) -> AppResult<User> {
    let auth_header = headers
        .get("authorization")
        .and_then(|h| h.to_str().ok())
        .ok_or_else(AppError::auth_required)?;

    let auth = resources.auth_manager.authenticate_header(auth_header)?;

    resources
        .database
        .users()
        .get(auth.user_id)
        .await?
        .ok_or_else(|| AppError::auth_invalid("Account no longer exists"))
}
