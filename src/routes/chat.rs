// ABOUTME: Chat CRUD, message history, and buffered/streaming send endpoints
// ABOUTME: Every chat access passes the ownership guard before any read or mutation
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Prism Labs

//! Chat routes.
//!
//! Send endpoints delegate to [`ChatService`](crate::chat_service::ChatService);
//! the streaming variant relays dispatcher events over SSE. A mid-stream
//! failure is reported as an `error` event, and only the `completed` event
//! signals that the turn persisted and was charged.

use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::sse::{Event, KeepAlive, Sse},
    routing::{delete, get, post, put},
    Json, Router,
};
use futures_util::stream::Stream;
use serde::{Deserialize, Serialize};
use tokio_stream::StreamExt;
use uuid::Uuid;

use super::require_user;
use crate::chat_service::SendOutcome;
use crate::errors::AppError;
use crate::models::{Chat, Message};
use crate::server::ServerResources;
use crate::tenant::assert_owned;

/// Default page size for chat listings
const DEFAULT_LIMIT: i64 = 50;

/// Pagination query parameters
#[derive(Debug, Deserialize)]
pub struct ListQuery {
    /// Maximum rows to return
    #[serde(default)]
    pub limit: Option<i64>,
    /// Rows to skip
    #[serde(default)]
    pub offset: Option<i64>,
}

/// Request to send a message
#[derive(Debug, Deserialize)]
pub struct SendRequest {
    /// Target chat; a new chat is created when absent
    #[serde(default)]
    pub chat_id: Option<Uuid>,
    /// Model override for this send
    #[serde(default)]
    pub model: Option<String>,
    /// Message content
    pub content: String,
}

/// Request to rename a chat
#[derive(Debug, Deserialize)]
pub struct RenameRequest {
    /// New title
    pub title: String,
}

/// Request to move a chat between containers
#[derive(Debug, Deserialize)]
pub struct MoveRequest {
    /// Target project, cleared when null
    #[serde(default)]
    pub project_id: Option<Uuid>,
    /// Target legacy folder, cleared when null
    #[serde(default)]
    pub folder_id: Option<Uuid>,
}

/// Chat list response
#[derive(Debug, Serialize)]
pub struct ChatListResponse {
    /// Chats, most recently updated first
    pub chats: Vec<Chat>,
}

/// Message history response
#[derive(Debug, Serialize)]
pub struct MessagesResponse {
    /// Messages in causal order
    pub messages: Vec<Message>,
}

/// Chat routes handler
pub struct ChatRoutes;

impl ChatRoutes {
    /// Create all chat routes
    pub fn routes(resources: Arc<ServerResources>) -> Router {
        Router::new()
            .route("/api/chats", get(Self::list_chats))
            .route("/api/chats/:chat_id", get(Self::get_chat))
            .route("/api/chats/:chat_id", put(Self::rename_chat))
            .route("/api/chats/:chat_id", delete(Self::delete_chat))
            .route("/api/chats/:chat_id/move", put(Self::move_chat))
            .route("/api/chats/:chat_id/messages", get(Self::get_messages))
            .route("/api/chat/send", post(Self::send))
            .route("/api/chat/stream", post(Self::send_stream))
            .with_state(resources)
    }

    /// Load a chat and verify the acting user owns it
    async fn owned_chat(
        resources: &Arc<ServerResources>,
        chat_id: Uuid,
        user_id: Uuid,
    ) -> Result<Chat, AppError> {
        let chat = resources
            .database
            .chats()
            .get(chat_id)
            .await?
            .ok_or_else(|| AppError::not_found("Chat"))?;
        assert_owned(&chat, user_id)?;
        Ok(chat)
    }

    async fn list_chats(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Query(query): Query<ListQuery>,
    ) -> Result<Json<ChatListResponse>, AppError> {
        let user = require_user(&headers, &resources).await?;
        let chats = resources
            .database
            .chats()
            .list_for_user(
                user.id,
                query.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, 200),
                query.offset.unwrap_or(0).max(0),
            )
            .await?;
        Ok(Json(ChatListResponse { chats }))
    }

    async fn get_chat(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Path(chat_id): Path<Uuid>,
    ) -> Result<Json<Chat>, AppError> {
        let user = require_user(&headers, &resources).await?;
        let chat = Self::owned_chat(&resources, chat_id, user.id).await?;
        Ok(Json(chat))
    }

    async fn rename_chat(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Path(chat_id): Path<Uuid>,
        Json(request): Json<RenameRequest>,
    ) -> Result<Json<Chat>, AppError> {
        let user = require_user(&headers, &resources).await?;
        Self::owned_chat(&resources, chat_id, user.id).await?;

        let title = request.title.trim();
        if title.is_empty() {
            return Err(AppError::required_field("title"));
        }

        resources.database.chats().rename(chat_id, title).await?;
        let chat = Self::owned_chat(&resources, chat_id, user.id).await?;
        Ok(Json(chat))
    }

    async fn delete_chat(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Path(chat_id): Path<Uuid>,
    ) -> Result<StatusCode, AppError> {
        let user = require_user(&headers, &resources).await?;
        Self::owned_chat(&resources, chat_id, user.id).await?;
        resources.database.chats().delete(chat_id).await?;
        Ok(StatusCode::NO_CONTENT)
    }

    async fn move_chat(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Path(chat_id): Path<Uuid>,
        Json(request): Json<MoveRequest>,
    ) -> Result<Json<Chat>, AppError> {
        let user = require_user(&headers, &resources).await?;
        Self::owned_chat(&resources, chat_id, user.id).await?;

        // Target containers must also belong to the acting user.
        if let Some(project_id) = request.project_id {
            let project = resources
                .database
                .workspace()
                .get_project(project_id)
                .await?
                .ok_or_else(|| AppError::not_found("Project"))?;
            assert_owned(&project, user.id)?;
        }
        if let Some(folder_id) = request.folder_id {
            let folder = resources
                .database
                .workspace()
                .get_folder(folder_id)
                .await?
                .ok_or_else(|| AppError::not_found("Folder"))?;
            assert_owned(&folder, user.id)?;
        }

        resources
            .database
            .chats()
            .set_project(chat_id, request.project_id)
            .await?;
        resources
            .database
            .chats()
            .set_folder(chat_id, request.folder_id)
            .await?;

        let chat = Self::owned_chat(&resources, chat_id, user.id).await?;
        Ok(Json(chat))
    }

    async fn get_messages(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Path(chat_id): Path<Uuid>,
    ) -> Result<Json<MessagesResponse>, AppError> {
        let user = require_user(&headers, &resources).await?;
        Self::owned_chat(&resources, chat_id, user.id).await?;
        let messages = resources.database.chats().get_messages(chat_id).await?;
        Ok(Json(MessagesResponse { messages }))
    }

    async fn send(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Json(request): Json<SendRequest>,
    ) -> Result<Json<SendOutcome>, AppError> {
        let user = require_user(&headers, &resources).await?;
        let outcome = resources
            .chat_service
            .send(
                &user,
                request.chat_id,
                request.model.as_deref(),
                &request.content,
            )
            .await?;
        Ok(Json(outcome))
    }

    async fn send_stream(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Json(request): Json<SendRequest>,
    ) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
        let user = require_user(&headers, &resources).await?;
        let events = resources
            .chat_service
            .send_streaming(
                &user,
                request.chat_id,
                request.model.as_deref(),
                &request.content,
            )
            .await?;

        let sse_stream = events.map(|item| {
            let event = match item {
                Ok(chat_event) => serde_json::to_string(&chat_event).map_or_else(
                    |e| {
                        Event::default().data(
                            serde_json::json!({
                                "type": "error",
                                "message": format!("Serialization failed: {e}"),
                            })
                            .to_string(),
                        )
                    },
                    |json| Event::default().data(json),
                ),
                Err(e) => {
                    // Same policy as HTTP responses: upstream detail stays in
                    // the log, clients get the generic description.
                    let message = if e.http_status().is_server_error() {
                        tracing::error!(code = ?e.code, "stream failed: {}", e.message);
                        e.code.description().to_owned()
                    } else {
                        e.message
                    };
                    Event::default().data(
                        serde_json::json!({
                            "type": "error",
                            "message": message,
                        })
                        .to_string(),
                    )
                }
            };
            Ok(event)
        });

        Ok(Sse::new(sse_stream).keep_alive(KeepAlive::default()))
    }
}
