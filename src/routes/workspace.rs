// ABOUTME: Project and legacy-folder container endpoints for organizing chats
// ABOUTME: Deleting a container detaches its chats rather than deleting them
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Prism Labs

//! Workspace routes.
//!
//! Projects are the current chat container; folders remain served for
//! accounts that still use them. Both are strictly per-user.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    routing::{delete, get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::require_user;
use crate::errors::AppError;
use crate::models::{Folder, Project};
use crate::server::ServerResources;
use crate::tenant::assert_owned;

/// Request to create a project
#[derive(Debug, Deserialize)]
pub struct CreateProjectRequest {
    /// Project name
    pub name: String,
    /// Optional description
    #[serde(default)]
    pub description: Option<String>,
}

/// Request to create a legacy folder
#[derive(Debug, Deserialize)]
pub struct CreateFolderRequest {
    /// Folder name
    pub name: String,
}

/// Project list response
#[derive(Debug, Serialize)]
pub struct ProjectListResponse {
    /// The user's projects, newest first
    pub projects: Vec<Project>,
}

/// Folder list response
#[derive(Debug, Serialize)]
pub struct FolderListResponse {
    /// The user's folders, newest first
    pub folders: Vec<Folder>,
}

/// Workspace routes handler
pub struct WorkspaceRoutes;

impl WorkspaceRoutes {
    /// Create all workspace routes
    pub fn routes(resources: Arc<ServerResources>) -> Router {
        Router::new()
            .route("/api/projects", post(Self::create_project))
            .route("/api/projects", get(Self::list_projects))
            .route("/api/projects/:project_id", delete(Self::delete_project))
            .route("/api/folders", post(Self::create_folder))
            .route("/api/folders", get(Self::list_folders))
            .route("/api/folders/:folder_id", delete(Self::delete_folder))
            .with_state(resources)
    }

    async fn create_project(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Json(request): Json<CreateProjectRequest>,
    ) -> Result<(StatusCode, Json<Project>), AppError> {
        let user = require_user(&headers, &resources).await?;
        let name = request.name.trim();
        if name.is_empty() {
            return Err(AppError::required_field("name"));
        }

        let project = resources
            .database
            .workspace()
            .create_project(user.id, name, request.description.as_deref())
            .await?;
        Ok((StatusCode::CREATED, Json(project)))
    }

    async fn list_projects(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
    ) -> Result<Json<ProjectListResponse>, AppError> {
        let user = require_user(&headers, &resources).await?;
        let projects = resources.database.workspace().list_projects(user.id).await?;
        Ok(Json(ProjectListResponse { projects }))
    }

    async fn delete_project(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Path(project_id): Path<Uuid>,
    ) -> Result<StatusCode, AppError> {
        let user = require_user(&headers, &resources).await?;
        let project = resources
            .database
            .workspace()
            .get_project(project_id)
            .await?
            .ok_or_else(|| AppError::not_found("Project"))?;
        assert_owned(&project, user.id)?;

        resources
            .database
            .workspace()
            .delete_project(project_id)
            .await?;
        Ok(StatusCode::NO_CONTENT)
    }

    async fn create_folder(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Json(request): Json<CreateFolderRequest>,
    ) -> Result<(StatusCode, Json<Folder>), AppError> {
        let user = require_user(&headers, &resources).await?;
        let name = request.name.trim();
        if name.is_empty() {
            return Err(AppError::required_field("name"));
        }

        let folder = resources
            .database
            .workspace()
            .create_folder(user.id, name)
            .await?;
        Ok((StatusCode::CREATED, Json(folder)))
    }

    async fn list_folders(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
    ) -> Result<Json<FolderListResponse>, AppError> {
        let user = require_user(&headers, &resources).await?;
        let folders = resources.database.workspace().list_folders(user.id).await?;
        Ok(Json(FolderListResponse { folders }))
    }

    async fn delete_folder(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Path(folder_id): Path<Uuid>,
    ) -> Result<StatusCode, AppError> {
        let user = require_user(&headers, &resources).await?;
        let folder = resources
            .database
            .workspace()
            .get_folder(folder_id)
            .await?
            .ok_or_else(|| AppError::not_found("Folder"))?;
        assert_owned(&folder, user.id)?;

        resources
            .database
            .workspace()
            .delete_folder(folder_id)
            .await?;
        Ok(StatusCode::NO_CONTENT)
    }
}
