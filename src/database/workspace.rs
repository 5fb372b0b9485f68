// ABOUTME: Project and folder storage for organizing chats
// ABOUTME: Folders are deprecated in favor of projects but both are served concurrently
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Prism Labs

//! Project and folder storage.

use chrono::Utc;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use super::{parse_timestamp, parse_uuid};
use crate::errors::AppResult;
use crate::models::{Folder, Project};

/// Storage manager for chat containers
#[derive(Clone)]
pub struct WorkspaceStore {
    pool: SqlitePool,
}

impl WorkspaceStore {
    /// Create a new workspace store
    #[must_use]
    pub const fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    // ========================================================================
    // Projects
    // ========================================================================

    /// Create a project
    ///
    /// # Errors
    ///
    /// Returns an error if the insert fails.
    pub async fn create_project(
        &self,
        user_id: Uuid,
        name: &str,
        description: Option<&str>,
    ) -> AppResult<Project> {
        let project = Project {
            id: Uuid::new_v4(),
            user_id,
            name: name.to_owned(),
            description: description.map(ToOwned::to_owned),
            created_at: Utc::now(),
        };

        sqlx::query(
            "INSERT INTO projects (id, user_id, name, description, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
        )
        .bind(project.id.to_string())
        .bind(project.user_id.to_string())
        .bind(&project.name)
        .bind(&project.description)
        .bind(project.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(project)
    }

    /// Get a project by ID
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn get_project(&self, project_id: Uuid) -> AppResult<Option<Project>> {
        let row = sqlx::query("SELECT * FROM projects WHERE id = ?1")
            .bind(project_id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        row.map(|r| row_to_project(&r)).transpose()
    }

    /// List a user's projects
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn list_projects(&self, user_id: Uuid) -> AppResult<Vec<Project>> {
        let rows = sqlx::query("SELECT * FROM projects WHERE user_id = ?1 ORDER BY created_at DESC")
            .bind(user_id.to_string())
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(row_to_project).collect()
    }

    /// Delete a project; chats fall back to no container
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn delete_project(&self, project_id: Uuid) -> AppResult<bool> {
        sqlx::query("UPDATE chats SET project_id = NULL WHERE project_id = ?1")
            .bind(project_id.to_string())
            .execute(&self.pool)
            .await?;

        let result = sqlx::query("DELETE FROM projects WHERE id = ?1")
            .bind(project_id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    // ========================================================================
    // Folders (legacy)
    // ========================================================================

    /// Create a folder
    ///
    /// # Errors
    ///
    /// Returns an error if the insert fails.
    pub async fn create_folder(&self, user_id: Uuid, name: &str) -> AppResult<Folder> {
        let folder = Folder {
            id: Uuid::new_v4(),
            user_id,
            name: name.to_owned(),
            created_at: Utc::now(),
        };

        sqlx::query("INSERT INTO folders (id, user_id, name, created_at) VALUES (?1, ?2, ?3, ?4)")
            .bind(folder.id.to_string())
            .bind(folder.user_id.to_string())
            .bind(&folder.name)
            .bind(folder.created_at.to_rfc3339())
            .execute(&self.pool)
            .await?;

        Ok(folder)
    }

    /// Get a folder by ID
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn get_folder(&self, folder_id: Uuid) -> AppResult<Option<Folder>> {
        let row = sqlx::query("SELECT * FROM folders WHERE id = ?1")
            .bind(folder_id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        row.map(|r| row_to_folder(&r)).transpose()
    }

    /// List a user's folders
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn list_folders(&self, user_id: Uuid) -> AppResult<Vec<Folder>> {
        let rows = sqlx::query("SELECT * FROM folders WHERE user_id = ?1 ORDER BY created_at DESC")
            .bind(user_id.to_string())
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(row_to_folder).collect()
    }

    /// Delete a folder; chats fall back to no container
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn delete_folder(&self, folder_id: Uuid) -> AppResult<bool> {
        sqlx::query("UPDATE chats SET folder_id = NULL WHERE folder_id = ?1")
            .bind(folder_id.to_string())
            .execute(&self.pool)
            .await?;

        let result = sqlx::query("DELETE FROM folders WHERE id = ?1")
            .bind(folder_id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

/// Map a database row to a `Project`
fn row_to_project(row: &sqlx::sqlite::SqliteRow) -> AppResult<Project> {
    let id: String = row.try_get("id")?;
    let user_id: String = row.try_get("user_id")?;
    let created_at: String = row.try_get("created_at")?;

    Ok(Project {
        id: parse_uuid(&id)?,
        user_id: parse_uuid(&user_id)?,
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        created_at: parse_timestamp(&created_at)?,
    })
}

/// Map a database row to a `Folder`
fn row_to_folder(row: &sqlx::sqlite::SqliteRow) -> AppResult<Folder> {
    let id: String = row.try_get("id")?;
    let user_id: String = row.try_get("user_id")?;
    let created_at: String = row.try_get("created_at")?;

    Ok(Folder {
        id: parse_uuid(&id)?,
        user_id: parse_uuid(&user_id)?,
        name: row.try_get("name")?,
        created_at: parse_timestamp(&created_at)?,
    })
}
