// ABOUTME: Ownership checks that keep every tenant's data invisible to others
// ABOUTME: Centralizes the owner-or-forbidden rule applied by all resource routes
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Prism Labs

//! # Tenant Isolation Guard
//!
//! Every user-owned resource passes through [`assert_owned`] before any route
//! acts on it. Ownership failures return a deliberately generic "Access
//! denied" so a caller probing other tenants' ids cannot distinguish an
//! existing resource from a missing one by the error message alone.

use uuid::Uuid;

use crate::errors::{AppError, AppResult};
use crate::models::{Chat, Folder, Project, PromptTemplate};

/// A resource that belongs to exactly one user
pub trait Owned {
    /// The id of the owning user
    fn owner_id(&self) -> Uuid;
}

impl Owned for Chat {
    fn owner_id(&self) -> Uuid {
        self.user_id
    }
}

impl Owned for Project {
    fn owner_id(&self) -> Uuid {
        self.user_id
    }
}

impl Owned for Folder {
    fn owner_id(&self) -> Uuid {
        self.user_id
    }
}

impl Owned for PromptTemplate {
    fn owner_id(&self) -> Uuid {
        self.user_id
    }
}

/// Assert that `resource` belongs to `user_id`
///
/// # Errors
///
/// Returns a generic `Access denied` error on mismatch. The message never
/// reveals whether the resource exists or who owns it.
pub fn assert_owned<T: Owned>(resource: &T, user_id: Uuid) -> AppResult<()> {
    if resource.owner_id() == user_id {
        Ok(())
    } else {
        Err(AppError::forbidden())
    }
}

/// Assert that `template` is readable by `user_id`
///
/// Public templates are readable by any authenticated user; private ones only
/// by their owner. Mutation always requires ownership via [`assert_owned`].
///
/// # Errors
///
/// Returns a generic `Access denied` error for private templates owned by
/// another user.
pub fn assert_template_readable(template: &PromptTemplate, user_id: Uuid) -> AppResult<()> {
    if template.is_public || template.user_id == user_id {
        Ok(())
    } else {
        Err(AppError::forbidden())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorCode;
    use chrono::Utc;

    fn chat_owned_by(user_id: Uuid) -> Chat {
        Chat {
            id: Uuid::new_v4(),
            user_id,
            title: "Test chat".to_owned(),
            model: "gpt-4o-mini".to_owned(),
            project_id: None,
            folder_id: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn template(user_id: Uuid, is_public: bool) -> PromptTemplate {
        PromptTemplate {
            id: Uuid::new_v4(),
            user_id,
            title: "Reviewer".to_owned(),
            content: "Review the following".to_owned(),
            is_public,
            usage_count: 0,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_owner_passes() {
        let owner = Uuid::new_v4();
        let chat = chat_owned_by(owner);
        assert!(assert_owned(&chat, owner).is_ok());
    }

    #[test]
    fn test_non_owner_gets_generic_denial() {
        let chat = chat_owned_by(Uuid::new_v4());
        let err = assert_owned(&chat, Uuid::new_v4()).err();
        let err = match err {
            Some(e) => e,
            None => panic!("expected denial"),
        };
        assert_eq!(err.code, ErrorCode::PermissionDenied);
        assert_eq!(err.message, "Access denied");
    }

    #[test]
    fn test_public_template_readable_by_anyone() {
        let tmpl = template(Uuid::new_v4(), true);
        assert!(assert_template_readable(&tmpl, Uuid::new_v4()).is_ok());
    }

    #[test]
    fn test_private_template_hidden_from_others() {
        let tmpl = template(Uuid::new_v4(), false);
        assert!(assert_template_readable(&tmpl, Uuid::new_v4()).is_err());
        assert!(assert_template_readable(&tmpl, tmpl.user_id).is_ok());
    }
}
