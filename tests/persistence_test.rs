// ABOUTME: Integration tests for file-backed database lifecycle
// ABOUTME: Data survives reopening and migrations are idempotent
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Prism Labs

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs)]

mod common;

use prism_chat_server::database::Database;

#[tokio::test]
async fn data_survives_reopening_the_database() {
    common::init_test_logging();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("prism.db");
    let url = format!("sqlite:{}", path.display());

    let db = Database::new(&url).await.unwrap();
    let user = common::create_test_user(&db, 42).await;
    drop(db);

    // Reopening reruns migrations against the existing schema.
    let db = Database::new(&url).await.unwrap();
    let stored = db.users().get(user.id).await.unwrap().unwrap();
    assert_eq!(stored.email, user.email);
    assert_eq!(db.credits().balance(user.id).await.unwrap(), 42);
}
