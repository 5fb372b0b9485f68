// ABOUTME: Library root for the Prism multi-tenant AI chat server
// ABOUTME: Exposes storage, auth, credit ledger, completion dispatch, and HTTP layers
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Prism Labs

//! # Prism Chat Server
//!
//! Multi-tenant chat backend over an OpenAI-compatible model aggregator.
//! The core pipeline is credit-gated completion with per-user prompt
//! personalization:
//!
//! 1. the tenant guard resolves and checks chat ownership,
//! 2. the credit ledger rejects sends the balance cannot cover before any
//!    upstream call,
//! 3. the prompt composer folds stored preferences into the system prompt,
//! 4. the dispatcher replays ordered history to the aggregator, buffered or
//!    streamed, and
//! 5. on full success the ledger debits once and logs one audit transaction.
//!
//! Around the core: auth with JWT sessions, projects/folders/templates for
//! organizing chats, image generation across several provider backends, and
//! credit purchases through a hosted checkout with an idempotent webhook.

#![deny(unsafe_code)]

pub mod auth;
pub mod chat_service;
pub mod config;
pub mod credits;
pub mod database;
pub mod errors;
pub mod images;
pub mod llm;
pub mod logging;
pub mod models;
pub mod payments;
pub mod personalization;
pub mod routes;
pub mod server;
pub mod tenant;
