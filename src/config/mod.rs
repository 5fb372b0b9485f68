// ABOUTME: Configuration module for the Prism chat server
// ABOUTME: Environment-only configuration, no config files
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Prism Labs

//! Configuration management for the Prism chat server.
//!
//! All configuration is loaded from environment variables with sensible
//! defaults for local development.

/// Environment-variable configuration loading
pub mod environment;

pub use environment::{AggregatorConfig, ImageProviderConfig, PaymentConfig, ServerConfig};
