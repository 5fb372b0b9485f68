// ABOUTME: Environment-variable configuration with development defaults
// ABOUTME: Covers HTTP port, database URL, JWT secret, aggregator and payment processor settings
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Prism Labs

//! Server configuration loaded from environment variables.

use std::env;

use crate::errors::{AppError, AppResult};

/// Default HTTP port for local development
const DEFAULT_HTTP_PORT: u16 = 8080;

/// Default SQLite database URL
const DEFAULT_DATABASE_URL: &str = "sqlite:prism.db";

/// Default completion aggregator base URL (OpenAI-compatible)
const DEFAULT_AGGREGATOR_BASE_URL: &str = "https://openrouter.ai/api/v1";

/// Default JWT token expiry in hours
const DEFAULT_JWT_EXPIRY_HOURS: i64 = 24;

/// Default signup bonus granted to new accounts
const DEFAULT_SIGNUP_BONUS_CREDITS: i64 = 25;

/// Completion aggregator settings
#[derive(Debug, Clone)]
pub struct AggregatorConfig {
    /// Base URL of the OpenAI-compatible aggregator API
    pub base_url: String,
    /// Bearer credential for the aggregator
    pub api_key: String,
}

/// Image generation provider credentials
///
/// Each backend is optional; a missing key makes that backend's models
/// unavailable rather than failing startup.
#[derive(Debug, Clone, Default)]
pub struct ImageProviderConfig {
    /// Fal API key
    pub fal_api_key: Option<String>,
    /// OpenAI images API key
    pub openai_api_key: Option<String>,
    /// Google Imagen API key
    pub google_api_key: Option<String>,
}

/// Payment processor settings
#[derive(Debug, Clone)]
pub struct PaymentConfig {
    /// Base URL of the payment processor API
    pub base_url: String,
    /// API credential for checkout creation
    pub api_key: String,
    /// Shared secret for webhook signature verification
    pub webhook_secret: String,
}

/// Top-level server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// HTTP API port
    pub http_port: u16,
    /// Database URL (SQLite)
    pub database_url: String,
    /// JWT signing secret
    pub jwt_secret: String,
    /// JWT token lifetime in hours
    pub jwt_expiry_hours: i64,
    /// Credits granted to new accounts as a signup bonus
    pub signup_bonus_credits: i64,
    /// Completion aggregator settings
    pub aggregator: AggregatorConfig,
    /// Image generation provider credentials
    pub images: ImageProviderConfig,
    /// Payment processor settings
    pub payment: PaymentConfig,
}

impl ServerConfig {
    /// Load configuration from environment variables
    ///
    /// # Errors
    ///
    /// Returns an error if a required variable (`JWT_SECRET`,
    /// `AGGREGATOR_API_KEY`) is missing or a numeric variable fails to parse.
    pub fn from_env() -> AppResult<Self> {
        let http_port = env_parse("HTTP_PORT", DEFAULT_HTTP_PORT)?;
        let database_url =
            env::var("DATABASE_URL").unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_owned());

        let jwt_secret = env::var("JWT_SECRET")
            .map_err(|_| AppError::config("JWT_SECRET environment variable is required"))?;
        let jwt_expiry_hours = env_parse("JWT_EXPIRY_HOURS", DEFAULT_JWT_EXPIRY_HOURS)?;
        let signup_bonus_credits =
            env_parse("SIGNUP_BONUS_CREDITS", DEFAULT_SIGNUP_BONUS_CREDITS)?;

        let aggregator = AggregatorConfig {
            base_url: env::var("AGGREGATOR_BASE_URL")
                .unwrap_or_else(|_| DEFAULT_AGGREGATOR_BASE_URL.to_owned()),
            api_key: env::var("AGGREGATOR_API_KEY").map_err(|_| {
                AppError::config("AGGREGATOR_API_KEY environment variable is required")
            })?,
        };

        let images = ImageProviderConfig {
            fal_api_key: env::var("FAL_API_KEY").ok().filter(|k| !k.is_empty()),
            openai_api_key: env::var("OPENAI_API_KEY").ok().filter(|k| !k.is_empty()),
            google_api_key: env::var("GOOGLE_API_KEY").ok().filter(|k| !k.is_empty()),
        };

        let payment = PaymentConfig {
            base_url: env::var("PAYMENT_BASE_URL")
                .unwrap_or_else(|_| "https://api.payments.example.com".to_owned()),
            api_key: env::var("PAYMENT_API_KEY").unwrap_or_default(),
            webhook_secret: env::var("PAYMENT_WEBHOOK_SECRET").unwrap_or_default(),
        };

        Ok(Self {
            http_port,
            database_url,
            jwt_secret,
            jwt_expiry_hours,
            signup_bonus_credits,
            aggregator,
            images,
            payment,
        })
    }
}

/// Parse an environment variable with a default when unset
fn env_parse<T>(name: &str, default: T) -> AppResult<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(value) => value
            .parse()
            .map_err(|e| AppError::config(format!("Invalid {name} value: {e}"))),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_parse_default() {
        let port: u16 = env_parse("PRISM_TEST_UNSET_PORT", 8080).unwrap_or(0);
        assert_eq!(port, 8080);
    }
}
