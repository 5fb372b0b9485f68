// ABOUTME: HTTP client for the OpenAI-compatible model aggregator
// ABOUTME: Buffered and streaming completions with typed upstream error translation
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Prism Labs

//! # Aggregator Provider
//!
//! Single [`LlmProvider`] implementation backed by the model aggregator's
//! `chat/completions` endpoint. Model names have already been resolved to
//! aggregator identifiers by the catalog before requests reach this client.
//! Upstream failures are translated into the error taxonomy here; raw
//! provider errors never leak to API clients.

use async_trait::async_trait;
use futures_util::StreamExt as _;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error, instrument};

use super::sse_parser::create_sse_stream;
use super::{ChatRequest, ChatResponse, ChatStream, LlmProvider, StreamChunk, TokenUsage};
use crate::config::environment::AggregatorConfig;
use crate::errors::{AppError, ErrorCode};

const CONNECT_TIMEOUT_SECS: u64 = 10;
const REQUEST_TIMEOUT_SECS: u64 = 180;

// ============================================================================
// Wire Types (OpenAI-compatible format)
// ============================================================================

#[derive(Debug, Serialize)]
struct WireRequest {
    model: String,
    messages: Vec<WireMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stream: Option<bool>,
}

#[derive(Debug, Serialize)]
struct WireMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct WireResponse {
    choices: Vec<WireChoice>,
    #[serde(default)]
    usage: Option<WireUsage>,
    model: String,
}

#[derive(Debug, Deserialize)]
struct WireChoice {
    message: WireResponseMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct WireStreamChunk {
    choices: Vec<WireStreamChoice>,
}

#[derive(Debug, Deserialize)]
struct WireStreamChoice {
    delta: WireDelta,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireDelta {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireErrorResponse {
    error: WireErrorDetail,
}

#[derive(Debug, Deserialize)]
struct WireErrorDetail {
    message: String,
    #[serde(rename = "type")]
    error_type: Option<String>,
}

// ============================================================================
// Provider
// ============================================================================

/// HTTP client for the completion aggregator
pub struct AggregatorProvider {
    client: Client,
    config: AggregatorConfig,
}

impl AggregatorProvider {
    /// Create a provider from aggregator configuration
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn new(config: AggregatorConfig) -> Result<Self, AppError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| AppError::internal(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self { client, config })
    }

    fn completions_url(&self) -> String {
        format!(
            "{}/chat/completions",
            self.config.base_url.trim_end_matches('/')
        )
    }

    fn build_request(&self, request: &ChatRequest, stream: bool) -> WireRequest {
        WireRequest {
            model: request.model.clone(),
            messages: request
                .messages
                .iter()
                .map(|m| WireMessage {
                    role: m.role.as_str(),
                    content: m.content.clone(),
                })
                .collect(),
            temperature: request.temperature,
            max_tokens: request.max_tokens,
            stream: stream.then_some(true),
        }
    }

    async fn send(&self, wire: &WireRequest) -> Result<reqwest::Response, AppError> {
        self.client
            .post(self.completions_url())
            .header("Content-Type", "application/json")
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .json(wire)
            .send()
            .await
            .map_err(|e| {
                error!("Failed to reach aggregator: {e}");
                if e.is_connect() || e.is_timeout() {
                    AppError::new(
                        ErrorCode::ExternalServiceUnavailable,
                        "Completion service is unreachable",
                    )
                } else {
                    AppError::external_service("aggregator", format!("Request failed: {e}"))
                }
            })
    }

    /// Translate a non-2xx aggregator response into the error taxonomy
    fn parse_error_response(status: reqwest::StatusCode, body: &str) -> AppError {
        serde_json::from_str::<WireErrorResponse>(body).map_or_else(
            |_| match status.as_u16() {
                502..=504 => AppError::new(
                    ErrorCode::ExternalServiceUnavailable,
                    "Completion service is not responding",
                ),
                _ => AppError::external_service(
                    "aggregator",
                    format!(
                        "API error ({status}): {}",
                        body.chars().take(200).collect::<String>()
                    ),
                ),
            },
            |error_response| {
                let detail = error_response.error;
                match status.as_u16() {
                    401 => AppError::new(
                        ErrorCode::ConfigError,
                        "Aggregator rejected the service credential",
                    ),
                    429 => AppError::new(
                        ErrorCode::ExternalRateLimited,
                        "Model is receiving too many requests. Please try again shortly.",
                    ),
                    400 => {
                        AppError::invalid_input(format!("Rejected request: {}", detail.message))
                    }
                    404 => AppError::new(
                        ErrorCode::ResourceNotFound,
                        format!("Model not available: {}", detail.message),
                    ),
                    _ => AppError::external_service(
                        "aggregator",
                        format!(
                            "{} - {}",
                            detail.error_type.unwrap_or_else(|| "unknown".to_owned()),
                            detail.message
                        ),
                    ),
                }
            },
        )
    }

    fn parse_stream_payload(json_str: &str) -> Option<Result<StreamChunk, AppError>> {
        // Malformed payloads are skipped rather than killing the stream.
        let chunk: WireStreamChunk = serde_json::from_str(json_str).ok()?;
        let choice = chunk.choices.into_iter().next()?;
        Some(Ok(StreamChunk {
            delta: choice.delta.content.unwrap_or_default(),
            is_final: choice.finish_reason.is_some(),
            finish_reason: choice.finish_reason,
        }))
    }
}

#[async_trait]
impl LlmProvider for AggregatorProvider {
    fn name(&self) -> &'static str {
        "aggregator"
    }

    #[instrument(skip(self, request), fields(model = %request.model))]
    async fn complete(&self, request: &ChatRequest) -> Result<ChatResponse, AppError> {
        debug!(
            message_count = request.messages.len(),
            "Dispatching buffered completion"
        );

        let wire = self.build_request(request, false);
        let response = self.send(&wire).await?;

        let status = response.status();
        let body = response.text().await.map_err(|e| {
            AppError::external_service("aggregator", format!("Failed to read response: {e}"))
        })?;

        if !status.is_success() {
            return Err(Self::parse_error_response(status, &body));
        }

        let wire_response: WireResponse = serde_json::from_str(&body).map_err(|e| {
            error!(
                "Failed to parse aggregator response: {e} - body: {}",
                body.chars().take(500).collect::<String>()
            );
            AppError::external_service("aggregator", format!("Failed to parse response: {e}"))
        })?;

        let choice = wire_response.choices.into_iter().next().ok_or_else(|| {
            AppError::external_service("aggregator", "API returned no choices")
        })?;

        Ok(ChatResponse {
            content: choice.message.content.unwrap_or_default(),
            model: wire_response.model,
            usage: wire_response.usage.map(|u| TokenUsage {
                prompt_tokens: u.prompt_tokens,
                completion_tokens: u.completion_tokens,
                total_tokens: u.total_tokens,
            }),
            finish_reason: choice.finish_reason,
        })
    }

    #[instrument(skip(self, request), fields(model = %request.model))]
    async fn complete_stream(&self, request: &ChatRequest) -> Result<ChatStream, AppError> {
        debug!(
            message_count = request.messages.len(),
            "Dispatching streaming completion"
        );

        let wire = self.build_request(request, true);
        let response = self.send(&wire).await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Self::parse_error_response(status, &body));
        }

        Ok(create_sse_stream(
            response.bytes_stream().boxed(),
            Self::parse_stream_payload,
        ))
    }
}
