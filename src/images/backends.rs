// ABOUTME: Per-backend HTTP clients for image generation providers
// ABOUTME: Each backend keeps its own wire shape; results normalize to GeneratedImage
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Prism Labs

use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error};

use super::{GeneratedImage, ImageBackend, ImageRequest, ImageTarget};
use crate::config::ImageProviderConfig;
use crate::errors::{AppError, AppResult, ErrorCode};

const CONNECT_TIMEOUT_SECS: u64 = 10;
const REQUEST_TIMEOUT_SECS: u64 = 120;

// ============================================================================
// Wire types, one set per backend
// ============================================================================

#[derive(Debug, Serialize)]
struct FalRequest<'a> {
    prompt: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    image_size: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct FalResponse {
    images: Vec<FalImage>,
}

#[derive(Debug, Deserialize)]
struct FalImage {
    url: String,
}

#[derive(Debug, Serialize)]
struct OpenAiImageRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    n: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    size: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct OpenAiImageResponse {
    data: Vec<OpenAiImageDatum>,
}

#[derive(Debug, Deserialize)]
struct OpenAiImageDatum {
    url: String,
}

#[derive(Debug, Serialize)]
struct GoogleImageRequest<'a> {
    instances: Vec<GoogleInstance<'a>>,
    parameters: GoogleParameters,
}

#[derive(Debug, Serialize)]
struct GoogleInstance<'a> {
    prompt: &'a str,
}

#[derive(Debug, Serialize)]
struct GoogleParameters {
    #[serde(rename = "sampleCount")]
    sample_count: u32,
}

#[derive(Debug, Deserialize)]
struct GoogleImageResponse {
    predictions: Vec<GooglePrediction>,
}

#[derive(Debug, Deserialize)]
struct GooglePrediction {
    #[serde(rename = "imageUri")]
    image_uri: String,
}

// ============================================================================
// Client
// ============================================================================

/// HTTP client dispatching image generation to the backend a target names
pub struct ImageClient {
    client: Client,
    config: ImageProviderConfig,
}

impl ImageClient {
    /// Create a client from provider credentials
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn new(config: ImageProviderConfig) -> AppResult<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| AppError::internal(format!("Failed to create HTTP client: {e}")))?;
        Ok(Self { client, config })
    }

    /// Generate one image via the backend `target` names
    ///
    /// # Errors
    ///
    /// Returns a config error for a backend with no credential, or an
    /// upstream failure translated into the error taxonomy.
    pub async fn generate(
        &self,
        target: &ImageTarget,
        request: &ImageRequest,
    ) -> AppResult<GeneratedImage> {
        debug!(target = %target, "Dispatching image generation");
        let url = match target.backend {
            ImageBackend::Fal => self.generate_fal(target, request).await?,
            ImageBackend::OpenAi => self.generate_openai(target, request).await?,
            ImageBackend::Google => self.generate_google(target, request).await?,
        };

        Ok(GeneratedImage {
            url,
            model: target.to_string(),
            credits_used: target.cost,
        })
    }

    fn key_for(&self, backend: ImageBackend) -> AppResult<&str> {
        let key = match backend {
            ImageBackend::Fal => self.config.fal_api_key.as_deref(),
            ImageBackend::OpenAi => self.config.openai_api_key.as_deref(),
            ImageBackend::Google => self.config.google_api_key.as_deref(),
        };
        key.ok_or_else(|| {
            AppError::config(format!(
                "No credential configured for image provider '{}'",
                backend.as_str()
            ))
        })
    }

    async fn generate_fal(&self, target: &ImageTarget, request: &ImageRequest) -> AppResult<String> {
        let key = self.key_for(ImageBackend::Fal)?;
        let body = FalRequest {
            prompt: &request.prompt,
            image_size: request.size.as_deref(),
        };

        let response = self
            .client
            .post(format!("https://fal.run/fal-ai/{}", target.model))
            .header("Authorization", format!("Key {key}"))
            .json(&body)
            .send()
            .await
            .map_err(Self::transport_error)?;

        let parsed: FalResponse = Self::read_json(response, "fal").await?;
        parsed
            .images
            .into_iter()
            .next()
            .map(|image| image.url)
            .ok_or_else(|| AppError::external_service("fal", "Response contained no images"))
    }

    async fn generate_openai(
        &self,
        target: &ImageTarget,
        request: &ImageRequest,
    ) -> AppResult<String> {
        let key = self.key_for(ImageBackend::OpenAi)?;
        let body = OpenAiImageRequest {
            model: target.model,
            prompt: &request.prompt,
            n: 1,
            size: request.size.as_deref(),
        };

        let response = self
            .client
            .post("https://api.openai.com/v1/images/generations")
            .header("Authorization", format!("Bearer {key}"))
            .json(&body)
            .send()
            .await
            .map_err(Self::transport_error)?;

        let parsed: OpenAiImageResponse = Self::read_json(response, "openai").await?;
        parsed
            .data
            .into_iter()
            .next()
            .map(|datum| datum.url)
            .ok_or_else(|| AppError::external_service("openai", "Response contained no images"))
    }

    async fn generate_google(
        &self,
        target: &ImageTarget,
        request: &ImageRequest,
    ) -> AppResult<String> {
        let key = self.key_for(ImageBackend::Google)?;
        let body = GoogleImageRequest {
            instances: vec![GoogleInstance {
                prompt: &request.prompt,
            }],
            parameters: GoogleParameters { sample_count: 1 },
        };

        let response = self
            .client
            .post(format!(
                "https://generativelanguage.googleapis.com/v1/models/{}:predict",
                target.model
            ))
            .header("x-goog-api-key", key)
            .json(&body)
            .send()
            .await
            .map_err(Self::transport_error)?;

        let parsed: GoogleImageResponse = Self::read_json(response, "google").await?;
        parsed
            .predictions
            .into_iter()
            .next()
            .map(|prediction| prediction.image_uri)
            .ok_or_else(|| AppError::external_service("google", "Response contained no images"))
    }

    fn transport_error(e: reqwest::Error) -> AppError {
        error!("Image provider request failed: {e}");
        if e.is_connect() || e.is_timeout() {
            AppError::new(
                ErrorCode::ExternalServiceUnavailable,
                "Image provider is unreachable",
            )
        } else {
            AppError::external_service("image-provider", format!("Request failed: {e}"))
        }
    }

    async fn read_json<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
        provider: &'static str,
    ) -> AppResult<T> {
        let status = response.status();
        let body = response.text().await.map_err(|e| {
            AppError::external_service(provider, format!("Failed to read response: {e}"))
        })?;

        if !status.is_success() {
            error!(provider, %status, "Image provider returned an error");
            return Err(match status.as_u16() {
                429 => AppError::new(
                    ErrorCode::ExternalRateLimited,
                    "Image provider is receiving too many requests. Please try again shortly.",
                ),
                401 | 403 => AppError::config(format!(
                    "Image provider '{provider}' rejected the service credential"
                )),
                _ => AppError::external_service(
                    provider,
                    format!(
                        "API error ({status}): {}",
                        body.chars().take(200).collect::<String>()
                    ),
                ),
            });
        }

        serde_json::from_str(&body).map_err(|e| {
            AppError::external_service(provider, format!("Failed to parse response: {e}"))
        })
    }
}
