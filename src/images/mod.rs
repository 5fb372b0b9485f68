// ABOUTME: Image generation dispatch across independent provider backends
// ABOUTME: Parses provider:model targets, enforces fixed costs, fails fast on unsupported combos
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Prism Labs

//! # Image Generation
//!
//! Image models are addressed by a composite `provider:model` identifier.
//! Each backend has its own request and response shape; the dispatcher
//! normalizes all of them to one [`GeneratedImage`]. A combination the
//! dispatcher does not support is rejected up front with a "not yet
//! available" error, before any credit check or network call.

mod backends;

pub use backends::ImageClient;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::errors::{AppError, AppResult};

/// Supported image generation backends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageBackend {
    /// Fal hosted diffusion models
    Fal,
    /// OpenAI images API
    OpenAi,
    /// Google Imagen API
    Google,
}

impl ImageBackend {
    /// String form used in the composite identifier
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Fal => "fal",
            Self::OpenAi => "openai",
            Self::Google => "google",
        }
    }
}

/// A validated `provider:model` target with its fixed credit cost
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageTarget {
    /// Backend that serves the model
    pub backend: ImageBackend,
    /// Backend-side model identifier
    pub model: &'static str,
    /// Credits debited per generated image
    pub cost: i64,
}

impl fmt::Display for ImageTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.backend.as_str(), self.model)
    }
}

const SUPPORTED_TARGETS: &[ImageTarget] = &[
    ImageTarget {
        backend: ImageBackend::Fal,
        model: "flux-schnell",
        cost: 2,
    },
    ImageTarget {
        backend: ImageBackend::Fal,
        model: "flux-pro",
        cost: 6,
    },
    ImageTarget {
        backend: ImageBackend::OpenAi,
        model: "gpt-image-1",
        cost: 8,
    },
    ImageTarget {
        backend: ImageBackend::OpenAi,
        model: "dall-e-3",
        cost: 6,
    },
    ImageTarget {
        backend: ImageBackend::Google,
        model: "imagen-3",
        cost: 6,
    },
];

impl FromStr for ImageTarget {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (provider, model) = s.split_once(':').ok_or_else(|| {
            AppError::invalid_input(format!(
                "Image model must be addressed as provider:model, got '{s}'"
            ))
        })?;

        SUPPORTED_TARGETS
            .iter()
            .find(|t| t.backend.as_str() == provider && t.model == model)
            .cloned()
            .ok_or_else(|| {
                AppError::invalid_input(format!(
                    "Image model '{provider}:{model}' is not yet available"
                ))
            })
    }
}

/// Request to generate one image
#[derive(Debug, Clone, Deserialize)]
pub struct ImageRequest {
    /// Text prompt describing the image
    pub prompt: String,
    /// Output size as `WIDTHxHEIGHT`, backend default when absent
    pub size: Option<String>,
}

impl ImageRequest {
    /// Validate prompt bounds before any credit check or network call
    ///
    /// # Errors
    ///
    /// Returns a validation error for an empty or oversize prompt.
    pub fn validate(&self) -> AppResult<()> {
        if self.prompt.trim().is_empty() {
            return Err(AppError::required_field("prompt"));
        }
        if self.prompt.len() > 4000 {
            return Err(AppError::invalid_input(
                "Image prompt exceeds the 4000 character limit",
            ));
        }
        Ok(())
    }
}

/// Normalized result returned by every backend
#[derive(Debug, Clone, Serialize)]
pub struct GeneratedImage {
    /// URL of the generated image
    pub url: String,
    /// Target that produced the image
    pub model: String,
    /// Credits debited for the generation
    pub credits_used: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_supported_target() {
        let target: Result<ImageTarget, _> = "fal:flux-schnell".parse();
        let target = match target {
            Ok(t) => t,
            Err(e) => panic!("expected supported target: {e}"),
        };
        assert_eq!(target.backend, ImageBackend::Fal);
        assert_eq!(target.cost, 2);
    }

    #[test]
    fn test_missing_separator_rejected() {
        let err = "flux-schnell".parse::<ImageTarget>().err();
        assert!(err.is_some());
    }

    #[test]
    fn test_unsupported_combo_fails_fast_with_clear_message() {
        let err = "fal:midjourney-v7".parse::<ImageTarget>().err();
        assert!(err.is_some_and(|e| e.message.contains("not yet available")));
    }

    #[test]
    fn test_display_round_trip() {
        for target in SUPPORTED_TARGETS {
            assert_eq!(target.to_string().parse::<ImageTarget>().ok().as_ref(), Some(target));
        }
    }

    #[test]
    fn test_empty_prompt_rejected() {
        let request = ImageRequest {
            prompt: "  ".to_owned(),
            size: None,
        };
        assert!(request.validate().is_err());
    }
}
