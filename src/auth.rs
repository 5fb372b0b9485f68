// ABOUTME: JWT-based user authentication and password hashing
// ABOUTME: Handles token generation, validation with detailed errors, and bcrypt credentials
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Prism Labs

//! # Authentication and Session Management
//!
//! JWT-based authentication for the multi-tenant chat server. Tokens carry
//! the user id and email; validation distinguishes expired, invalid, and
//! malformed tokens so clients get actionable failures.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::{AppError, AppResult};
use crate::models::User;

/// JWT validation error with detailed information
#[derive(Debug, Clone)]
pub enum JwtValidationError {
    /// Token has expired
    TokenExpired {
        /// When the token expired
        expired_at: DateTime<Utc>,
    },
    /// Token signature is invalid
    TokenInvalid {
        /// Reason for invalidity
        reason: String,
    },
    /// Token is malformed (not proper JWT format)
    TokenMalformed {
        /// Details about malformation
        details: String,
    },
}

impl std::fmt::Display for JwtValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TokenExpired { expired_at } => {
                write!(
                    f,
                    "JWT token expired at {}",
                    expired_at.format("%Y-%m-%d %H:%M:%S UTC")
                )
            }
            Self::TokenInvalid { reason } => {
                write!(f, "JWT token signature is invalid: {reason}")
            }
            Self::TokenMalformed { details } => {
                write!(f, "JWT token is malformed: {details}")
            }
        }
    }
}

impl std::error::Error for JwtValidationError {}

impl From<JwtValidationError> for AppError {
    fn from(error: JwtValidationError) -> Self {
        match error {
            JwtValidationError::TokenExpired { .. } => Self::auth_expired(),
            other => Self::auth_invalid(other.to_string()),
        }
    }
}

/// JWT claims for user authentication
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// User ID
    pub sub: String,
    /// User email
    pub email: String,
    /// Issued at timestamp
    pub iat: i64,
    /// Expiration timestamp
    pub exp: i64,
}

/// Authenticated user context extracted from a valid token
#[derive(Debug, Clone, Copy)]
pub struct AuthResult {
    /// Authenticated user ID
    pub user_id: Uuid,
}

/// Generate a random 64-byte JWT secret
#[must_use]
pub fn generate_jwt_secret() -> [u8; 64] {
    let mut secret = [0u8; 64];
    rand::thread_rng().fill_bytes(&mut secret);
    secret
}

/// Manager for JWT generation and validation
pub struct AuthManager {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    token_expiry_hours: i64,
}

impl AuthManager {
    /// Create a new auth manager with the given signing secret
    #[must_use]
    pub fn new(jwt_secret: &[u8], token_expiry_hours: i64) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(jwt_secret),
            decoding_key: DecodingKey::from_secret(jwt_secret),
            token_expiry_hours,
        }
    }

    /// Generate a signed token for a user
    ///
    /// # Errors
    ///
    /// Returns an error if encoding fails.
    pub fn generate_token(&self, user: &User) -> AppResult<String> {
        let now = Utc::now();
        let claims = Claims {
            sub: user.id.to_string(),
            email: user.email.clone(),
            iat: now.timestamp(),
            exp: (now + Duration::hours(self.token_expiry_hours)).timestamp(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| AppError::internal(format!("Failed to generate token: {e}")))
    }

    /// Validate a token and extract its claims
    ///
    /// # Errors
    ///
    /// Returns `JwtValidationError` distinguishing expired, invalid-signature,
    /// and malformed tokens.
    pub fn validate_token(&self, token: &str) -> Result<Claims, JwtValidationError> {
        let validation = Validation::new(Algorithm::HS256);

        decode::<Claims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => {
                    JwtValidationError::TokenExpired {
                        expired_at: Utc::now(),
                    }
                }
                jsonwebtoken::errors::ErrorKind::InvalidSignature => {
                    JwtValidationError::TokenInvalid {
                        reason: "signature verification failed".to_owned(),
                    }
                }
                other => JwtValidationError::TokenMalformed {
                    details: format!("{other:?}"),
                },
            })
    }

    /// Validate a `Bearer` authorization header value and return the user id
    ///
    /// # Errors
    ///
    /// Returns an authentication error if the header is missing the bearer
    /// prefix or the token fails validation.
    pub fn authenticate_header(&self, auth_header: &str) -> AppResult<AuthResult> {
        let token = auth_header
            .strip_prefix("Bearer ")
            .ok_or_else(|| AppError::auth_invalid("Authorization header must use Bearer scheme"))?;

        let claims = self.validate_token(token)?;
        let user_id = Uuid::parse_str(&claims.sub)
            .map_err(|_| AppError::auth_invalid("Token subject is not a valid user id"))?;

        Ok(AuthResult { user_id })
    }
}

/// Hash a password with bcrypt
///
/// # Errors
///
/// Returns an error if hashing fails.
pub fn hash_password(password: &str) -> AppResult<String> {
    bcrypt::hash(password, bcrypt::DEFAULT_COST)
        .map_err(|e| AppError::internal(format!("Failed to hash password: {e}")))
}

/// Verify a password against a bcrypt hash
///
/// # Errors
///
/// Returns an error if the hash is malformed.
pub fn verify_password(password: &str, hash: &str) -> AppResult<bool> {
    bcrypt::verify(password, hash)
        .map_err(|e| AppError::internal(format!("Failed to verify password: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_user() -> User {
        User::new("user@example.com".to_owned(), "hash".to_owned(), None, 0)
    }

    #[test]
    fn test_token_round_trip() {
        let secret = generate_jwt_secret();
        let manager = AuthManager::new(&secret, 24);
        let user = test_user();

        let token = manager.generate_token(&user).ok();
        let token = token.as_deref().unwrap_or("");
        let claims = manager.validate_token(token).ok();

        assert_eq!(
            claims.map(|c| c.sub),
            Some(user.id.to_string())
        );
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let manager_a = AuthManager::new(&generate_jwt_secret(), 24);
        let manager_b = AuthManager::new(&generate_jwt_secret(), 24);
        let user = test_user();

        let token = manager_a.generate_token(&user).unwrap_or_default();
        assert!(manager_b.validate_token(&token).is_err());
    }

    #[test]
    fn test_authenticate_header_requires_bearer() {
        let manager = AuthManager::new(&generate_jwt_secret(), 24);
        assert!(manager.authenticate_header("Basic abc").is_err());
    }
}
