// ABOUTME: Core data models for the Prism chat server
// ABOUTME: Defines User, Chat, Message, PreferenceRecord, CreditTransaction and related enums
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Prism Labs

//! # Data Models
//!
//! Core data structures used throughout the Prism chat server.
//!
//! ## Design Principles
//!
//! - **Strict ownership**: every entity except public prompt templates is
//!   exclusively owned by one user; ownership is checked by the tenant guard.
//! - **Serializable**: all models support JSON serialization for the REST API.
//! - **Type safe**: enumerations (billing type, tone, message role, transaction
//!   type) are parsed at the boundary and never stored as free-form strings.

use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::AppError;

// ============================================================================
// User
// ============================================================================

/// Billing model for a user account
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BillingType {
    /// Requires sufficient credit balance before each metered call
    Prepaid,
    /// Pay-as-you-go: usage accrues into a monthly counter billed out-of-band
    Payg,
}

impl BillingType {
    /// String form stored in the database
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Prepaid => "prepaid",
            Self::Payg => "payg",
        }
    }
}

impl FromStr for BillingType {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "prepaid" => Ok(Self::Prepaid),
            "payg" => Ok(Self::Payg),
            other => Err(AppError::invalid_input(format!(
                "Invalid billing type: {other}"
            ))),
        }
    }
}

impl Display for BillingType {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.as_str())
    }
}

/// A registered user account
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    /// Unique user identifier
    pub id: Uuid,
    /// Email address (unique)
    pub email: String,
    /// Optional display name
    pub display_name: Option<String>,
    /// Bcrypt password hash, never serialized to clients
    #[serde(skip_serializing)]
    pub password_hash: String,
    /// Current credit balance. Kept non-negative by the ledger's conditional
    /// decrement, not by the column type.
    pub credits: i64,
    /// Billing model
    pub billing_type: BillingType,
    /// Account creation timestamp
    pub created_at: DateTime<Utc>,
    /// Last activity timestamp
    pub last_active: DateTime<Utc>,
    /// Whether the account is active
    pub is_active: bool,
}

impl User {
    /// Create a new prepaid user with the given starting balance
    #[must_use]
    pub fn new(
        email: String,
        password_hash: String,
        display_name: Option<String>,
        starting_credits: i64,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            email,
            display_name,
            password_hash,
            credits: starting_credits,
            billing_type: BillingType::Prepaid,
            created_at: now,
            last_active: now,
            is_active: true,
        }
    }
}

// ============================================================================
// Preferences
// ============================================================================

/// Base tone for personalized system prompts
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tone {
    /// Formal, professional, precise
    Formal,
    /// Friendly, warm, conversational
    Friendly,
    /// Concise, direct, brief
    Concise,
    /// Detailed, comprehensive, with examples
    Detailed,
}

impl Tone {
    /// String form stored in the database
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Formal => "formal",
            Self::Friendly => "friendly",
            Self::Concise => "concise",
            Self::Detailed => "detailed",
        }
    }
}

impl FromStr for Tone {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "formal" => Ok(Self::Formal),
            "friendly" => Ok(Self::Friendly),
            "concise" => Ok(Self::Concise),
            "detailed" => Ok(Self::Detailed),
            other => Err(AppError::invalid_input(format!(
                "Invalid tone '{other}': must be one of formal, friendly, concise, detailed"
            ))),
        }
    }
}

/// Per-user personalization settings (1:1 with `User`)
///
/// The read path is get-or-default: a missing row is served as
/// `PreferenceRecord::default_for(user_id)` without writing anything.
/// Only explicit update/reset calls mutate storage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreferenceRecord {
    /// Owning user
    pub user_id: Uuid,
    /// Base tone for the system prompt
    pub base_tone: Option<Tone>,
    /// Free text or JSON-encoded list of extra directives
    pub additional_preferences: Option<String>,
    /// How the model should address the user
    pub nickname: Option<String>,
    /// User's occupation
    pub occupation: Option<String>,
    /// User's interests
    pub interests: Option<String>,
    /// User's values
    pub values: Option<String>,
    /// Communication preferences
    pub communication_preferences: Option<String>,
    /// Whether saved memory may be used
    pub allow_saved_memory: bool,
    /// Whether conversation history may be referenced
    pub allow_reference_history: bool,
    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

impl PreferenceRecord {
    /// Defaults served when a user has no stored preference row
    #[must_use]
    pub fn default_for(user_id: Uuid) -> Self {
        Self {
            user_id,
            base_tone: Some(Tone::Friendly),
            additional_preferences: None,
            nickname: None,
            occupation: None,
            interests: None,
            values: None,
            communication_preferences: None,
            allow_saved_memory: true,
            allow_reference_history: true,
            updated_at: Utc::now(),
        }
    }
}

// ============================================================================
// Chats and Messages
// ============================================================================

/// A chat conversation owned by exactly one user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chat {
    /// Unique chat identifier
    pub id: Uuid,
    /// Owning user
    pub user_id: Uuid,
    /// Optional project container
    pub project_id: Option<Uuid>,
    /// Optional legacy folder container
    pub folder_id: Option<Uuid>,
    /// Model identifier used for completions in this chat
    pub model: String,
    /// Chat title
    pub title: String,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

/// Role of a message within a conversation
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// System instruction message
    System,
    /// User input message
    User,
    /// Assistant response message
    Assistant,
}

impl MessageRole {
    /// String form for storage and the aggregator wire format
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

impl FromStr for MessageRole {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "system" => Ok(Self::System),
            "user" => Ok(Self::User),
            "assistant" => Ok(Self::Assistant),
            // Any other stored role is a data-integrity violation; it must be
            // rejected rather than forwarded to the aggregator.
            other => Err(AppError::invalid_input(format!(
                "Invalid message role: {other}"
            ))),
        }
    }
}

/// A single message within a chat
///
/// Messages are replayed to the aggregator in strict creation order; the
/// database layer orders by `(created_at, rowid)` so ties within one clock
/// tick keep insertion order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Unique message identifier
    pub id: Uuid,
    /// Parent chat
    pub chat_id: Uuid,
    /// Message role
    pub role: MessageRole,
    /// Message content
    pub content: String,
    /// Credits charged for this message (0 for user messages)
    pub credits_used: i64,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

// ============================================================================
// Credit Transactions
// ============================================================================

/// Kind of credit transaction
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    /// Credits bought through the payment processor
    Purchase,
    /// Credits spent on a completed model response
    Usage,
    /// Credits returned after a failed or reversed operation
    Refund,
    /// Promotional or signup credits
    Bonus,
    /// Automatic top-up charge
    AutoCharge,
}

impl TransactionType {
    /// String form stored in the database
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Purchase => "purchase",
            Self::Usage => "usage",
            Self::Refund => "refund",
            Self::Bonus => "bonus",
            Self::AutoCharge => "auto_charge",
        }
    }
}

impl FromStr for TransactionType {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "purchase" => Ok(Self::Purchase),
            "usage" => Ok(Self::Usage),
            "refund" => Ok(Self::Refund),
            "bonus" => Ok(Self::Bonus),
            "auto_charge" => Ok(Self::AutoCharge),
            other => Err(AppError::invalid_input(format!(
                "Invalid transaction type: {other}"
            ))),
        }
    }
}

/// Immutable audit record of a balance change
///
/// Invariant: the sum of `amount` for a user, applied in creation order
/// starting from the signup balance, equals the user's current balance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreditTransaction {
    /// Unique transaction identifier
    pub id: Uuid,
    /// Owning user
    pub user_id: Uuid,
    /// Transaction kind
    pub transaction_type: TransactionType,
    /// Signed amount (negative for usage)
    pub amount: i64,
    /// Balance snapshot after this transaction applied
    pub balance_after: i64,
    /// Message that triggered a usage debit, if any
    pub message_id: Option<Uuid>,
    /// Human-readable description
    pub description: String,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

// ============================================================================
// Containers
// ============================================================================

/// A project grouping chats (preferred container)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    /// Unique project identifier
    pub id: Uuid,
    /// Owning user
    pub user_id: Uuid,
    /// Project name
    pub name: String,
    /// Optional description
    pub description: Option<String>,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

/// A folder grouping chats (deprecated in favor of `Project`, still served)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Folder {
    /// Unique folder identifier
    pub id: Uuid,
    /// Owning user
    pub user_id: Uuid,
    /// Folder name
    pub name: String,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

// ============================================================================
// Prompt Templates
// ============================================================================

/// A reusable prompt text block with `{{variable}}` placeholders
///
/// Placeholders are never interpolated server-side; substitution is a client
/// concern. Public templates are readable by anyone but mutable only by the
/// owner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptTemplate {
    /// Unique template identifier
    pub id: Uuid,
    /// Owning user
    pub user_id: Uuid,
    /// Template title
    pub title: String,
    /// Template body
    pub content: String,
    /// Whether the template is publicly readable
    pub is_public: bool,
    /// Number of times the template has been used
    pub usage_count: i64,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}
