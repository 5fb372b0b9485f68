// ABOUTME: Completion dispatcher wiring tenant guard, credit gate, prompt composer, and provider
// ABOUTME: Buffered and streaming sends; debit only after a fully completed response
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Prism Labs

//! # Completion Dispatcher
//!
//! One send flows through a fixed pipeline: resolve and guard the chat,
//! pre-check credits for the model's cost, compose the personalized system
//! prompt, replay the ordered history to the aggregator, and charge only
//! once the full response has arrived and been persisted. Any failure along
//! the way leaves the balance untouched and persists no assistant turn; a
//! partially streamed response is discarded, never saved as if it completed.

use std::sync::Arc;

use async_stream::stream;
use futures_util::{Stream, StreamExt};
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::credits::CreditLedger;
use crate::database::Database;
use crate::errors::{AppError, AppResult};
use crate::llm::{catalog, ChatMessage, ChatRequest, LlmProvider};
use crate::models::{Chat, Message, MessageRole, User};
use crate::personalization::build_personalized_system_prompt;
use crate::tenant::assert_owned;

/// Base system prompt before personalization
const BASE_SYSTEM_PROMPT: &str =
    "You are Prism, a helpful AI assistant. Answer accurately and admit uncertainty.";

/// Upper bound on one message's content length
const MAX_CONTENT_CHARS: usize = 32_000;

/// Longest auto-derived chat title
const MAX_TITLE_CHARS: usize = 60;

/// Result of a buffered send
#[derive(Debug, Clone, Serialize)]
pub struct SendOutcome {
    /// Chat the exchange belongs to (created on first message if needed)
    pub chat: Chat,
    /// The persisted user message
    pub user_message: Message,
    /// The persisted assistant message
    pub assistant_message: Message,
    /// Credits debited for this response
    pub credits_used: i64,
    /// Balance after the debit
    pub new_balance: i64,
}

/// One event of a streaming send
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChatEvent {
    /// Incremental content delta
    Delta {
        /// Content chunk
        content: String,
    },
    /// Authoritative completion signal, emitted after persist and debit
    Completed {
        /// Chat the exchange belongs to
        chat_id: Uuid,
        /// Id of the persisted assistant message
        message_id: Uuid,
        /// Credits debited for this response
        credits_used: i64,
        /// Balance after the debit
        new_balance: i64,
    },
}

/// Everything resolved before the aggregator is contacted
struct PreparedSend {
    chat: Chat,
    user_message: Message,
    request: ChatRequest,
    cost: i64,
}

/// The send pipeline shared by buffered and streaming routes
#[derive(Clone)]
pub struct ChatService {
    db: Database,
    ledger: CreditLedger,
    provider: Arc<dyn LlmProvider>,
}

impl ChatService {
    /// Create a dispatcher over storage, the ledger, and a provider
    #[must_use]
    pub fn new(db: Database, ledger: CreditLedger, provider: Arc<dyn LlmProvider>) -> Self {
        Self {
            db,
            ledger,
            provider,
        }
    }

    /// Everything before the upstream call: validate, guard, gate, compose
    ///
    /// The credit pre-check runs before any mutation, so a rejected send
    /// leaves no trace. The user message is persisted last, once the send is
    /// known to be allowed.
    async fn prepare(
        &self,
        user: &User,
        chat_id: Option<Uuid>,
        model: Option<&str>,
        content: &str,
    ) -> AppResult<PreparedSend> {
        let trimmed = content.trim();
        if trimmed.is_empty() {
            return Err(AppError::required_field("content"));
        }
        if trimmed.chars().count() > MAX_CONTENT_CHARS {
            return Err(AppError::invalid_input(format!(
                "Message exceeds the {MAX_CONTENT_CHARS} character limit"
            )));
        }

        let existing_chat = match chat_id {
            Some(id) => {
                let chat = self
                    .db
                    .chats()
                    .get(id)
                    .await?
                    .ok_or_else(|| AppError::not_found("Chat"))?;
                assert_owned(&chat, user.id)?;
                Some(chat)
            }
            None => None,
        };

        // Gate on the resolved model's cost before creating any row, so a
        // rejected send leaves behind neither a chat nor a message.
        let model = model
            .map(str::to_owned)
            .or_else(|| existing_chat.as_ref().map(|chat| chat.model.clone()))
            .unwrap_or_else(|| catalog::DEFAULT_MODEL.to_owned());
        let cost = catalog::completion_cost(&model);
        self.ledger.ensure_sufficient(user, cost).await?;

        let chat = match existing_chat {
            Some(chat) => chat,
            None => {
                self.db
                    .chats()
                    .create(user.id, &model, &derive_title(trimmed))
                    .await?
            }
        };

        // History loads reject any stored role outside {system, user,
        // assistant} instead of forwarding it upstream.
        let history = self.db.chats().get_messages(chat.id).await?;

        let user_message = self
            .db
            .chats()
            .add_message(chat.id, MessageRole::User, trimmed, 0)
            .await?;

        let preferences = self.db.preferences().get(user.id).await?;
        let system_prompt =
            build_personalized_system_prompt(BASE_SYSTEM_PROMPT, preferences.as_ref());

        let mut messages = Vec::with_capacity(history.len() + 2);
        messages.push(ChatMessage::system(system_prompt));
        for message in &history {
            messages.push(ChatMessage::new(message.role, message.content.clone()));
        }
        messages.push(ChatMessage::user(trimmed));

        let request = ChatRequest::new(catalog::resolve_aggregator_model(&model), messages);

        Ok(PreparedSend {
            chat,
            user_message,
            request,
            cost,
        })
    }

    /// Persist the completed assistant turn and charge for it
    ///
    /// Runs only after the full response content is known. If the debit
    /// loses a concurrent-send race, the just-persisted assistant message is
    /// rolled back so an uncharged turn never appears as completed.
    async fn commit_assistant_turn(
        &self,
        user: &User,
        chat_id: Uuid,
        content: &str,
        cost: i64,
    ) -> AppResult<(Message, i64)> {
        let assistant_message = self
            .db
            .chats()
            .add_message(chat_id, MessageRole::Assistant, content, cost)
            .await?;

        let receipt = match self
            .ledger
            .charge(user, cost, Some(assistant_message.id), "Chat completion")
            .await
        {
            Ok(receipt) => receipt,
            Err(e) => {
                self.db.chats().delete_message(assistant_message.id).await?;
                return Err(e);
            }
        };

        Ok((assistant_message, receipt.new_balance))
    }

    /// Buffered send: one request, one complete response
    ///
    /// # Errors
    ///
    /// Returns validation, ownership, insufficient-credit, or upstream
    /// errors. No upstream failure ever debits credits.
    pub async fn send(
        &self,
        user: &User,
        chat_id: Option<Uuid>,
        model: Option<&str>,
        content: &str,
    ) -> AppResult<SendOutcome> {
        let prepared = self.prepare(user, chat_id, model, content).await?;

        let response = self.provider.complete(&prepared.request).await?;

        let (assistant_message, new_balance) = self
            .commit_assistant_turn(user, prepared.chat.id, &response.content, prepared.cost)
            .await?;

        info!(
            user_id = %user.id,
            chat_id = %prepared.chat.id,
            cost = prepared.cost,
            "Completed buffered send"
        );

        Ok(SendOutcome {
            chat: prepared.chat,
            user_message: prepared.user_message,
            assistant_message,
            credits_used: prepared.cost,
            new_balance,
        })
    }

    /// Streaming send: deltas as they arrive, then an authoritative terminal event
    ///
    /// The terminal [`ChatEvent::Completed`] is emitted only after the
    /// accumulated content has been persisted and the debit has committed.
    /// Consumers must treat that event, not stream closure, as success. If
    /// the upstream stream fails or ends early, the partial content is
    /// discarded and nothing is charged. Dropping the returned stream
    /// (client disconnect) likewise persists and debits nothing.
    ///
    /// # Errors
    ///
    /// Setup errors (validation, ownership, credit gate, initial upstream
    /// request) are returned before any stream is produced.
    pub async fn send_streaming(
        &self,
        user: &User,
        chat_id: Option<Uuid>,
        model: Option<&str>,
        content: &str,
    ) -> AppResult<impl Stream<Item = Result<ChatEvent, AppError>>> {
        let prepared = self.prepare(user, chat_id, model, content).await?;
        let mut upstream = self.provider.complete_stream(&prepared.request).await?;

        let service = self.clone();
        let user = user.clone();

        Ok(stream! {
            let mut accumulated = String::new();
            let mut finished = false;

            while let Some(chunk) = upstream.next().await {
                match chunk {
                    Ok(chunk) => {
                        if !chunk.delta.is_empty() {
                            accumulated.push_str(&chunk.delta);
                            yield Ok(ChatEvent::Delta {
                                content: chunk.delta,
                            });
                        }
                        if chunk.is_final {
                            finished = true;
                            break;
                        }
                    }
                    Err(e) => {
                        warn!(
                            chat_id = %prepared.chat.id,
                            discarded_chars = accumulated.len(),
                            "Stream failed; discarding partial content"
                        );
                        yield Err(e);
                        return;
                    }
                }
            }

            if !finished {
                warn!(
                    chat_id = %prepared.chat.id,
                    discarded_chars = accumulated.len(),
                    "Stream ended without a terminal chunk; discarding partial content"
                );
                yield Err(AppError::external_service(
                    "aggregator",
                    "Stream ended before completion",
                ));
                return;
            }

            match service
                .commit_assistant_turn(&user, prepared.chat.id, &accumulated, prepared.cost)
                .await
            {
                Ok((assistant_message, new_balance)) => {
                    info!(
                        user_id = %user.id,
                        chat_id = %prepared.chat.id,
                        cost = prepared.cost,
                        "Completed streaming send"
                    );
                    yield Ok(ChatEvent::Completed {
                        chat_id: prepared.chat.id,
                        message_id: assistant_message.id,
                        credits_used: prepared.cost,
                        new_balance,
                    });
                }
                Err(e) => yield Err(e),
            }
        })
    }
}

/// Derive a chat title from the first message
fn derive_title(content: &str) -> String {
    let first_line = content.lines().next().unwrap_or_default().trim();
    if first_line.chars().count() <= MAX_TITLE_CHARS {
        first_line.to_owned()
    } else {
        let truncated: String = first_line.chars().take(MAX_TITLE_CHARS).collect();
        format!("{truncated}…")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derive_title_short_message() {
        assert_eq!(derive_title("Hello there"), "Hello there");
    }

    #[test]
    fn test_derive_title_uses_first_line() {
        assert_eq!(derive_title("Plan my week\nMonday: gym"), "Plan my week");
    }

    #[test]
    fn test_derive_title_truncates_long_message() {
        let long = "a".repeat(200);
        let title = derive_title(&long);
        assert_eq!(title.chars().count(), MAX_TITLE_CHARS + 1);
        assert!(title.ends_with('…'));
    }
}
