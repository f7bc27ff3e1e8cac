//! Chat transcript
//!
//! Message history for the assistant, with transactional exchange
//! semantics: a query appends a user message and an unsealed assistant
//! placeholder together, the placeholder is sealed exactly once on
//! success, and on failure both messages are removed so the transcript
//! returns to its pre-query state. At most one message is unsealed at any
//! time and it is always the newest assistant entry.

use crate::stream::CodeExample;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Who authored a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The human operator
    User,
    /// The assistant
    Assistant,
}

/// One transcript entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Author
    pub role: Role,
    /// Message text; mutable only while `streaming` is set
    pub content: String,
    /// Supporting examples, populated when the exchange seals
    #[serde(default)]
    pub examples: Vec<CodeExample>,
    /// When the message was appended
    pub timestamp: DateTime<Utc>,
    /// Whether this message is still accumulating
    pub streaming: bool,
}

impl ChatMessage {
    fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            examples: Vec::new(),
            timestamp: Utc::now(),
            streaming: false,
        }
    }

    fn placeholder() -> Self {
        Self {
            role: Role::Assistant,
            content: String::new(),
            examples: Vec::new(),
            timestamp: Utc::now(),
            streaming: true,
        }
    }
}

/// Transcript invariant violations
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum TranscriptError {
    /// A new exchange was opened while one is still unsealed
    #[error("an exchange is already in progress")]
    ExchangeInProgress,

    /// Seal or rollback was requested with no open exchange
    #[error("no exchange is in progress")]
    NoActiveExchange,
}

/// Ordered message history with transactional exchanges
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Transcript {
    messages: Vec<ChatMessage>,
}

impl Transcript {
    /// Create an empty transcript
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// All messages, oldest first
    #[inline]
    #[must_use]
    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    /// Number of messages
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Whether the transcript is empty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Whether an exchange is open (an unsealed placeholder exists)
    #[must_use]
    pub fn exchange_open(&self) -> bool {
        self.messages.last().is_some_and(|m| m.streaming)
    }

    /// Open an exchange: append the user message and an unsealed
    /// assistant placeholder as one transaction.
    pub fn begin_exchange(&mut self, query: impl Into<String>) -> Result<(), TranscriptError> {
        if self.exchange_open() {
            return Err(TranscriptError::ExchangeInProgress);
        }
        self.messages.push(ChatMessage::user(query));
        self.messages.push(ChatMessage::placeholder());
        Ok(())
    }

    /// Seal the open exchange: atomically copy the accumulated answer and
    /// examples into the placeholder and freeze it. The only path that
    /// finalizes a message.
    pub fn seal(
        &mut self,
        content: String,
        examples: Vec<CodeExample>,
    ) -> Result<(), TranscriptError> {
        let last = self
            .messages
            .last_mut()
            .filter(|m| m.streaming && m.role == Role::Assistant)
            .ok_or(TranscriptError::NoActiveExchange)?;
        last.content = content;
        last.examples = examples;
        last.streaming = false;
        Ok(())
    }

    /// Roll back the open exchange: remove the placeholder and the user
    /// message that triggered it, restoring the pre-query transcript.
    ///
    /// Note the user's own message is discarded too; this mirrors the
    /// long-standing behavior of the workflow and is pinned by tests.
    pub fn rollback(&mut self) -> Result<(), TranscriptError> {
        if !self.exchange_open() {
            return Err(TranscriptError::NoActiveExchange);
        }
        self.messages.pop();
        debug_assert!(self.messages.last().is_some_and(|m| m.role == Role::User));
        self.messages.pop();
        Ok(())
    }
}
