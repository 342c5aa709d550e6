//! Model client abstraction
//!
//! One interface covers both call shapes: a single completion and a stream of
//! text chunks. Clients that cannot stream get a one-chunk stream for free.

mod http;
mod sse;

pub use http::OpenAiClient;
pub use sse::{SseDecoder, SseEvent};

use crate::error::ModelError;
use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use serde::{Deserialize, Serialize};

/// Stream of text chunks in arrival order
pub type ChunkStream = BoxStream<'static, Result<String, ModelError>>;

/// Chat role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System instruction
    System,
    /// User turn
    User,
    /// Model turn
    Assistant,
}

/// One chat message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Author role
    pub role: Role,
    /// Message text
    pub content: String,
}

impl ChatMessage {
    /// System message
    #[inline]
    #[must_use]
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    /// User message
    #[inline]
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// Chat completion request
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatRequest {
    /// Model identifier
    pub model: String,
    /// Conversation, system message first
    pub messages: Vec<ChatMessage>,
    /// Sampling temperature
    pub temperature: f32,
    /// Completion token limit
    pub max_tokens: u32,
    /// Request a streamed response
    pub stream: bool,
}

impl ChatRequest {
    /// Text of the last user message
    #[must_use]
    pub fn user_prompt(&self) -> Option<&str> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.as_str())
    }
}

/// Language model backend
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ModelClient: Send + Sync {
    /// Single completion: `choices[0].message.content`
    async fn complete(&self, request: &ChatRequest) -> Result<String, ModelError>;

    /// Streamed completion
    ///
    /// Defaults to one chunk holding the full completion.
    async fn stream(&self, request: &ChatRequest) -> Result<ChunkStream, ModelError> {
        let text = self.complete(request).await?;
        Ok(stream::once(async move { Ok(text) }).boxed())
    }
}
