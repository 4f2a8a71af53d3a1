//! Hosted language-model access.

use async_trait::async_trait;
use futures::stream::BoxStream;
use thiserror::Error;

use crate::models::chat::ChatMessage;

pub mod anthropic;
pub mod sse;

pub use anthropic::AnthropicClient;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Malformed response: {0}")]
    Malformed(String),

    #[error("Model returned no text")]
    EmptyResponse,
}

/// Ordered text fragments of one generation.
pub type FragmentStream = BoxStream<'static, Result<String, LlmError>>;

/// One generation request: a role's settings plus the conversation so far.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub system: String,
    pub messages: Vec<ChatMessage>,
    pub temperature: f32,
    pub max_tokens: u32,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Generate the whole answer in one response.
    async fn complete(&self, request: CompletionRequest) -> Result<String, LlmError>;

    /// Generate the answer as a stream of fragments. Errors before the first
    /// byte are returned directly; later ones arrive as stream items.
    async fn stream(&self, request: CompletionRequest) -> Result<FragmentStream, LlmError>;
}
