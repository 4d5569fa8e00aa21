//! Generation client trait and request type.

use async_trait::async_trait;

use crate::error::LlmError;

/// A single text-in/text-out generation request.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub prompt: String,
    pub max_tokens: Option<u32>,
}

impl CompletionRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            max_tokens: None,
        }
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }
}

/// An external text-generation API.
///
/// One attempt per call: no retries, no streaming.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Model identifier, for logging.
    fn model_name(&self) -> &str;

    /// Send the prompt and return the raw response text.
    async fn generate(&self, request: CompletionRequest) -> Result<String, LlmError>;
}
