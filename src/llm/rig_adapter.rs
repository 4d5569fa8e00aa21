//! Bridges rig-core completion models to our `LlmProvider` trait.

use std::time::Duration;

use async_trait::async_trait;
use rig::agent::AgentBuilder;
use rig::completion::{CompletionModel, Prompt};

use crate::error::LlmError;
use crate::llm::provider::{CompletionRequest, LlmProvider};

/// Anthropic rejects requests without an explicit output budget.
const DEFAULT_MAX_TOKENS: u32 = 2048;

/// Wraps a rig `CompletionModel` (Anthropic, OpenAI) as a one-shot generator.
pub struct RigAdapter<M> {
    model: M,
    model_name: String,
    provider: &'static str,
    timeout: Duration,
}

impl<M> RigAdapter<M>
where
    M: CompletionModel,
{
    pub fn new(model: M, model_name: &str, provider: &'static str, timeout: Duration) -> Self {
        Self {
            model,
            model_name: model_name.to_string(),
            provider,
            timeout,
        }
    }
}

#[async_trait]
impl<M> LlmProvider for RigAdapter<M>
where
    M: CompletionModel + 'static,
{
    fn model_name(&self) -> &str {
        &self.model_name
    }

    async fn generate(&self, request: CompletionRequest) -> Result<String, LlmError> {
        let agent = AgentBuilder::new(self.model.clone())
            .max_tokens(u64::from(request.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS)))
            .build();

        let text = tokio::time::timeout(self.timeout, async {
            agent.prompt(request.prompt.as_str()).await
        })
        .await
        .map_err(|_| LlmError::Timeout {
            provider: self.provider.to_string(),
            timeout: self.timeout,
        })?
        .map_err(|e| LlmError::RequestFailed {
            provider: self.provider.to_string(),
            reason: e.to_string(),
        })?;

        if text.trim().is_empty() {
            return Err(LlmError::EmptyResponse {
                provider: self.provider.to_string(),
            });
        }
        Ok(text)
    }
}
