use anyhow::Result;
use async_trait::async_trait;

use super::Message;

/// Response from an LLM
#[derive(Debug, Clone)]
pub struct LlmResponse {
    /// The message content
    pub message: Message,
}

/// Trait for LLM providers
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Send messages to the LLM and get a response.
    ///
    /// `messages` never contains system messages; the system prompt is passed
    /// separately.
    async fn chat(&self, model: &str, system: &str, messages: &[Message]) -> Result<LlmResponse>;

    /// Get the provider name
    fn name(&self) -> &str;
}
