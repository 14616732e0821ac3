use anyhow::{Context, Result};
use async_trait::async_trait;
use llm::builder::{LLMBackend, LLMBuilder};
use llm::chat::{ChatMessage, ChatRole, MessageType};
use tracing::warn;

use super::retry::{RetryConfig, retry_with_backoff};
use super::{LlmProvider, LlmResponse, Message, MessageRole};

const MAX_TOKENS: u32 = 8192;

/// Anthropic LLM provider using the llm crate
pub struct AnthropicProvider {
    api_key: String,
    retry: RetryConfig,
}

impl AnthropicProvider {
    /// Create a provider reading `ANTHROPIC_API_KEY`
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("ANTHROPIC_API_KEY")
            .context("ANTHROPIC_API_KEY environment variable not set")?;
        Ok(Self {
            api_key,
            retry: RetryConfig::default(),
        })
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Model used when nothing else is configured
    pub fn default_model() -> &'static str {
        "claude-sonnet-4-20250514"
    }
}

#[async_trait]
impl LlmProvider for AnthropicProvider {
    fn name(&self) -> &str {
        "anthropic"
    }

    async fn chat(&self, model: &str, system: &str, messages: &[Message]) -> Result<LlmResponse> {
        retry_with_backoff(&self.retry, "anthropic chat", || {
            send(LLMBackend::Anthropic, "Anthropic", &self.api_key, model, system, messages)
        })
        .await
    }
}

/// OpenAI LLM provider using the llm crate
pub struct OpenAIProvider {
    api_key: String,
    retry: RetryConfig,
}

impl OpenAIProvider {
    /// Create a provider reading `OPENAI_API_KEY`
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .context("OPENAI_API_KEY environment variable not set")?;
        Ok(Self {
            api_key,
            retry: RetryConfig::default(),
        })
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Model used when nothing else is configured
    pub fn default_model() -> &'static str {
        "gpt-5-nano"
    }
}

#[async_trait]
impl LlmProvider for OpenAIProvider {
    fn name(&self) -> &str {
        "openai"
    }

    async fn chat(&self, model: &str, system: &str, messages: &[Message]) -> Result<LlmResponse> {
        retry_with_backoff(&self.retry, "openai chat", || {
            send(LLMBackend::OpenAI, "OpenAI", &self.api_key, model, system, messages)
        })
        .await
    }
}

/// One round-trip through the llm crate. No timeout: a synthesis waits for as
/// long as the provider takes.
async fn send(
    backend: LLMBackend,
    label: &str,
    api_key: &str,
    model: &str,
    system: &str,
    messages: &[Message],
) -> Result<LlmResponse> {
    let llm = LLMBuilder::new()
        .backend(backend)
        .api_key(api_key)
        .model(model)
        .system(system)
        .max_tokens(MAX_TOKENS)
        .build()
        .context("failed to build LLM client")?;

    let chat_messages = to_chat_messages(messages);

    let response = llm
        .chat(&chat_messages)
        .await
        .with_context(|| format!("failed to call {} API", label))?;

    let content = response.text().unwrap_or_else(|| {
        warn!(provider = label, "API returned empty or missing response text");
        String::new()
    });

    Ok(LlmResponse {
        message: Message::assistant(content),
    })
}

fn to_chat_messages(messages: &[Message]) -> Vec<ChatMessage> {
    messages
        .iter()
        .filter_map(|msg| {
            let role = match msg.role {
                // Feedback is what the calling program tells the agent
                MessageRole::User | MessageRole::Feedback => ChatRole::User,
                MessageRole::Assistant => ChatRole::Assistant,
                MessageRole::System => return None, // System messages handled separately
            };
            Some(ChatMessage {
                role,
                message_type: MessageType::Text,
                content: msg.content.clone(),
            })
        })
        .collect()
}
