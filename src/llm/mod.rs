mod anthropic;
mod cache;
mod client;
mod code_block;
mod debugger;
mod message;
mod provider;
mod retry;

pub use anthropic::{AnthropicProvider, OpenAIProvider};
pub use cache::{CompletionCache, cache_key};
pub use client::CompletionClient;
pub use code_block::extract_code;
pub use debugger::{Debugger, StdinDebugger};
pub use message::{Message, MessageRole};
pub use provider::{LlmProvider, LlmResponse};
pub use retry::{RetryConfig, is_retryable_error, retry_with_backoff};
