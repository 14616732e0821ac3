use anyhow::{Context, Result};
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{debug, info, warn};

use super::{CompletionCache, Debugger, LlmProvider, Message, MessageRole};

/// Request/response front for one conversation.
///
/// Splits the system prompt off, answers from the completion cache when it
/// can, and feeds the logging and debugging sinks. None of these affect what
/// text comes back for a given conversation.
pub struct CompletionClient<'a> {
    provider: &'a dyn LlmProvider,
    model: String,
    tag: String,
    cache: Option<CompletionCache>,
    log: bool,
    debugger: Option<&'a dyn Debugger>,
    echoed: AtomicUsize,
}

impl<'a> CompletionClient<'a> {
    pub fn new(provider: &'a dyn LlmProvider, model: impl Into<String>) -> Self {
        let model = model.into();
        Self {
            provider,
            tag: model.clone(),
            model,
            cache: None,
            log: false,
            debugger: None,
            echoed: AtomicUsize::new(0),
        }
    }

    /// Label used in log lines and debugger output
    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = tag.into();
        self
    }

    pub fn cache(mut self, cache: CompletionCache) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Echo prompts and responses at info level instead of debug
    pub fn log(mut self, log: bool) -> Self {
        self.log = log;
        self
    }

    pub fn debugger(mut self, debugger: &'a dyn Debugger) -> Self {
        self.debugger = Some(debugger);
        self
    }

    /// Get one completion for the full conversation
    pub async fn complete(&self, conversation: &[Message]) -> Result<String> {
        let start = self.echoed.swap(conversation.len(), Ordering::Relaxed);
        for message in conversation.iter().skip(start) {
            self.echo(message.role, &message.content);
        }

        let cached = match &self.cache {
            Some(cache) => cache.lookup(&self.model, conversation).unwrap_or_else(|e| {
                warn!(tag = %self.tag, error = %e, "ignoring unreadable cache entry");
                None
            }),
            None => None,
        };

        let response = match cached {
            Some(text) => text,
            None => {
                let text = self.request(conversation).await?;
                if let Some(cache) = &self.cache {
                    if let Err(e) = cache.store(&self.model, conversation, &text) {
                        warn!(tag = %self.tag, error = %e, "failed to cache completion");
                    }
                }
                text
            }
        };

        self.echo(MessageRole::Assistant, &response);

        if let Some(debugger) = self.debugger {
            debugger
                .step(&self.tag, conversation, &response)
                .await
                .context("debugger failed")?;
        }

        Ok(response)
    }

    async fn request(&self, conversation: &[Message]) -> Result<String> {
        let system = conversation
            .iter()
            .filter(|m| m.role == MessageRole::System)
            .map(|m| m.content.as_str())
            .collect::<Vec<_>>()
            .join("\n\n");
        let messages: Vec<Message> = conversation
            .iter()
            .filter(|m| m.role != MessageRole::System)
            .cloned()
            .collect();

        debug!(
            tag = %self.tag,
            provider = self.provider.name(),
            model = %self.model,
            messages = messages.len(),
            "requesting completion"
        );

        let response = self
            .provider
            .chat(&self.model, &system, &messages)
            .await
            .with_context(|| format!("{} request to {} failed", self.tag, self.provider.name()))?;

        Ok(response.message.content)
    }

    fn echo(&self, role: MessageRole, content: &str) {
        if self.log {
            info!(tag = %self.tag, %role, "\n{}", content);
        } else {
            debug!(tag = %self.tag, %role, "\n{}", content);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::LlmResponse;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use tempfile::TempDir;

    struct EchoProvider {
        seen: Mutex<Vec<(String, usize)>>,
    }

    #[async_trait]
    impl LlmProvider for EchoProvider {
        async fn chat(
            &self,
            _model: &str,
            system: &str,
            messages: &[Message],
        ) -> Result<LlmResponse> {
            self.seen
                .lock()
                .unwrap()
                .push((system.to_string(), messages.len()));
            Ok(LlmResponse {
                message: Message::assistant(format!("reply to {} messages", messages.len())),
            })
        }

        fn name(&self) -> &str {
            "echo"
        }
    }

    #[tokio::test]
    async fn system_prompt_is_split_off() {
        let provider = EchoProvider {
            seen: Mutex::new(Vec::new()),
        };
        let client = CompletionClient::new(&provider, "test-model");
        let conversation = vec![Message::system("persona"), Message::user("task")];

        let text = client.complete(&conversation).await.expect("complete");

        assert_eq!(text, "reply to 1 messages");
        assert_eq!(
            provider.seen.lock().unwrap().as_slice(),
            &[("persona".to_string(), 1)]
        );
    }

    #[tokio::test]
    async fn cached_conversations_are_not_resent() {
        let dir = TempDir::new().expect("create temp dir");
        let provider = EchoProvider {
            seen: Mutex::new(Vec::new()),
        };
        let conversation = vec![Message::system("persona"), Message::user("task")];

        for _ in 0..2 {
            let client = CompletionClient::new(&provider, "test-model")
                .cache(CompletionCache::new(dir.path()));
            let text = client.complete(&conversation).await.expect("complete");
            assert_eq!(text, "reply to 1 messages");
        }

        assert_eq!(provider.seen.lock().unwrap().len(), 1);
    }
}
