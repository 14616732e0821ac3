#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Mutex;

use anyhow::Result;
use async_trait::async_trait;

use fnsynth::{LlmProvider, LlmResponse, Message};

/// One request the mock received
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub model: String,
    pub system: String,
    pub messages: Vec<Message>,
}

/// A mock LLM provider that replays scripted responses in order and records
/// every request it receives.
pub struct MockLlmProvider {
    responses: Mutex<VecDeque<String>>,
    requests: Mutex<Vec<RecordedRequest>>,
}

impl MockLlmProvider {
    /// Create a mock that answers once with `text`.
    pub fn single_response(text: &str) -> Self {
        Self::with_responses(vec![text.to_string()])
    }

    /// Create a mock from a sequence of responses (popped in order).
    pub fn with_responses(responses: Vec<String>) -> Self {
        Self {
            responses: Mutex::new(VecDeque::from(responses)),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Create a mock that answers the next `times` requests with `text`.
    pub fn repeating(text: &str, times: usize) -> Self {
        Self::with_responses(vec![text.to_string(); times])
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl LlmProvider for MockLlmProvider {
    async fn chat(&self, model: &str, system: &str, messages: &[Message]) -> Result<LlmResponse> {
        self.requests.lock().unwrap().push(RecordedRequest {
            model: model.to_string(),
            system: system.to_string(),
            messages: messages.to_vec(),
        });

        let mut queue = self.responses.lock().unwrap();
        let text = queue
            .pop_front()
            .ok_or_else(|| anyhow::anyhow!("MockLlmProvider: no more responses in queue"))?;
        Ok(LlmResponse {
            message: Message::assistant(text),
        })
    }

    fn name(&self) -> &str {
        "mock"
    }
}

/// Wrap Rhai source in a fenced block, as a model would reply
pub fn rhai_block(code: &str) -> String {
    format!("Here you go:\n```rhai\n{}\n```", code)
}
