use std::path::Path;

use tracing::{debug, info, warn};

use super::{CandidateLoader, LoadFailure, SynthesizedFunction, prompt, validate};
use crate::config::SynthesisRequest;
use crate::declaration::FunctionDeclaration;
use crate::error::SynthesisError;
use crate::history::{AttemptOutcome, AttemptRecord};
use crate::llm::{CompletionClient, Message, extract_code};

/// Where a synthesis currently stands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoopState {
    /// Waiting to ask for the next candidate
    #[default]
    Drafting,
    /// A completion request is in flight
    Requesting,
    /// Turning the candidate into a unit
    Loading,
    /// Running the assertions
    Validating,
    /// A candidate passed every test
    Accepted,
    /// The attempt budget ran out or the provider failed
    Aborted,
}

impl LoopState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Accepted | Self::Aborted)
    }
}

/// Request, load and validate candidates until one passes or the budget runs out.
///
/// The conversation is seeded once and only ever grows: every attempt appends
/// the code instruction and the agent's reply, and every failed attempt also
/// appends a feedback message describing what went wrong.
pub struct SynthesisLoop {
    declaration: FunctionDeclaration,
    request: SynthesisRequest,
    loader: CandidateLoader,
    conversation: Vec<Message>,
    attempts: Vec<AttemptRecord>,
    state: LoopState,
}

impl SynthesisLoop {
    pub fn new(
        declaration: FunctionDeclaration,
        request: SynthesisRequest,
        cache_root: impl AsRef<Path>,
    ) -> Self {
        let helpers: Vec<_> = request
            .helpers
            .iter()
            .map(|h| h.declaration().metadata())
            .collect();
        let conversation =
            prompt::seed_conversation(&declaration.metadata(), &request.sketch, &helpers);
        let loader = CandidateLoader::new(cache_root, request.max_operations);

        Self {
            declaration,
            request,
            loader,
            conversation,
            attempts: Vec::new(),
            state: LoopState::Drafting,
        }
    }

    pub fn conversation(&self) -> &[Message] {
        &self.conversation
    }

    /// Every finished attempt, in order
    pub fn attempts(&self) -> &[AttemptRecord] {
        &self.attempts
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub async fn run(
        &mut self,
        client: &CompletionClient<'_>,
    ) -> Result<SynthesizedFunction, SynthesisError> {
        let name = self.declaration.name.clone();

        loop {
            let attempt = self.attempts.len() as u32 + 1;
            if let Some(max_attempts) = self.request.max_attempts {
                if attempt > max_attempts {
                    self.state = LoopState::Aborted;
                    warn!(function = %name, max_attempts, "attempt budget exhausted");
                    return Err(SynthesisError::BudgetExhausted { name, max_attempts });
                }
            }

            info!(function = %name, attempt, "requesting implementation");
            self.state = LoopState::Requesting;
            self.conversation.push(prompt::code_instruction());

            let response = match client.complete(&self.conversation).await {
                Ok(response) => response,
                Err(e) => {
                    self.state = LoopState::Aborted;
                    return Err(SynthesisError::Provider(format!("{:#}", e)));
                }
            };
            self.conversation.push(Message::assistant(response.as_str()));

            let code = extract_code(&response);
            let source_path = match self.loader.persist(&name, &code) {
                Ok(path) => path,
                Err(e) => {
                    self.state = LoopState::Aborted;
                    return Err(e.into());
                }
            };

            self.state = LoopState::Loading;
            let helpers = &self.request.helpers;
            let loaded = self.loader.load(&self.declaration, &code, helpers, source_path);
            let (outcome, feedback) = match loaded {
                Err(LoadFailure::Load { trace }) => {
                    let feedback =
                        format!("Your implementation caused an error while loading:\n{}", trace);
                    (AttemptOutcome::LoadError { trace }, feedback)
                }
                Err(LoadFailure::MissingEntryPoint { expected }) => {
                    let feedback = format!(
                        "Your implementation does not contain a top level function called \"{}\"",
                        expected
                    );
                    (AttemptOutcome::MissingEntryPoint { expected }, feedback)
                }
                Ok(function) => {
                    self.state = LoopState::Validating;
                    let failures = validate(&function, &self.request.tests);
                    if failures.is_empty() {
                        self.attempts.push(AttemptRecord {
                            attempt,
                            code,
                            outcome: AttemptOutcome::Success,
                        });
                        self.state = LoopState::Accepted;
                        info!(function = %name, attempt, "implementation accepted");
                        return Ok(function.with_attempts(attempt));
                    }

                    let feedback = assertion_feedback(&failures);
                    (AttemptOutcome::AssertionFailures { failures }, feedback)
                }
            };

            debug!(function = %name, attempt, outcome = outcome.kind(), "attempt failed");
            self.conversation.push(Message::feedback(feedback));
            self.attempts.push(AttemptRecord {
                attempt,
                code,
                outcome,
            });
            self.state = LoopState::Drafting;
        }
    }
}

fn assertion_feedback(failures: &[String]) -> String {
    let mut lines = vec!["Your implementation does not pass the tests:".to_string()];
    lines.extend(failures.iter().map(|f| format!("- {}", f)));
    lines.join("\n")
}
