use crate::error::SynthesisError;
use crate::synthesis::Helper;

pub const DEFAULT_MODEL: &str = "gpt-5-nano";
pub const DEFAULT_SKETCH: &str = "// Todo";
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;
/// Operation budget for a single engine run (load, one assertion, one call)
pub const DEFAULT_MAX_OPERATIONS: u64 = 50_000_000;

/// Everything one synthesis needs besides the declaration itself.
///
/// Built once per declared function and never mutated afterwards; the
/// synthesis loop only reads it.
#[derive(Debug, Clone)]
pub struct SynthesisRequest {
    /// Model identifier passed to the provider
    pub model: String,
    /// Pseudo-code outline placed under the doc in the prompt
    pub sketch: String,
    /// Functions the generated code may call without defining them
    pub helpers: Vec<Helper>,
    /// Boolean Rhai expressions the implementation must satisfy
    pub tests: Vec<String>,
    /// Attempt budget, `None` for unbounded
    pub max_attempts: Option<u32>,
    /// Echo prompts and responses at info level
    pub log: bool,
    /// Step through every exchange with the debugger
    pub debug: bool,
    pub max_operations: u64,
}

impl Default for SynthesisRequest {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            sketch: DEFAULT_SKETCH.to_string(),
            helpers: Vec::new(),
            tests: Vec::new(),
            max_attempts: Some(DEFAULT_MAX_ATTEMPTS),
            log: true,
            debug: false,
            max_operations: DEFAULT_MAX_OPERATIONS,
        }
    }
}

impl SynthesisRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn sketch(mut self, sketch: impl Into<String>) -> Self {
        self.sketch = sketch.into();
        self
    }

    pub fn helper(mut self, helper: Helper) -> Self {
        self.helpers.push(helper);
        self
    }

    pub fn test(mut self, assertion: impl Into<String>) -> Self {
        self.tests.push(assertion.into());
        self
    }

    pub fn tests<I, S>(mut self, assertions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tests.extend(assertions.into_iter().map(Into::into));
        self
    }

    pub fn max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = Some(max_attempts);
        self
    }

    /// Remove the attempt budget; the loop runs until a candidate passes.
    pub fn unbounded(mut self) -> Self {
        self.max_attempts = None;
        self
    }

    pub fn log(mut self, log: bool) -> Self {
        self.log = log;
        self
    }

    pub fn debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn max_operations(mut self, max_operations: u64) -> Self {
        self.max_operations = max_operations;
        self
    }

    /// Reject requests that could never drive a synthesis.
    pub fn validate(&self, name: &str) -> Result<(), SynthesisError> {
        if self.model.trim().is_empty() {
            return Err(SynthesisError::malformed(name, "model must not be empty"));
        }
        if self.max_attempts == Some(0) {
            return Err(SynthesisError::malformed(
                name,
                "max_attempts must be a positive integer",
            ));
        }
        if let Some(index) = self.tests.iter().position(|t| t.trim().is_empty()) {
            return Err(SynthesisError::malformed(
                name,
                format!("test #{} is empty", index + 1),
            ));
        }
        if let Some(helper) = self.helpers.iter().find(|h| h.name() == name) {
            return Err(SynthesisError::malformed(
                name,
                format!("helper {:?} shadows the declared function", helper.name()),
            ));
        }
        Ok(())
    }
}
