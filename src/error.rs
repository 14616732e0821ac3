#[derive(Debug, thiserror::Error)]
pub enum SynthesisError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("malformed synthesis request for {name:?}: {reason}")]
    MalformedRequest { name: String, reason: String },

    #[error("agent failed to implement function {name:?} in {max_attempts} attempts")]
    BudgetExhausted { name: String, max_attempts: u32 },

    #[error("provider error: {0}")]
    Provider(String),

    #[error("call to {name:?} failed: {message}")]
    Call { name: String, message: String },

    #[error("storage error: {0}")]
    Storage(String),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl SynthesisError {
    pub(crate) fn malformed(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedRequest {
            name: name.into(),
            reason: reason.into(),
        }
    }
}
