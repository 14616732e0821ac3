use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

/// Record of one synthesis, persisted for later inspection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SynthesisRecord {
    /// Unique record identifier
    pub id: String,

    /// Declared function name
    pub function: String,

    /// Declared signature
    pub signature: String,

    /// Model the candidates were requested from
    pub model: String,

    /// Current status
    pub status: SynthesisStatus,

    /// Every attempt, in order
    pub attempts: Vec<AttemptRecord>,

    /// When the synthesis started
    pub created_at: DateTime<Utc>,

    /// When the record was last updated
    pub updated_at: DateTime<Utc>,

    /// Why the synthesis was aborted, if it was
    pub error: Option<String>,
}

impl SynthesisRecord {
    pub fn new(
        function: impl Into<String>,
        signature: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            function: function.into(),
            signature: signature.into(),
            model: model.into(),
            status: SynthesisStatus::InProgress,
            attempts: Vec::new(),
            created_at: now,
            updated_at: now,
            error: None,
        }
    }

    pub fn set_attempts(&mut self, attempts: Vec<AttemptRecord>) {
        self.attempts = attempts;
        self.updated_at = Utc::now();
    }

    /// Mark the synthesis as accepted
    pub fn accept(&mut self) {
        self.status = SynthesisStatus::Accepted;
        self.updated_at = Utc::now();
    }

    /// Set an error and mark as aborted
    pub fn abort(&mut self, error: impl Into<String>) {
        self.error = Some(error.into());
        self.status = SynthesisStatus::Aborted;
        self.updated_at = Utc::now();
    }
}

/// One request-load-validate cycle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttemptRecord {
    /// 1-based attempt number
    pub attempt: u32,
    /// Code extracted from the agent's response
    pub code: String,
    pub outcome: AttemptOutcome,
}

/// How an attempt ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AttemptOutcome {
    LoadError { trace: String },
    MissingEntryPoint { expected: String },
    AssertionFailures { failures: Vec<String> },
    Success,
}

impl AttemptOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::LoadError { .. } => "load_error",
            Self::MissingEntryPoint { .. } => "missing_entry_point",
            Self::AssertionFailures { .. } => "assertion_failures",
            Self::Success => "success",
        }
    }
}

/// Status of a synthesis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SynthesisStatus {
    /// Synthesis is running
    #[default]
    InProgress,
    /// A candidate passed every test
    Accepted,
    /// The synthesis failed
    Aborted,
}

impl std::fmt::Display for SynthesisStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InProgress => write!(f, "in_progress"),
            Self::Accepted => write!(f, "accepted"),
            Self::Aborted => write!(f, "aborted"),
        }
    }
}

impl FromStr for SynthesisStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "in_progress" | "inprogress" => Ok(Self::InProgress),
            "accepted" => Ok(Self::Accepted),
            "aborted" => Ok(Self::Aborted),
            _ => anyhow::bail!(
                "invalid synthesis status '{}' (expected: in_progress, accepted, aborted)",
                s
            ),
        }
    }
}

/// Summary of a synthesis for listing (without attempt details)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SynthesisSummary {
    pub id: String,
    pub function: String,
    pub model: String,
    pub status: SynthesisStatus,
    pub attempts: u32,
    pub created_at: String,
    pub updated_at: String,
    pub error: Option<String>,
}

impl std::fmt::Display for SynthesisSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let id_short: String = self.id.chars().take(8).collect();

        write!(
            f,
            "{:<10} {:<12} {:<9} {:<20} {}",
            id_short, self.status, self.attempts, self.model, self.function
        )
    }
}
