use anyhow::Result;
use async_trait::async_trait;

use super::{SynthesisRecord, SynthesisSummary};

/// Storage backend for synthesis history
#[async_trait]
pub trait HistoryStorage: Send + Sync {
    /// Save a record, replacing any previous version with the same id
    async fn save(&self, record: &SynthesisRecord) -> Result<()>;

    /// Load a record by ID
    async fn load(&self, id: &str) -> Result<Option<SynthesisRecord>>;

    /// List all records, most recently updated first
    async fn list(&self) -> Result<Vec<SynthesisSummary>>;

    /// Delete a record
    async fn delete(&self, id: &str) -> Result<()>;
}
