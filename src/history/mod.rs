mod sqlite;
mod state;
mod storage;

pub use sqlite::SqliteHistory;
pub use state::{AttemptOutcome, AttemptRecord, SynthesisRecord, SynthesisStatus, SynthesisSummary};
pub use storage::HistoryStorage;
