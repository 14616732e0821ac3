use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use rusqlite::Connection;
use tokio::task;
use tracing::{debug, warn};

use super::{HistoryStorage, SynthesisRecord, SynthesisStatus, SynthesisSummary};

/// SQLite-based synthesis history
pub struct SqliteHistory {
    /// Path to the SQLite database file
    db_path: PathBuf,
}

/// Open a SQLite connection with standard pragmas (busy_timeout).
fn open_connection(db_path: &Path) -> Result<Connection> {
    let conn = Connection::open(db_path)
        .with_context(|| format!("failed to open database: {}", db_path.display()))?;
    conn.execute_batch("PRAGMA busy_timeout=5000;")
        .context("failed to set busy_timeout")?;
    Ok(conn)
}

impl SqliteHistory {
    /// Create a new history database at the given path
    pub fn new(db_path: impl Into<PathBuf>) -> Result<Self> {
        let db_path = db_path.into();

        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create directory: {}", parent.display()))?;
        }

        let storage = Self { db_path };
        storage.init_schema()?;

        Ok(storage)
    }

    /// Open the history kept under a cache root (`<cache_root>/history.db`)
    pub fn in_cache_root(cache_root: impl AsRef<Path>) -> Result<Self> {
        Self::new(cache_root.as_ref().join("history.db"))
    }

    /// Initialize the database schema
    fn init_schema(&self) -> Result<()> {
        let conn = open_connection(&self.db_path)?;

        conn.execute_batch("PRAGMA journal_mode=WAL;")
            .context("failed to set WAL mode")?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS syntheses (
                id TEXT PRIMARY KEY,
                function TEXT NOT NULL,
                model TEXT NOT NULL,
                status TEXT NOT NULL,
                attempts INTEGER NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                error TEXT,
                data TEXT NOT NULL
            )",
            [],
        )
        .context("failed to create syntheses table")?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_syntheses_function ON syntheses(function)",
            [],
        )
        .context("failed to create function index")?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_syntheses_updated ON syntheses(updated_at)",
            [],
        )
        .context("failed to create updated_at index")?;

        debug!(path = %self.db_path.display(), "initialized SQLite history");

        Ok(())
    }
}

#[async_trait]
impl HistoryStorage for SqliteHistory {
    async fn save(&self, record: &SynthesisRecord) -> Result<()> {
        let record = record.clone();
        let db_path = self.db_path.clone();

        task::spawn_blocking(move || {
            let conn = open_connection(&db_path)?;

            // Full record, attempts included, as JSON
            let data = serde_json::to_string(&record)?;

            conn.execute(
                "INSERT OR REPLACE INTO syntheses (id, function, model, status, attempts, created_at, updated_at, error, data)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                rusqlite::params![
                    record.id,
                    record.function,
                    record.model,
                    record.status.to_string(),
                    record.attempts.len() as i64,
                    record.created_at.to_rfc3339(),
                    record.updated_at.to_rfc3339(),
                    record.error,
                    data,
                ],
            )?;

            debug!(id = %record.id, function = %record.function, "saved synthesis record");

            Ok::<_, anyhow::Error>(())
        })
        .await
        .context("spawn_blocking failed")??;

        Ok(())
    }

    async fn load(&self, id: &str) -> Result<Option<SynthesisRecord>> {
        let id = id.to_string();
        let db_path = self.db_path.clone();

        task::spawn_blocking(move || {
            let conn = open_connection(&db_path)?;

            let mut stmt = conn.prepare("SELECT data FROM syntheses WHERE id = ?1")?;

            let result = stmt.query_row([&id], |row| row.get::<_, String>(0));

            match result {
                Ok(data) => {
                    let record: SynthesisRecord = serde_json::from_str(&data)?;
                    debug!(id = %record.id, "loaded synthesis record");
                    Ok(Some(record))
                }
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e.into()),
            }
        })
        .await
        .context("spawn_blocking failed")?
    }

    async fn list(&self) -> Result<Vec<SynthesisSummary>> {
        let db_path = self.db_path.clone();

        task::spawn_blocking(move || {
            let conn = open_connection(&db_path)?;

            let mut stmt = conn.prepare(
                "SELECT id, function, model, status, attempts, created_at, updated_at, error
                 FROM syntheses
                 ORDER BY updated_at DESC",
            )?;

            let rows = stmt
                .query_map([], |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, i64>(4)?,
                        row.get::<_, String>(5)?,
                        row.get::<_, String>(6)?,
                        row.get::<_, Option<String>>(7)?,
                    ))
                })?
                .collect::<Result<Vec<_>, _>>()?;

            let mut result = Vec::with_capacity(rows.len());
            for (id, function, model, status_str, attempts, created_at, updated_at, error) in rows
            {
                let status = status_str.parse::<SynthesisStatus>().unwrap_or_else(|e| {
                    warn!(
                        id = %id,
                        status = %status_str,
                        error = %e,
                        "invalid status in database, defaulting to InProgress"
                    );
                    SynthesisStatus::InProgress
                });
                result.push(SynthesisSummary {
                    id,
                    function,
                    model,
                    status,
                    attempts: u32::try_from(attempts).unwrap_or_default(),
                    created_at,
                    updated_at,
                    error,
                });
            }

            Ok(result)
        })
        .await
        .context("spawn_blocking failed")?
    }

    async fn delete(&self, id: &str) -> Result<()> {
        let id = id.to_string();
        let db_path = self.db_path.clone();

        task::spawn_blocking(move || {
            let conn = open_connection(&db_path)?;
            conn.execute("DELETE FROM syntheses WHERE id = ?1", [&id])?;
            if conn.changes() == 0 {
                anyhow::bail!("synthesis record '{}' not found", id);
            }
            debug!(id = %id, "deleted synthesis record");
            Ok::<_, anyhow::Error>(())
        })
        .await
        .context("spawn_blocking failed")??;

        Ok(())
    }
}
