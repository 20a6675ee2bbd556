//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the StateStore trait.

use crate::state::{RunStatus, ScrapeState};
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{StateStore, StorageError, StorageResult};
use crate::storage::RunRecord;
use crate::DatasetKey;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;

/// SQLite storage backend
pub struct SqliteStateStore {
    conn: Connection,
}

impl SqliteStateStore {
    /// Creates a new SqliteStateStore instance
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteStateStore)` - Successfully opened/created database
    /// * `Err(StorageError)` - Failed to open database
    pub fn new(path: &Path) -> StorageResult<Self> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database (for testing)
    #[cfg(test)]
    pub fn new_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }
}

fn join_datasets(datasets: &[DatasetKey]) -> String {
    datasets
        .iter()
        .map(DatasetKey::as_str)
        .collect::<Vec<_>>()
        .join(",")
}

fn split_datasets(joined: &str) -> Vec<DatasetKey> {
    joined.split(',').filter_map(DatasetKey::parse).collect()
}

impl StateStore for SqliteStateStore {
    // ===== Scrape State =====

    fn save_state(&mut self, state: &ScrapeState) -> StorageResult<()> {
        let payload = serde_json::to_string(state)?;
        self.conn.execute(
            "INSERT INTO scrape_state (id, payload, updated_at) VALUES (1, ?1, ?2)
             ON CONFLICT(id) DO UPDATE SET payload = excluded.payload, updated_at = excluded.updated_at",
            params![payload, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    fn load_state(&self) -> StorageResult<Option<ScrapeState>> {
        let payload: Option<String> = self
            .conn
            .query_row("SELECT payload FROM scrape_state WHERE id = 1", [], |row| {
                row.get(0)
            })
            .optional()?;

        match payload {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    fn clear_state(&mut self) -> StorageResult<()> {
        self.conn.execute("DELETE FROM scrape_state", [])?;
        Ok(())
    }

    // ===== Run History =====

    fn create_run(
        &mut self,
        session_id: &str,
        datasets: &[DatasetKey],
        config_hash: &str,
    ) -> StorageResult<i64> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO runs (session_id, started_at, status, datasets, config_hash)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                session_id,
                now,
                RunStatus::Running.to_db_string(),
                join_datasets(datasets),
                config_hash
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn update_run_status(&mut self, session_id: &str, status: RunStatus) -> StorageResult<()> {
        let changed = self.conn.execute(
            "UPDATE runs SET status = ?1 WHERE session_id = ?2",
            params![status.to_db_string(), session_id],
        )?;
        if changed == 0 {
            return Err(StorageError::RunNotFound(session_id.to_string()));
        }
        Ok(())
    }

    fn finish_run(&mut self, session_id: &str, status: RunStatus) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        let changed = self.conn.execute(
            "UPDATE runs SET status = ?1, finished_at = ?2 WHERE session_id = ?3",
            params![status.to_db_string(), now, session_id],
        )?;
        if changed == 0 {
            return Err(StorageError::RunNotFound(session_id.to_string()));
        }
        Ok(())
    }

    fn list_runs(&self, limit: usize) -> StorageResult<Vec<RunRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, session_id, started_at, finished_at, status, datasets, config_hash
             FROM runs ORDER BY id DESC LIMIT ?1",
        )?;

        let runs = stmt
            .query_map(params![limit as i64], |row| {
                Ok(RunRecord {
                    id: row.get(0)?,
                    session_id: row.get(1)?,
                    started_at: row.get(2)?,
                    finished_at: row.get(3)?,
                    status: RunStatus::from_db_string(&row.get::<_, String>(4)?)
                        .unwrap_or(RunStatus::Failed),
                    datasets: split_datasets(&row.get::<_, String>(5)?),
                    config_hash: row.get(6)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(runs)
    }
}
