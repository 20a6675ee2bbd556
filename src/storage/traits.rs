//! Storage traits and error types
//!
//! This module defines the trait interface for state backends and
//! associated error types.

use crate::state::{RunStatus, ScrapeState};
use crate::storage::RunRecord;
use crate::DatasetKey;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Run not found: {0}")]
    RunNotFound(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for state backend implementations
///
/// The orchestrator hands its store to a background writer thread, so
/// implementations must be `Send`.
pub trait StateStore: Send {
    // ===== Scrape State =====

    /// Replaces the persisted state with `state`
    fn save_state(&mut self, state: &ScrapeState) -> StorageResult<()>;

    /// Loads the last persisted state, if any
    fn load_state(&self) -> StorageResult<Option<ScrapeState>>;

    /// Deletes the persisted state
    fn clear_state(&mut self) -> StorageResult<()>;

    // ===== Run History =====

    /// Records the start of a run
    ///
    /// # Arguments
    ///
    /// * `session_id` - Session identifier of the run
    /// * `datasets` - Datasets selected for the run, in page order
    /// * `config_hash` - Hash of the configuration file
    ///
    /// # Returns
    ///
    /// The row ID of the new run
    fn create_run(
        &mut self,
        session_id: &str,
        datasets: &[DatasetKey],
        config_hash: &str,
    ) -> StorageResult<i64>;

    /// Updates the status of a run that is still open (paused, resumed)
    fn update_run_status(&mut self, session_id: &str, status: RunStatus) -> StorageResult<()>;

    /// Closes a run with a final status and a finish timestamp
    fn finish_run(&mut self, session_id: &str, status: RunStatus) -> StorageResult<()>;

    /// Lists the most recent runs, newest first
    fn list_runs(&self, limit: usize) -> StorageResult<Vec<RunRecord>>;
}
