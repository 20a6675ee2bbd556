//! Storage module for persisting scrape state
//!
//! This module handles all database operations, including:
//! - SQLite database initialization and schema management
//! - Scrape state persistence (one JSON row, last write wins)
//! - Run history for `--stats`
//! - The background writer that keeps persistence off the scraping flow

mod schema;
mod sqlite;
mod traits;
mod writer;

pub use sqlite::SqliteStateStore;
pub use traits::{StateStore, StorageError, StorageResult};
pub use writer::{PersistHandle, WriterMessage};

use crate::state::RunStatus;
use crate::DatasetKey;
use std::path::Path;

/// Initializes or opens the state database
///
/// # Arguments
///
/// * `path` - Path to the SQLite database file
///
/// # Returns
///
/// * `Ok(SqliteStateStore)` - Successfully initialized storage
/// * `Err(StorageError)` - Failed to initialize storage
pub fn open_storage(path: &Path) -> StorageResult<SqliteStateStore> {
    SqliteStateStore::new(path)
}

/// Represents a scrape run
#[derive(Debug, Clone)]
pub struct RunRecord {
    pub id: i64,
    pub session_id: String,
    pub started_at: String,
    pub finished_at: Option<String>,
    pub status: RunStatus,
    pub datasets: Vec<DatasetKey>,
    pub config_hash: String,
}
