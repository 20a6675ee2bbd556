//! State module for tracking scrape progress
//!
//! This module holds the single persisted root of a scrape and the run
//! lifecycle.
//!
//! # Components
//!
//! - `RunStatus`: where the orchestrator is in its lifecycle (idle, running, paused, ...)
//! - `ScrapeState`: progress counters, checkpoints, scraped data, errors and logs
//! - `Checkpoint`: resume cursor of a paginated dataset

mod scrape_state;
mod status;

// Re-export main types
pub use scrape_state::{
    Checkpoint, DatasetProgress, ErrorEntry, LogEntry, LogLevel, ScrapeState, MAX_SUBSTEP,
};
pub use status::RunStatus;
