//! Campus-Harvest: a resumable scraper for legacy student portals
//!
//! This crate logs into a server-rendered academic portal, walks a fixed set of
//! datasets (class offerings, curricula, grades and a handful of single-page
//! reports), extracts their tables into typed records and persists progress so
//! that a long, rate-limited run can be paused and resumed without data loss.

pub mod config;
pub mod datasets;
pub mod extract;
pub mod harvest;
pub mod output;
pub mod schedule;
pub mod state;
pub mod storage;

use thiserror::Error;

/// Main error type for Campus-Harvest operations
#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Request timeout for {url} after {timeout_ms}ms")]
    Timeout { url: String, timeout_ms: u64 },

    #[error("Network error for {url}: {message}")]
    Network { url: String, message: String },

    #[error("Unexpected HTTP status {status} from {url}")]
    HttpStatus { url: String, status: u16 },

    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Parse error in {context}: {message}")]
    Parse { context: String, message: String },

    #[error("Pause requested")]
    PauseRequested,

    #[error("No credentials found. Please save your credentials first.")]
    MissingCredentials,

    #[error("Scraping already in progress")]
    AlreadyRunning,

    #[error("Scraper is not paused")]
    NotPaused,

    #[error("Unknown dataset: {0}")]
    UnknownDataset(String),

    #[error("Invalid state transition: {from} -> {to}")]
    InvalidTransition {
        from: state::RunStatus,
        to: state::RunStatus,
    },

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl HarvestError {
    /// Returns true for transport failures that are worth retrying
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout { .. } | Self::Network { .. })
    }

    /// Returns true for errors that abort a whole run rather than one dataset
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Authentication(_) | Self::MissingCredentials)
    }
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Invalid navigation pattern: {0}")]
    InvalidPattern(String),
}

/// Result type alias for Campus-Harvest operations
pub type Result<T> = std::result::Result<T, HarvestError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::Config;
pub use datasets::{DatasetKey, DatasetSelection};
pub use harvest::{ControlHandle, Orchestrator, RunOutcome};
pub use state::{RunStatus, ScrapeState};
