//! Harvest module: talking to the portal and driving a run
//!
//! This module contains the network and control side of a scrape, including:
//! - The cookie-preserving HTTP session with metrics and a request archive
//! - The login handshake with bounded retries
//! - Politeness delays and the slow-response breaker
//! - The orchestrator state machine and its control handle

mod breaker;
mod context;
mod control;
mod coordinator;
mod credentials;
mod fetcher;
mod hub;
mod login;
pub mod metrics;
mod pacing;

pub use breaker::SlowResponseBreaker;
pub use context::ScrapeContext;
pub use control::{ControlHandle, StopAck, TerminateAck};
pub use coordinator::{Orchestrator, RunOutcome};
pub use credentials::{CredentialSource, Credentials, EnvCredentials, StaticCredentials};
pub use fetcher::{build_http_client, HttpSession, PortalRequest, PortalResponse};
pub use hub::{ProgressObserver, StateHub, StateView};
pub use login::{Authenticator, LoginOutcome};
pub use metrics::{ArchivedExchange, RequestMetrics};
pub use pacing::{jitter, pause_for, Pacer};

use crate::config::Config;
use crate::storage::open_storage;
use crate::Result;
use std::path::Path;
use std::sync::Arc;

/// Opens the orchestrator the binary uses
///
/// State lives in the configured SQLite database and credentials are read
/// from the configured environment variables.
///
/// # Arguments
///
/// * `config` - The validated configuration
/// * `config_hash` - Fingerprint of the configuration file
///
/// # Returns
///
/// * `Ok(Orchestrator)` - Ready to start or resume
/// * `Err(HarvestError)` - The database could not be opened
pub fn open_orchestrator(config: Config, config_hash: &str) -> Result<Orchestrator> {
    let store = open_storage(Path::new(&config.storage.database_path))?;
    let credentials = Arc::new(EnvCredentials::from_config(&config.credentials));
    Orchestrator::new(config, Box::new(store), credentials, config_hash)
}
