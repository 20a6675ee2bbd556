//! Scrape orchestrator - the run state machine
//!
//! This module owns the single scrape state of the process and drives a run:
//! - Recovering a persisted state on startup (a crashed run becomes paused)
//! - Logging in, then walking the selected datasets in page order
//! - Honouring pause and hard-stop requests at dataset and sub-item boundaries
//! - Resuming a paused run from its dataset index and catalog checkpoint
//!
//! ```text
//! Idle ──start──▶ Running ──▶ Completed | Failed
//!                  │   ▲
//!             pause│   │resume
//!                  ▼   │
//!                 Paused ──hard stop──▶ Terminated
//! ```

use crate::config::Config;
use crate::datasets::{scrape_dataset, DatasetKey, DatasetSelection, StepOutcome};
use crate::extract::NavFilter;
use crate::harvest::context::ScrapeContext;
use crate::harvest::control::{ControlHandle, StopAck, TerminateAck};
use crate::harvest::credentials::{CredentialSource, Credentials};
use crate::harvest::fetcher::HttpSession;
use crate::harvest::hub::{ProgressObserver, StateHub, StateView};
use crate::harvest::login::Authenticator;
use crate::harvest::pacing::Pacer;
use crate::output::{aggregate_dataset, AggregatedView};
use crate::state::{LogLevel, RunStatus, ScrapeState};
use crate::storage::{PersistHandle, StateStore};
use crate::{HarvestError, Result};
use chrono::Utc;
use std::sync::Arc;
use uuid::Uuid;

/// How a call to `start` or `resume` ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// Every selected dataset was attempted
    Completed,
    /// Stopped gracefully; `resume` continues the run
    Paused,
    /// Hard-stopped while running; there is no resume
    Terminated,
}

/// Generates a session id such as `session_1718000000000_1f3a9c2be`
fn new_session_id() -> String {
    let suffix: String = Uuid::new_v4().simple().to_string().chars().take(9).collect();
    format!("session_{}_{}", Utc::now().timestamp_millis(), suffix)
}

/// Main scrape orchestrator
pub struct Orchestrator {
    config: Config,
    config_hash: String,
    credentials: Arc<dyn CredentialSource>,
    hub: StateHub,
    control: ControlHandle,
    pacer: Pacer,
    nav_filter: NavFilter,
    authenticator: Authenticator,
}

impl Orchestrator {
    /// Creates an orchestrator over the persisted state in `store`
    ///
    /// # Arguments
    ///
    /// * `config` - The validated configuration
    /// * `store` - State store; it is moved onto the background writer
    /// * `credentials` - Where the login is read from at the start of a run
    /// * `config_hash` - Fingerprint recorded with every run
    ///
    /// # Returns
    ///
    /// * `Ok(Orchestrator)` - Ready, with any interrupted run recovered as paused
    /// * `Err(HarvestError)` - The state could not be loaded or the writer not started
    pub fn new(
        config: Config,
        store: Box<dyn StateStore>,
        credentials: Arc<dyn CredentialSource>,
        config_hash: impl Into<String>,
    ) -> Result<Self> {
        let mut state = store.load_state()?.unwrap_or_default();
        let recovered = state.recover_interrupted_run();
        state.trim_logs(config.storage.log_history);

        let persist = PersistHandle::spawn(store)?;
        if recovered {
            tracing::warn!(
                "Previous run was interrupted at dataset {}; it is now paused",
                state.current_dataset_index + 1
            );
            if let Some(session_id) = &state.session_id {
                persist.run_status(session_id, RunStatus::Paused);
            }
        }

        let hub = StateHub::new(
            state,
            persist,
            config.storage.log_history,
            config.client.archive_capacity,
        );

        Ok(Self {
            pacer: Pacer::new(&config.pacing),
            nav_filter: NavFilter::from_config(&config.extraction)?,
            authenticator: Authenticator::new(config.pacing.login_retries),
            control: ControlHandle::new(),
            credentials,
            config_hash: config_hash.into(),
            config,
            hub,
        })
    }

    /// Starts a new run over `selection`
    ///
    /// Data scraped by earlier runs is kept; only the per-run counters,
    /// checkpoints and error list are reset.
    ///
    /// # Returns
    ///
    /// * `Ok(RunOutcome)` - How the run ended
    /// * `Err(HarvestError::AlreadyRunning)` - A run is in flight
    /// * `Err(HarvestError::MissingCredentials)` - Nothing to log in with
    /// * `Err(HarvestError::Authentication)` - Login failed; the run is `Failed`
    pub async fn start(&mut self, selection: &DatasetSelection) -> Result<RunOutcome> {
        if self.hub.get().status == RunStatus::Running {
            self.hub.log(LogLevel::Warning, "Scraping already in progress");
            return Err(HarvestError::AlreadyRunning);
        }
        let credentials = self.require_credentials()?;

        self.control.reset();
        let session_id = new_session_id();
        let order = selection.ordered();
        let total_steps = order.len() as u32 + 1;

        self.hub.update(|s| -> Result<()> {
            s.set_status(RunStatus::Running)?;
            s.session_id = Some(session_id.clone());
            s.selected_pages = selection.keys().clone();
            s.page_order = order.clone();
            s.current_dataset_index = 0;
            s.checkpoints.clear();
            s.errors.clear();
            s.total_steps = total_steps;
            s.completed_steps = 0;
            s.substep_progress = 0.0;
            s.progress = 0.0;
            s.current_step = "Initializing...".to_string();
            s.current_page = "initializing".to_string();
            s.started_at = Some(Utc::now());
            s.completed_at = None;
            s.last_failure = None;
            Ok(())
        })?;
        self.hub
            .persist_handle()
            .run_started(&session_id, &order, &self.config_hash);

        self.hub.log(LogLevel::Info, "=== Scraping started ===");
        let names: Vec<&str> = order.iter().map(DatasetKey::as_str).collect();
        self.hub.log(
            LogLevel::Info,
            format!("Selected datasets: {}", names.join(", ")),
        );

        self.run(&credentials, true).await
    }

    /// Continues a paused run from its dataset index and checkpoint
    ///
    /// A fresh session is opened and logged into; the login does not count
    /// as a new step.
    pub async fn resume(&mut self) -> Result<RunOutcome> {
        if !self.hub.get().status.is_resumable() {
            return Err(HarvestError::NotPaused);
        }
        let credentials = self.require_credentials()?;

        self.control.reset();
        self.hub.update(|s| s.set_status(RunStatus::Running))?;
        let state = self.hub.snapshot();
        if let Some(session_id) = &state.session_id {
            self.hub
                .persist_handle()
                .run_status(session_id, RunStatus::Running);
        }

        let next = state
            .page_order
            .get(state.current_dataset_index)
            .map(|key| key.label())
            .unwrap_or("completion");
        self.hub
            .log(LogLevel::Info, format!("=== Resuming at {} ===", next));

        self.run(&credentials, false).await
    }

    /// Asks an in-flight run to pause at its next poll point
    pub fn stop(&self) -> StopAck {
        self.control.request_pause()
    }

    /// Terminates a paused run; its checkpoints are discarded
    ///
    /// An in-flight run is hard-stopped through
    /// [`ControlHandle::request_terminate`] instead.
    pub fn hard_stop(&mut self) -> Result<TerminateAck> {
        if self.hub.get().status != RunStatus::Paused {
            return Err(HarvestError::NotPaused);
        }
        self.terminate()?;
        Ok(TerminateAck { terminated: true })
    }

    /// Clears the log ring, and the request archive if asked to
    pub fn clear_logs(&mut self, include_archive: bool) {
        self.hub.update(|s| {
            s.logs.clear();
            s.logs_trimmed = false;
            if include_archive {
                s.request_archive.clear();
            }
        });
        tracing::info!("Cleared logs (archive included: {})", include_archive);
    }

    /// Replaces the state with a fresh one, dropping every scraped dataset
    pub fn reset(&mut self) -> Result<()> {
        if self.hub.get().status == RunStatus::Running {
            return Err(HarvestError::AlreadyRunning);
        }
        self.hub.persist_handle().clear();
        self.hub.replace(ScrapeState::default());
        tracing::info!("Scrape state reset");
        Ok(())
    }

    /// Current state snapshot
    pub fn state(&self) -> Arc<ScrapeState> {
        self.hub.snapshot()
    }

    pub fn subscribe(&self) -> StateView {
        self.hub.subscribe()
    }

    /// Handle other tasks use to pause or hard-stop a run
    pub fn control(&self) -> ControlHandle {
        self.control.clone()
    }

    pub fn add_observer(&mut self, observer: Arc<dyn ProgressObserver>) {
        self.hub.add_observer(observer);
    }

    /// Display view of one dataset, or `None` if it was never scraped
    pub fn aggregated_table(&self, key: DatasetKey) -> Option<AggregatedView> {
        aggregate_dataset(self.hub.get(), key, &self.nav_filter)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Flushes pending state writes and stops the writer thread
    pub fn shutdown(&mut self) {
        self.hub.shutdown();
    }

    fn require_credentials(&mut self) -> Result<Credentials> {
        match self.credentials.load_credentials() {
            Some(credentials) => Ok(credentials),
            None => {
                let message = HarvestError::MissingCredentials.to_string();
                self.hub.update(|s| {
                    s.push_error("main", message.clone());
                    s.last_failure = Some(message.clone());
                });
                self.hub.log(LogLevel::Error, message);
                Err(HarvestError::MissingCredentials)
            }
        }
    }

    async fn run(&mut self, credentials: &Credentials, count_login: bool) -> Result<RunOutcome> {
        let metrics = self.hub.get().metrics.clone();
        let outcome = match HttpSession::new(&self.config.client, &self.config.portal, metrics) {
            Ok(mut session) => {
                let mut ctx = ScrapeContext {
                    config: &self.config,
                    session: &mut session,
                    hub: &mut self.hub,
                    control: &self.control,
                    pacer: &self.pacer,
                    nav_filter: &self.nav_filter,
                };
                drive(&mut ctx, &self.authenticator, credentials, count_login).await
            }
            Err(e) => Err(e),
        };

        match outcome {
            Ok(StepOutcome::Completed) => {
                self.complete()?;
                Ok(RunOutcome::Completed)
            }
            Ok(StepOutcome::Paused) if self.control.terminate_requested() => {
                self.terminate()?;
                Ok(RunOutcome::Terminated)
            }
            Ok(StepOutcome::Paused) => {
                self.pause()?;
                Ok(RunOutcome::Paused)
            }
            Err(e) => {
                self.fail(&e)?;
                Err(e)
            }
        }
    }

    fn complete(&mut self) -> Result<()> {
        let errors = self.hub.update(|s| -> Result<usize> {
            s.set_status(RunStatus::Completed)?;
            s.completed_steps = s.total_steps;
            s.substep_progress = 0.0;
            s.progress = 100.0;
            s.completed_at = Some(Utc::now());
            s.current_step = "Completed".to_string();
            s.current_page = "done".to_string();
            s.checkpoints.clear();
            s.clear_active_markers();
            Ok(s.errors.len())
        })?;
        self.finish_run(RunStatus::Completed);

        let level = if errors == 0 {
            LogLevel::Success
        } else {
            LogLevel::Warning
        };
        self.hub.log(
            level,
            format!("=== Scraping completed with {} error(s) ===", errors),
        );
        Ok(())
    }

    fn pause(&mut self) -> Result<()> {
        let at = self.hub.update(|s| -> Result<usize> {
            s.set_status(RunStatus::Paused)?;
            s.current_step = "Paused".to_string();
            s.clear_active_markers();
            Ok(s.current_dataset_index)
        })?;
        if let Some(session_id) = &self.hub.get().session_id {
            self.hub
                .persist_handle()
                .run_status(session_id, RunStatus::Paused);
        }
        self.hub.log(
            LogLevel::Warning,
            format!("Scraping paused at dataset {}; resume to continue", at + 1),
        );
        Ok(())
    }

    fn terminate(&mut self) -> Result<()> {
        self.hub.update(|s| -> Result<()> {
            s.set_status(RunStatus::Terminated)?;
            s.checkpoints.clear();
            s.current_dataset_index = 0;
            s.substep_progress = 0.0;
            s.completed_at = Some(Utc::now());
            s.current_step = "Terminated".to_string();
            s.clear_active_markers();
            Ok(())
        })?;
        self.finish_run(RunStatus::Terminated);
        self.control.reset();
        self.hub
            .log(LogLevel::Warning, "Scraping terminated; checkpoints discarded");
        Ok(())
    }

    fn fail(&mut self, error: &HarvestError) -> Result<()> {
        let message = error.to_string();
        self.hub.update(|s| -> Result<()> {
            s.set_status(RunStatus::Failed)?;
            s.push_error("main", message.clone());
            s.last_failure = Some(message.clone());
            s.current_step = format!("Failed: {}", message);
            s.clear_active_markers();
            Ok(())
        })?;
        self.finish_run(RunStatus::Failed);
        self.hub
            .log(LogLevel::Error, format!("Scraping failed: {}", message));
        Ok(())
    }

    fn finish_run(&self, status: RunStatus) {
        if let Some(session_id) = &self.hub.get().session_id {
            self.hub.persist_handle().run_finished(session_id, status);
        }
    }
}

/// Runs the login step, then every dataset from the current index
///
/// Any error returned here aborts the run. Dataset errors are recorded and
/// never returned.
async fn drive(
    ctx: &mut ScrapeContext<'_>,
    authenticator: &Authenticator,
    credentials: &Credentials,
    count_login: bool,
) -> Result<StepOutcome> {
    ctx.hub.update(|s| {
        s.current_step = "Logging in...".to_string();
        s.current_page = "login".to_string();
    });
    match authenticator.login(ctx, credentials).await {
        Ok(outcome) => {
            tracing::debug!(
                "Logged in after {} attempt(s), landed on {}",
                outcome.attempts,
                outcome.landing_url
            );
            if count_login {
                ctx.hub.update(|s| s.complete_step());
            }
        }
        Err(e) => {
            ctx.hub.update(|s| s.push_error("login", e.to_string()));
            return Err(if e.is_fatal() {
                e
            } else {
                HarvestError::Authentication(e.to_string())
            });
        }
    }

    loop {
        let (index, key) = {
            let state = ctx.hub.get();
            match state.page_order.get(state.current_dataset_index) {
                Some(key) => (state.current_dataset_index, *key),
                None => break,
            }
        };

        if let Err(stop) = ctx.control.checkpoint() {
            tracing::debug!("{} before {}", stop, key.label());
            return Ok(StepOutcome::Paused);
        }

        ctx.hub.update(|s| {
            s.current_page = key.as_str().to_string();
            s.current_step = format!("Scraping {}...", key.label());
            s.update_dataset_progress(key, |p| p.active = true);
        });
        ctx.log_with(
            LogLevel::Info,
            format!("Starting {}", key.label()),
            [("step", key.as_str())],
        );

        match scrape_dataset(ctx, key).await {
            Ok(StepOutcome::Paused) => return Ok(StepOutcome::Paused),
            Ok(StepOutcome::Completed) => {}
            Err(e) => {
                let message = e.to_string();
                ctx.log_with(
                    LogLevel::Error,
                    format!("{} failed: {}", key.label(), message),
                    [("step", key.as_str())],
                );
                ctx.hub.update(|s| {
                    s.push_error(key.as_str(), message.clone());
                    s.update_dataset_progress(key, |p| {
                        p.detail = Some(format!("Error: {}", message));
                        p.active = false;
                    });
                });
            }
        }

        ctx.hub.update(|s| {
            s.complete_step();
            s.current_dataset_index = index + 1;
        });
    }

    Ok(StepOutcome::Completed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::harvest::credentials::StaticCredentials;
    use crate::storage::SqliteStateStore;

    fn orchestrator(state: Option<ScrapeState>, credentials: StaticCredentials) -> Orchestrator {
        let mut store = SqliteStateStore::new_in_memory().unwrap();
        if let Some(state) = state {
            store.save_state(&state).unwrap();
        }
        Orchestrator::new(
            Config::default(),
            Box::new(store),
            Arc::new(credentials),
            "hash",
        )
        .unwrap()
    }

    #[test]
    fn test_session_id_shape() {
        let id = new_session_id();
        let parts: Vec<&str> = id.split('_').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "session");
        assert!(parts[1].parse::<i64>().is_ok());
        assert_eq!(parts[2].len(), 9);
    }

    #[test]
    fn test_interrupted_run_recovered_as_paused() {
        let mut state = ScrapeState::default();
        state.set_status(RunStatus::Running).unwrap();
        state.current_dataset_index = 2;

        let orchestrator = orchestrator(Some(state), StaticCredentials::none());
        let state = orchestrator.state();
        assert_eq!(state.status, RunStatus::Paused);
        assert!(state.is_paused);
        assert_eq!(state.current_dataset_index, 2);
    }

    #[tokio::test]
    async fn test_start_without_credentials() {
        let mut orchestrator = orchestrator(None, StaticCredentials::none());
        let result = orchestrator.start(&DatasetSelection::all()).await;
        assert!(matches!(result, Err(HarvestError::MissingCredentials)));

        let state = orchestrator.state();
        assert_eq!(state.status, RunStatus::Idle);
        assert_eq!(state.errors.len(), 1);
        assert_eq!(state.errors[0].step, "main");
        assert!(state.last_failure.is_some());
    }

    #[tokio::test]
    async fn test_resume_requires_pause() {
        let mut orchestrator = orchestrator(None, StaticCredentials::new("u", "p"));
        assert!(matches!(
            orchestrator.resume().await,
            Err(HarvestError::NotPaused)
        ));
        assert!(matches!(
            orchestrator.hard_stop(),
            Err(HarvestError::NotPaused)
        ));
    }

    #[test]
    fn test_hard_stop_discards_checkpoints() {
        let mut state = ScrapeState::default();
        state.set_status(RunStatus::Running).unwrap();
        state.set_status(RunStatus::Paused).unwrap();
        state.session_id = Some("session_1_abc".to_string());
        state.current_dataset_index = 1;
        state.checkpoints.insert(
            DatasetKey::ScheduleOfClasses,
            crate::state::Checkpoint {
                next_index: 3,
                total: 5,
                sub_items: Vec::new(),
                context: Default::default(),
                updated_at: Utc::now(),
            },
        );

        let mut orchestrator = orchestrator(Some(state), StaticCredentials::none());
        assert_eq!(
            orchestrator.hard_stop().unwrap(),
            TerminateAck { terminated: true }
        );

        let state = orchestrator.state();
        assert_eq!(state.status, RunStatus::Terminated);
        assert!(state.is_completed);
        assert!(state.checkpoints.is_empty());
        assert_eq!(state.current_dataset_index, 0);
    }

    #[test]
    fn test_clear_logs_and_reset() {
        let mut orchestrator = orchestrator(None, StaticCredentials::none());
        orchestrator.hub.log(LogLevel::Info, "hello");
        orchestrator.hub.update(|s| {
            s.store_payload(
                DatasetKey::Grades,
                crate::datasets::DatasetPayload::Grades(Vec::new()),
            )
        });

        orchestrator.clear_logs(true);
        assert!(orchestrator.state().logs.is_empty());
        assert!(orchestrator.state().scraped_data.contains_key(&DatasetKey::Grades));

        orchestrator.reset().unwrap();
        assert!(orchestrator.state().scraped_data.is_empty());
        assert_eq!(orchestrator.state().status, RunStatus::Idle);
    }
}
