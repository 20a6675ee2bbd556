//! The persisted root of a scrape
//!
//! Field names serialize in camelCase; they are the on-disk contract of the
//! persisted state and must not be renamed.

use crate::datasets::{DatasetKey, DatasetPayload};
use crate::extract::SelectOption;
use crate::harvest::metrics::{push_capped, ArchivedExchange, RequestMetrics};
use crate::state::status::RunStatus;
use crate::HarvestError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::sync::Arc;

/// Largest fractional progress inside one step
pub const MAX_SUBSTEP: f64 = 0.999;

/// Resume cursor of a paginated dataset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Checkpoint {
    /// Index of the next sub-item to fetch
    pub next_index: usize,
    pub total: usize,
    /// The sub-item key space captured from the index page
    pub sub_items: Vec<SelectOption>,
    /// Query context shared by every sub-item (e.g. the term)
    pub context: BTreeMap<String, String>,
    pub updated_at: DateTime<Utc>,
}

/// Display summary of one dataset; never used for resume
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DatasetProgress {
    pub label: String,
    pub completed: usize,
    pub total: usize,
    pub items: usize,
    pub detail: Option<String>,
    pub updated_at: Option<DateTime<Utc>>,
    /// True while the dataset is being scraped
    pub active: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorEntry {
    pub step: String,
    pub error: String,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Success,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    pub message: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub context: BTreeMap<String, String>,
}

/// Process-wide scrape state
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ScrapeState {
    pub is_running: bool,
    pub is_paused: bool,
    pub is_completed: bool,
    pub status: RunStatus,
    pub session_id: Option<String>,

    /// Percent, non-decreasing while a run is in flight
    pub progress: f64,
    pub total_steps: u32,
    pub completed_steps: u32,
    pub current_step: String,
    pub current_page: String,
    /// Fraction of the current step, in `[0, MAX_SUBSTEP]`
    pub substep_progress: f64,

    pub selected_pages: BTreeSet<DatasetKey>,
    pub page_order: Vec<DatasetKey>,
    pub current_dataset_index: usize,
    pub checkpoints: BTreeMap<DatasetKey, Checkpoint>,
    pub dataset_progress: BTreeMap<DatasetKey, DatasetProgress>,
    /// Payloads are shared between snapshots until one of them changes
    pub scraped_data: BTreeMap<DatasetKey, Arc<DatasetPayload>>,

    pub errors: Vec<ErrorEntry>,
    pub logs: VecDeque<Arc<LogEntry>>,
    pub logs_trimmed: bool,
    pub metrics: RequestMetrics,
    pub request_archive: VecDeque<Arc<ArchivedExchange>>,

    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub last_updated: Option<DateTime<Utc>>,
    pub last_failure: Option<String>,
}

impl ScrapeState {
    /// Moves to a new status and keeps the boolean flags in sync
    pub fn set_status(&mut self, to: RunStatus) -> Result<(), HarvestError> {
        if !self.status.can_transition_to(to) {
            return Err(HarvestError::InvalidTransition {
                from: self.status,
                to,
            });
        }
        self.status = to;
        self.is_running = to == RunStatus::Running;
        self.is_paused = to == RunStatus::Paused;
        self.is_completed = matches!(to, RunStatus::Completed | RunStatus::Terminated);
        Ok(())
    }

    /// Steps done so far, including the fraction of the current one
    pub fn step_position(&self) -> f64 {
        self.completed_steps as f64 + self.substep_progress
    }

    /// Derives `progress` from the step counters without ever lowering it
    pub fn recompute_progress(&mut self) {
        if self.total_steps == 0 {
            return;
        }
        let raw = (self.step_position() / self.total_steps as f64 * 100.0).clamp(0.0, 100.0);
        if raw > self.progress {
            self.progress = raw;
        }
    }

    /// Marks the current step finished
    pub fn complete_step(&mut self) {
        self.completed_steps = (self.completed_steps + 1).min(self.total_steps);
        self.substep_progress = 0.0;
        self.recompute_progress();
    }

    /// Advances the fraction of the current step (never backwards)
    pub fn advance_substep(&mut self, fraction: f64) {
        let fraction = fraction.clamp(0.0, MAX_SUBSTEP);
        if fraction > self.substep_progress && self.completed_steps < self.total_steps {
            self.substep_progress = fraction;
        }
        self.recompute_progress();
    }

    pub fn push_error(&mut self, step: impl Into<String>, error: impl Into<String>) {
        self.errors.push(ErrorEntry {
            step: step.into(),
            error: error.into(),
            at: Utc::now(),
        });
    }

    /// Appends a log entry, evicting the oldest past `capacity`
    pub fn push_log(&mut self, entry: LogEntry, capacity: usize) {
        self.logs.push_back(Arc::new(entry));
        self.trim_logs(capacity);
    }

    pub fn trim_logs(&mut self, capacity: usize) {
        while self.logs.len() > capacity {
            self.logs.pop_front();
            self.logs_trimmed = true;
        }
    }

    pub fn archive_exchange(&mut self, exchange: ArchivedExchange, capacity: usize) {
        push_capped(&mut self.request_archive, Arc::new(exchange), capacity);
    }

    /// Stored payload of a dataset
    pub fn payload(&self, key: DatasetKey) -> Option<&DatasetPayload> {
        self.scraped_data.get(&key).map(Arc::as_ref)
    }

    /// Stores (or replaces) the payload of a dataset
    pub fn store_payload(&mut self, key: DatasetKey, payload: DatasetPayload) {
        self.scraped_data.insert(key, Arc::new(payload));
    }

    /// Applies `update` to a dataset's progress, creating it if needed
    pub fn update_dataset_progress<F>(&mut self, key: DatasetKey, update: F)
    where
        F: FnOnce(&mut DatasetProgress),
    {
        let entry = self
            .dataset_progress
            .entry(key)
            .or_insert_with(|| DatasetProgress {
                label: key.label().to_string(),
                ..DatasetProgress::default()
            });
        update(entry);
        entry.updated_at = Some(Utc::now());
    }

    /// Clears every dataset's active marker
    pub fn clear_active_markers(&mut self) {
        for progress in self.dataset_progress.values_mut() {
            progress.active = false;
        }
    }

    /// Turns a run that died mid-flight into a paused one
    ///
    /// Returns true if the state was changed.
    pub fn recover_interrupted_run(&mut self) -> bool {
        if self.status != RunStatus::Running {
            return false;
        }
        self.status = RunStatus::Paused;
        self.is_running = false;
        self.is_paused = true;
        self.is_completed = false;
        self.current_step = "Interrupted; resume to continue".to_string();
        true
    }
}
