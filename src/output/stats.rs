//! Statistics of the persisted scrape state
//!
//! This module provides functionality for summarizing the stored state and
//! run history and printing it for `--stats`.

use crate::datasets::{DatasetKey, DatasetPayload, GradeSummary};
use crate::harvest::RequestMetrics;
use crate::state::{ErrorEntry, RunStatus, ScrapeState};
use crate::storage::{RunRecord, StateStore};
use crate::Result;
use chrono::{DateTime, Utc};

/// Errors shown by `--stats`, newest last
const RECENT_ERRORS: usize = 10;

/// One dataset line of the summary
#[derive(Debug, Clone, PartialEq)]
pub struct DatasetLine {
    pub key: DatasetKey,
    pub label: String,
    pub completed: usize,
    pub total: usize,
    pub items: usize,
    pub detail: Option<String>,
}

/// Scrape statistics summary
#[derive(Debug, Clone)]
pub struct HarvestStatistics {
    pub status: RunStatus,
    pub session_id: Option<String>,
    pub progress: f64,
    pub completed_steps: u32,
    pub total_steps: u32,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub last_failure: Option<String>,

    /// Datasets with progress or stored data, in page order
    pub datasets: Vec<DatasetLine>,

    pub metrics: RequestMetrics,
    pub error_count: usize,
    pub recent_errors: Vec<ErrorEntry>,
    pub runs: Vec<RunRecord>,

    /// Present once grades were scraped
    pub grades: Option<GradeSummary>,
}

/// Summarizes a state snapshot and its run history
pub fn summarize(state: &ScrapeState, runs: Vec<RunRecord>) -> HarvestStatistics {
    let datasets = DatasetKey::ALL
        .into_iter()
        .filter_map(|key| {
            let progress = state.dataset_progress.get(&key);
            let stored = state.payload(key);
            if progress.is_none() && stored.is_none() {
                return None;
            }
            Some(DatasetLine {
                key,
                label: key.label().to_string(),
                completed: progress.map_or(0, |p| p.completed),
                total: progress.map_or(0, |p| p.total),
                items: stored.map_or(0, DatasetPayload::item_count),
                detail: progress.and_then(|p| p.detail.clone()),
            })
        })
        .collect();

    let grades = match state.payload(DatasetKey::Grades) {
        Some(DatasetPayload::Grades(records)) if !records.is_empty() => {
            Some(GradeSummary::from_records(records))
        }
        _ => None,
    };

    let skip = state.errors.len().saturating_sub(RECENT_ERRORS);

    HarvestStatistics {
        status: state.status,
        session_id: state.session_id.clone(),
        progress: state.progress,
        completed_steps: state.completed_steps,
        total_steps: state.total_steps,
        started_at: state.started_at,
        completed_at: state.completed_at,
        last_failure: state.last_failure.clone(),
        datasets,
        metrics: state.metrics.clone(),
        error_count: state.errors.len(),
        recent_errors: state.errors[skip..].to_vec(),
        runs,
        grades,
    }
}

/// Loads statistics from storage
///
/// # Arguments
///
/// * `store` - The state store to read
/// * `run_limit` - How many recent runs to include
///
/// # Returns
///
/// * `Ok(HarvestStatistics)` - Summary of the stored state (empty if none)
/// * `Err(HarvestError)` - Failed to read the store
pub fn load_statistics(store: &dyn StateStore, run_limit: usize) -> Result<HarvestStatistics> {
    let state = store.load_state()?.unwrap_or_default();
    let runs = store.list_runs(run_limit)?;
    Ok(summarize(&state, runs))
}

fn format_time(at: Option<DateTime<Utc>>) -> String {
    at.map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| "-".to_string())
}

/// Prints statistics to stdout in a formatted manner
///
/// # Arguments
///
/// * `stats` - The statistics to display
pub fn print_statistics(stats: &HarvestStatistics) {
    println!("=== Scrape Statistics ===\n");

    println!("Overview:");
    println!("  Status: {}", stats.status);
    if let Some(session_id) = &stats.session_id {
        println!("  Session: {}", session_id);
    }
    println!(
        "  Progress: {:.1}% ({} / {} steps)",
        stats.progress, stats.completed_steps, stats.total_steps
    );
    println!("  Started: {}", format_time(stats.started_at));
    if stats.status.is_terminal() {
        println!("  Finished: {}", format_time(stats.completed_at));
    } else if stats.status.is_resumable() {
        println!("  Resume with --resume");
    }
    if let Some(failure) = &stats.last_failure {
        println!("  Last failure: {}", failure);
    }
    println!();

    if !stats.datasets.is_empty() {
        println!("Datasets:");
        for line in &stats.datasets {
            let position = if line.total > 0 {
                format!("{}/{}", line.completed, line.total)
            } else {
                "-".to_string()
            };
            print!("  {:<28} {:>9}  {} items", line.label, position, line.items);
            match &line.detail {
                Some(detail) => println!("  ({})", detail),
                None => println!(),
            }
        }
        println!();
    }

    let m = &stats.metrics;
    println!("Requests:");
    println!("  Total: {}", m.total_requests);
    println!("  Average response: {}ms", m.avg_response_ms);
    println!("  Downloaded: {} bytes", m.bytes_downloaded);
    println!("  Slow responses: {}", m.slow_responses);
    println!("  Rate-limit pauses: {}", m.rate_limit_pauses);
    if let (Some(method), Some(url)) = (&m.last_request_method, &m.last_request_url) {
        println!(
            "  Last: {} {} -> {} in {}ms",
            method,
            url,
            m.last_status.as_deref().unwrap_or("-"),
            m.last_response_ms
        );
    }
    println!();

    if stats.error_count > 0 {
        println!(
            "Errors ({}, showing last {}):",
            stats.error_count,
            stats.recent_errors.len()
        );
        for entry in &stats.recent_errors {
            println!("  [{}] {}: {}", entry.at.format("%H:%M:%S"), entry.step, entry.error);
        }
        println!();
    }

    if let Some(grades) = &stats.grades {
        println!("Grades:");
        if let (Some(year), Some(semester)) = (&grades.latest_school_year, &grades.latest_semester)
        {
            println!("  Latest term: {} semester {}", year, semester);
        }
        println!("  Current courses: {}", grades.current_courses);
        println!("  Units completed: {}", grades.units_completed);
        if let Some(average) = grades.current_average {
            println!("  Current average: {:.2}", average);
        }
        if let Some(average) = grades.cumulative_average {
            println!("  Cumulative average: {:.2}", average);
        }
        println!();
    }

    if !stats.runs.is_empty() {
        println!("Recent runs:");
        for run in &stats.runs {
            let datasets: Vec<&str> = run.datasets.iter().map(DatasetKey::as_str).collect();
            println!(
                "  #{} {} [{}] {} -> {} ({})",
                run.id,
                run.session_id,
                run.status,
                run.started_at,
                run.finished_at.as_deref().unwrap_or("-"),
                datasets.join(", ")
            );
        }
    }
}
