//! Integration tests for full scrape runs
//!
//! These tests use wiremock to serve a mock portal and drive the
//! orchestrator through its public API with pacing delays disabled.

mod common;

use campus_harvest::datasets::{ClassOffering, DatasetPayload};
use campus_harvest::harvest::{ControlHandle, ProgressObserver};
use campus_harvest::output::AggregatedView;
use campus_harvest::storage::{SqliteStateStore, StateStore};
use campus_harvest::{DatasetKey, DatasetSelection, RunOutcome, RunStatus, ScrapeState};
use common::*;
use std::collections::BTreeSet;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Requests a stop once a dataset has `after` sub-items done
struct StopAfter {
    key: DatasetKey,
    after: usize,
    control: ControlHandle,
    terminate: bool,
    fired: AtomicBool,
}

impl StopAfter {
    fn new(key: DatasetKey, after: usize, control: ControlHandle, terminate: bool) -> Arc<Self> {
        Arc::new(Self {
            key,
            after,
            control,
            terminate,
            fired: AtomicBool::new(false),
        })
    }
}

impl ProgressObserver for StopAfter {
    fn notify(&self, state: &ScrapeState) -> Result<(), String> {
        let done = state
            .dataset_progress
            .get(&self.key)
            .map_or(0, |p| p.completed);
        if done >= self.after && !self.fired.swap(true, Ordering::SeqCst) {
            if self.terminate {
                self.control.request_terminate();
            } else {
                self.control.request_pause();
            }
        }
        Ok(())
    }
}

/// Records (progress, completed, substep, total) of every published snapshot
///
/// Optionally pauses the run once a dataset reaches `pause_after` sub-items.
struct ProgressTrail {
    snapshots: Mutex<Vec<(f64, u32, f64, u32)>>,
    pause: Option<StopAfter>,
}

impl ProgressObserver for ProgressTrail {
    fn notify(&self, state: &ScrapeState) -> Result<(), String> {
        self.snapshots.lock().unwrap().push((
            state.progress,
            state.completed_steps,
            state.substep_progress,
            state.total_steps,
        ));
        match &self.pause {
            Some(pause) => pause.notify(state),
            None => Ok(()),
        }
    }
}

fn offerings(state: &ScrapeState) -> Vec<ClassOffering> {
    match state.payload(DatasetKey::ScheduleOfClasses) {
        Some(DatasetPayload::ClassOfferings(rows)) => rows.clone(),
        other => panic!("unexpected schedule payload: {:?}", other),
    }
}

fn row_set(rows: &[ClassOffering]) -> BTreeSet<(String, String, String)> {
    rows.iter()
        .map(|r| {
            (
                r.department.clone(),
                r.subject_code.clone(),
                r.section.clone(),
            )
        })
        .collect()
}

#[tokio::test]
async fn test_full_run_over_every_dataset_kind() {
    let server = MockServer::start().await;
    mount_login(&server).await;
    mount_schedule(&server).await;
    mount_curriculum(&server).await;
    mount_grades(&server).await;
    mount_class_schedule(&server).await;
    mount_hold_orders(&server).await;

    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("state.db");
    let mut orchestrator = orchestrator(test_config(&server, &db_path));

    let selection = DatasetSelection::from_names([
        "schedule",
        "curriculum",
        "grades",
        "classSchedule",
        "holdOrders",
    ])
    .unwrap();
    let outcome = orchestrator.start(&selection).await.unwrap();
    assert_eq!(outcome, RunOutcome::Completed);

    let state = orchestrator.state();
    assert_eq!(state.status, RunStatus::Completed);
    assert!(state.is_completed);
    assert_eq!(state.progress, 100.0);
    assert_eq!(state.total_steps, 6);
    assert_eq!(state.completed_steps, 6);
    assert!(state.errors.is_empty(), "errors: {:?}", state.errors);
    assert!(state.checkpoints.is_empty());
    assert!(state.dataset_progress.values().all(|p| !p.active));
    assert!(state.completed_at.is_some());

    let expected_rows: usize = DEPARTMENTS.iter().map(|(_, n)| n).sum();
    assert_eq!(offerings(&state).len(), expected_rows);
    assert_eq!(
        state.scraped_data[&DatasetKey::OfficialCurriculum].item_count(),
        2
    );
    assert_eq!(state.scraped_data[&DatasetKey::Grades].item_count(), 1);

    let progress = &state.dataset_progress[&DatasetKey::ScheduleOfClasses];
    assert_eq!(progress.completed, DEPARTMENTS.len());
    assert_eq!(progress.total, DEPARTMENTS.len());

    match orchestrator.aggregated_table(DatasetKey::ClassSchedule) {
        Some(AggregatedView::Schedule(schedule)) => assert_eq!(schedule.events.len(), 2),
        other => panic!("expected a weekly schedule, got {:?}", other),
    }
    match orchestrator.aggregated_table(DatasetKey::HoldOrders) {
        Some(AggregatedView::Tables(tables)) => assert_eq!(tables[0].rows.len(), 1),
        other => panic!("expected tables, got {:?}", other),
    }
    assert!(orchestrator.aggregated_table(DatasetKey::TuitionReceipt).is_none());

    assert!(state.metrics.total_requests >= 12);
    assert!(!state.request_archive.is_empty());

    orchestrator.shutdown();

    // Persisted state and run history survive the process
    let store = SqliteStateStore::new(&db_path).unwrap();
    let saved = store.load_state().unwrap().unwrap();
    assert_eq!(saved.status, RunStatus::Completed);
    assert_eq!(offerings(&saved).len(), expected_rows);

    let runs = store.list_runs(10).unwrap();
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].status, RunStatus::Completed);
    assert_eq!(runs[0].config_hash, "test-hash");
    assert!(runs[0].finished_at.is_some());
}

#[tokio::test]
async fn test_pause_and_resume_matches_uninterrupted_run() {
    // Uninterrupted reference run
    let reference_server = MockServer::start().await;
    mount_login(&reference_server).await;
    mount_schedule(&reference_server).await;
    let reference_dir = TempDir::new().unwrap();
    let mut reference = orchestrator(test_config(
        &reference_server,
        &reference_dir.path().join("state.db"),
    ));
    let selection = DatasetSelection::from_names(["scheduleOfClasses"]).unwrap();
    assert_eq!(
        reference.start(&selection).await.unwrap(),
        RunOutcome::Completed
    );
    let expected = row_set(&offerings(&reference.state()));
    reference.shutdown();

    // Paused after two departments, then resumed in a new process
    let server = MockServer::start().await;
    mount_login(&server).await;
    Mock::given(method("GET"))
        .and(path("/j_aisis/J_VCSC.do"))
        .respond_with(ResponseTemplate::new(200).set_body_string(schedule_index()))
        .expect(1)
        .mount(&server)
        .await;
    for (department, count) in DEPARTMENTS {
        Mock::given(method("POST"))
            .and(path("/j_aisis/J_VCSC.do"))
            .and(body_string_contains(format!("deptCode={}", department)))
            .respond_with(
                ResponseTemplate::new(200).set_body_string(schedule_results(department, count)),
            )
            .expect(1)
            .mount(&server)
            .await;
    }

    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("state.db");
    let mut first = orchestrator(test_config(&server, &db_path));
    let stopper = StopAfter::new(DatasetKey::ScheduleOfClasses, 2, first.control(), false);
    first.add_observer(stopper);

    assert_eq!(first.start(&selection).await.unwrap(), RunOutcome::Paused);
    let paused = first.state();
    assert_eq!(paused.status, RunStatus::Paused);
    assert_eq!(paused.current_dataset_index, 0);
    let checkpoint = &paused.checkpoints[&DatasetKey::ScheduleOfClasses];
    assert_eq!(checkpoint.next_index, 2);
    assert_eq!(checkpoint.context["applicablePeriod"], "2025-0");
    assert!(paused.progress > 0.0 && paused.progress < 100.0);
    first.shutdown();
    drop(first);

    let mut second = orchestrator(test_config(&server, &db_path));
    assert!(second.state().is_paused);
    assert_eq!(second.resume().await.unwrap(), RunOutcome::Completed);

    let resumed = second.state();
    assert_eq!(resumed.status, RunStatus::Completed);
    assert!(resumed.checkpoints.is_empty());
    assert!(resumed.progress >= paused.progress);
    assert_eq!(resumed.total_steps, 2);
    assert_eq!(resumed.completed_steps, 2);

    let rows = offerings(&resumed);
    assert_eq!(rows.len(), expected.len());
    assert_eq!(row_set(&rows), expected);
    second.shutdown();
}

#[tokio::test]
async fn test_progress_never_regresses_across_pause_and_resume() {
    let server = MockServer::start().await;
    mount_login(&server).await;
    mount_schedule(&server).await;
    mount_grades(&server).await;
    mount_hold_orders(&server).await;

    let dir = TempDir::new().unwrap();
    let mut orchestrator = orchestrator(test_config(&server, &dir.path().join("state.db")));
    let trail = Arc::new(ProgressTrail {
        snapshots: Mutex::new(Vec::new()),
        pause: Some(StopAfter {
            key: DatasetKey::ScheduleOfClasses,
            after: 2,
            control: orchestrator.control(),
            terminate: false,
            fired: AtomicBool::new(false),
        }),
    });
    orchestrator.add_observer(trail.clone());
    let view = orchestrator.subscribe();

    let selection = DatasetSelection::from_names(["schedule", "grades", "holdOrders"]).unwrap();
    assert_eq!(orchestrator.start(&selection).await.unwrap(), RunOutcome::Paused);
    let paused_at = view.borrow().progress;
    assert!(paused_at > 0.0 && paused_at < 100.0);

    assert_eq!(orchestrator.resume().await.unwrap(), RunOutcome::Completed);
    assert_eq!(view.borrow().progress, 100.0);

    let snapshots = trail.snapshots.lock().unwrap();
    assert!(snapshots.len() > 10);
    let mut last = 0.0;
    for &(progress, completed, substep, total) in snapshots.iter() {
        assert!(
            progress >= last,
            "progress went from {} to {}",
            last,
            progress
        );
        assert!((0.0..=100.0).contains(&progress));
        assert!(
            completed as f64 + substep <= total as f64,
            "{} + {} exceeds {} steps",
            completed,
            substep,
            total
        );
        last = progress;
    }
    assert_eq!(snapshots.last().map(|s| s.0), Some(100.0));
    drop(snapshots);
    orchestrator.shutdown();
}

#[tokio::test]
async fn test_hard_stop_while_running() {
    let server = MockServer::start().await;
    mount_login(&server).await;
    mount_schedule(&server).await;
    mount_grades(&server).await;

    let dir = TempDir::new().unwrap();
    let mut orchestrator = orchestrator(test_config(&server, &dir.path().join("state.db")));
    let stopper = StopAfter::new(
        DatasetKey::ScheduleOfClasses,
        1,
        orchestrator.control(),
        true,
    );
    orchestrator.add_observer(stopper);

    let selection = DatasetSelection::from_names(["schedule", "grades"]).unwrap();
    let outcome = orchestrator.start(&selection).await.unwrap();
    assert_eq!(outcome, RunOutcome::Terminated);

    let state = orchestrator.state();
    assert_eq!(state.status, RunStatus::Terminated);
    assert!(state.checkpoints.is_empty());
    assert!(!state.scraped_data.contains_key(&DatasetKey::Grades));
    assert!(orchestrator.resume().await.is_err());
    orchestrator.shutdown();
}

#[tokio::test]
async fn test_sub_item_failure_is_recorded_and_skipped() {
    let server = MockServer::start().await;
    mount_login(&server).await;
    Mock::given(method("POST"))
        .and(path("/j_aisis/J_VCSC.do"))
        .and(body_string_contains("deptCode=CS"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    mount_schedule(&server).await;

    let dir = TempDir::new().unwrap();
    let mut orchestrator = orchestrator(test_config(&server, &dir.path().join("state.db")));
    let selection = DatasetSelection::from_names(["schedule"]).unwrap();
    assert_eq!(
        orchestrator.start(&selection).await.unwrap(),
        RunOutcome::Completed
    );

    let state = orchestrator.state();
    let steps: Vec<&str> = state.errors.iter().map(|e| e.step.as_str()).collect();
    assert_eq!(steps, vec!["schedule_CS"]);

    let departments: BTreeSet<String> = offerings(&state)
        .into_iter()
        .map(|r| r.department)
        .collect();
    assert_eq!(
        departments,
        ["EN", "IS", "MA"].iter().map(|d| d.to_string()).collect()
    );
    assert_eq!(
        state.dataset_progress[&DatasetKey::ScheduleOfClasses].completed,
        DEPARTMENTS.len()
    );
    orchestrator.shutdown();
}

#[tokio::test]
async fn test_dataset_failure_does_not_stop_the_run() {
    let server = MockServer::start().await;
    mount_login(&server).await;
    Mock::given(method("GET"))
        .and(path("/j_aisis/J_VOFC.do"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;
    mount_grades(&server).await;

    let dir = TempDir::new().unwrap();
    let mut orchestrator = orchestrator(test_config(&server, &dir.path().join("state.db")));
    let selection = DatasetSelection::from_names(["curriculum", "grades"]).unwrap();
    assert_eq!(
        orchestrator.start(&selection).await.unwrap(),
        RunOutcome::Completed
    );

    let state = orchestrator.state();
    assert_eq!(state.errors.len(), 1);
    assert_eq!(state.errors[0].step, "officialCurriculum");
    let detail = state.dataset_progress[&DatasetKey::OfficialCurriculum]
        .detail
        .clone()
        .unwrap();
    assert!(detail.starts_with("Error:"), "detail: {}", detail);
    assert_eq!(state.scraped_data[&DatasetKey::Grades].item_count(), 1);
    assert_eq!(state.completed_steps, state.total_steps);
    orchestrator.shutdown();
}

#[tokio::test]
async fn test_later_runs_keep_earlier_data() {
    let server = MockServer::start().await;
    mount_login(&server).await;
    mount_grades(&server).await;
    mount_hold_orders(&server).await;

    let dir = TempDir::new().unwrap();
    let mut orchestrator = orchestrator(test_config(&server, &dir.path().join("state.db")));

    let grades = DatasetSelection::from_names(["grades"]).unwrap();
    orchestrator.start(&grades).await.unwrap();
    let holds = DatasetSelection::from_names(["holds"]).unwrap();
    orchestrator.start(&holds).await.unwrap();

    let state = orchestrator.state();
    assert!(state.scraped_data.contains_key(&DatasetKey::Grades));
    assert!(state.scraped_data.contains_key(&DatasetKey::HoldOrders));
    assert_eq!(state.page_order, vec![DatasetKey::HoldOrders]);
    orchestrator.shutdown();

    let store = SqliteStateStore::new(Path::new(&dir.path().join("state.db"))).unwrap();
    assert_eq!(store.list_runs(10).unwrap().len(), 2);
}
