//! Owner of the live scrape state
//!
//! Every mutation goes through [`StateHub::update`], which applies it to a
//! copy-on-write `Arc<ScrapeState>` and then publishes the new snapshot to
//! the persistence writer, the watch channel and any observers.

use crate::harvest::metrics::{ArchivedExchange, RequestMetrics};
use crate::state::{LogEntry, LogLevel, ScrapeState};
use crate::storage::PersistHandle;
use chrono::Utc;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::watch;

/// Read-only view of the latest state snapshot
pub type StateView = watch::Receiver<Arc<ScrapeState>>;

/// Best-effort push of each new state snapshot
///
/// Errors are logged and otherwise ignored; an observer can never stop a run.
pub trait ProgressObserver: Send + Sync {
    fn notify(&self, state: &ScrapeState) -> Result<(), String>;
}

pub struct StateHub {
    state: Arc<ScrapeState>,
    persist: PersistHandle,
    watch_tx: watch::Sender<Arc<ScrapeState>>,
    observers: Vec<Arc<dyn ProgressObserver>>,
    log_capacity: usize,
    archive_capacity: usize,
}

impl StateHub {
    pub fn new(
        state: ScrapeState,
        persist: PersistHandle,
        log_capacity: usize,
        archive_capacity: usize,
    ) -> Self {
        let state = Arc::new(state);
        let (watch_tx, _) = watch::channel(state.clone());
        Self {
            state,
            persist,
            watch_tx,
            observers: Vec::new(),
            log_capacity,
            archive_capacity,
        }
    }

    pub fn get(&self) -> &ScrapeState {
        &self.state
    }

    /// Shares the current snapshot without copying it
    pub fn snapshot(&self) -> Arc<ScrapeState> {
        self.state.clone()
    }

    pub fn subscribe(&self) -> StateView {
        self.watch_tx.subscribe()
    }

    pub fn add_observer(&mut self, observer: Arc<dyn ProgressObserver>) {
        self.observers.push(observer);
    }

    pub fn persist_handle(&self) -> &PersistHandle {
        &self.persist
    }

    /// Applies `mutate` and publishes the result
    pub fn update<R, F>(&mut self, mutate: F) -> R
    where
        F: FnOnce(&mut ScrapeState) -> R,
    {
        let state = Arc::make_mut(&mut self.state);
        let result = mutate(state);
        state.last_updated = Some(Utc::now());
        self.publish();
        result
    }

    /// Swaps in a whole new state (reset)
    pub fn replace(&mut self, state: ScrapeState) {
        self.state = Arc::new(state);
        self.publish();
    }

    /// Appends to the user-visible log ring and mirrors it to tracing
    pub fn log(&mut self, level: LogLevel, message: impl Into<String>) {
        self.log_with(level, message, BTreeMap::new());
    }

    pub fn log_with(
        &mut self,
        level: LogLevel,
        message: impl Into<String>,
        context: BTreeMap<String, String>,
    ) {
        let message = message.into();
        match level {
            LogLevel::Debug => tracing::debug!("{}", message),
            LogLevel::Info | LogLevel::Success => tracing::info!("{}", message),
            LogLevel::Warning => tracing::warn!("{}", message),
            LogLevel::Error => tracing::error!("{}", message),
        }

        let capacity = self.log_capacity;
        self.update(|state| {
            state.push_log(
                LogEntry {
                    timestamp: Utc::now(),
                    level,
                    message,
                    context,
                },
                capacity,
            )
        });
    }

    /// Folds the session's counters and new archive entries into the state
    pub fn record_session(&mut self, metrics: &RequestMetrics, archived: Vec<ArchivedExchange>) {
        let capacity = self.archive_capacity;
        self.update(|state| {
            state.metrics = metrics.clone();
            for exchange in archived {
                state.archive_exchange(exchange, capacity);
            }
        });
    }

    pub fn log_capacity(&self) -> usize {
        self.log_capacity
    }

    /// Stops the writer after it has drained every queued snapshot
    pub fn shutdown(&mut self) {
        self.persist.shutdown();
    }

    fn publish(&self) {
        self.persist.persist(self.state.clone());
        self.watch_tx.send_replace(self.state.clone());
        for observer in &self.observers {
            if let Err(e) = observer.notify(&self.state) {
                tracing::trace!("Progress observer failed: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::RunStatus;
    use crate::storage::{RunRecord, StateStore, StorageResult};
    use crate::DatasetKey;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Clone, Default)]
    struct MemoryStore(Arc<Mutex<Option<ScrapeState>>>);

    impl StateStore for MemoryStore {
        fn save_state(&mut self, state: &ScrapeState) -> StorageResult<()> {
            *self.0.lock().unwrap() = Some(state.clone());
            Ok(())
        }
        fn load_state(&self) -> StorageResult<Option<ScrapeState>> {
            Ok(self.0.lock().unwrap().clone())
        }
        fn clear_state(&mut self) -> StorageResult<()> {
            *self.0.lock().unwrap() = None;
            Ok(())
        }
        fn create_run(&mut self, _: &str, _: &[DatasetKey], _: &str) -> StorageResult<i64> {
            Ok(1)
        }
        fn update_run_status(&mut self, _: &str, _: RunStatus) -> StorageResult<()> {
            Ok(())
        }
        fn finish_run(&mut self, _: &str, _: RunStatus) -> StorageResult<()> {
            Ok(())
        }
        fn list_runs(&self, _: usize) -> StorageResult<Vec<RunRecord>> {
            Ok(Vec::new())
        }
    }

    struct Counting(AtomicUsize);

    impl ProgressObserver for Counting {
        fn notify(&self, _: &ScrapeState) -> Result<(), String> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Err("observer is offline".to_string())
        }
    }

    fn hub(store: MemoryStore) -> StateHub {
        let persist = PersistHandle::spawn(Box::new(store)).unwrap();
        StateHub::new(ScrapeState::default(), persist, 3, 2)
    }

    #[test]
    fn test_update_publishes_everywhere() {
        let store = MemoryStore::default();
        let mut hub = hub(store.clone());
        let view = hub.subscribe();
        let observer = Arc::new(Counting(AtomicUsize::new(0)));
        hub.add_observer(observer.clone());

        hub.update(|s| s.current_step = "Logging in".to_string());

        assert_eq!(view.borrow().current_step, "Logging in");
        assert_eq!(observer.0.load(Ordering::SeqCst), 1);

        hub.shutdown();
        let saved = store.load_state().unwrap().unwrap();
        assert_eq!(saved.current_step, "Logging in");
    }

    #[test]
    fn test_snapshots_are_not_torn() {
        let mut hub = hub(MemoryStore::default());
        let before = hub.snapshot();
        hub.update(|s| s.completed_steps = 7);
        assert_eq!(before.completed_steps, 0);
        assert_eq!(hub.get().completed_steps, 7);
    }

    #[test]
    fn test_log_ring_capacity() {
        let mut hub = hub(MemoryStore::default());
        for i in 0..5 {
            hub.log(LogLevel::Info, format!("line {}", i));
        }
        assert_eq!(hub.get().logs.len(), 3);
        assert!(hub.get().logs_trimmed);
    }

    #[test]
    fn test_record_session_caps_archive() {
        let mut hub = hub(MemoryStore::default());
        let metrics = RequestMetrics {
            total_requests: 3,
            ..RequestMetrics::default()
        };
        let exchange = ArchivedExchange {
            started_at: Utc::now(),
            elapsed_ms: 1,
            method: "GET".to_string(),
            url: "http://portal/".to_string(),
            request_headers: BTreeMap::new(),
            request_body: None,
            status: Some(200),
            response_headers: BTreeMap::new(),
            body_size: 0,
            body_text: None,
            error: None,
        };
        hub.record_session(&metrics, vec![exchange.clone(), exchange.clone(), exchange]);
        assert_eq!(hub.get().metrics.total_requests, 3);
        assert_eq!(hub.get().request_archive.len(), 2);
    }

    #[test]
    fn test_log_appends_share_archive_and_payloads() {
        let mut hub = hub(MemoryStore::default());
        let exchange = ArchivedExchange {
            started_at: Utc::now(),
            elapsed_ms: 1,
            method: "GET".to_string(),
            url: "http://portal/".to_string(),
            request_headers: BTreeMap::new(),
            request_body: None,
            status: Some(200),
            response_headers: BTreeMap::new(),
            body_size: 4,
            body_text: Some("<ok>".to_string()),
            error: None,
        };
        hub.record_session(&RequestMetrics::default(), vec![exchange.clone(), exchange]);
        hub.update(|s| {
            s.store_payload(
                DatasetKey::Grades,
                crate::datasets::DatasetPayload::Grades(Vec::new()),
            )
        });
        let view = hub.subscribe();

        let before = hub.snapshot();
        let archived: Vec<*const ArchivedExchange> =
            before.request_archive.iter().map(Arc::as_ptr).collect();
        let payload = Arc::as_ptr(&before.scraped_data[&DatasetKey::Grades]);

        for i in 0..10 {
            hub.log(LogLevel::Info, format!("line {}", i));
        }

        let after = hub.snapshot();
        assert!(!Arc::ptr_eq(&before, &after));
        assert_eq!(after.logs.len(), 3);
        let still: Vec<*const ArchivedExchange> =
            after.request_archive.iter().map(Arc::as_ptr).collect();
        assert_eq!(still, archived);
        assert_eq!(Arc::as_ptr(&after.scraped_data[&DatasetKey::Grades]), payload);
        // The published snapshot shares the same entries
        let published = view.borrow().clone();
        assert!(Arc::ptr_eq(
            &published.request_archive[0],
            &after.request_archive[0]
        ));
        assert!(Arc::ptr_eq(&published.logs[2], &after.logs[2]));
    }
}
