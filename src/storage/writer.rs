//! Background persistence
//!
//! Snapshots are sent over a channel to a dedicated thread that owns the
//! store. Queued snapshots are coalesced so only the newest one is written;
//! write failures are logged and never reach the scraping flow.

use crate::state::{RunStatus, ScrapeState};
use crate::storage::traits::StateStore;
use crate::DatasetKey;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// Messages understood by the writer thread
#[derive(Debug)]
pub enum WriterMessage {
    Save(Arc<ScrapeState>),
    RunStarted {
        session_id: String,
        datasets: Vec<DatasetKey>,
        config_hash: String,
    },
    RunStatus {
        session_id: String,
        status: RunStatus,
    },
    RunFinished {
        session_id: String,
        status: RunStatus,
    },
    Clear,
    Shutdown,
}

/// Sending side of the writer thread
pub struct PersistHandle {
    tx: Sender<WriterMessage>,
    worker: Option<JoinHandle<()>>,
}

impl PersistHandle {
    /// Moves `store` onto a new writer thread
    pub fn spawn(store: Box<dyn StateStore>) -> std::io::Result<Self> {
        let (tx, rx) = mpsc::channel();
        let worker = thread::Builder::new()
            .name("state-writer".to_string())
            .spawn(move || run_writer(store, rx))?;
        Ok(Self {
            tx,
            worker: Some(worker),
        })
    }

    /// Queues a snapshot for writing; never blocks
    pub fn persist(&self, state: Arc<ScrapeState>) {
        self.send(WriterMessage::Save(state));
    }

    pub fn run_started(&self, session_id: &str, datasets: &[DatasetKey], config_hash: &str) {
        self.send(WriterMessage::RunStarted {
            session_id: session_id.to_string(),
            datasets: datasets.to_vec(),
            config_hash: config_hash.to_string(),
        });
    }

    pub fn run_status(&self, session_id: &str, status: RunStatus) {
        self.send(WriterMessage::RunStatus {
            session_id: session_id.to_string(),
            status,
        });
    }

    pub fn run_finished(&self, session_id: &str, status: RunStatus) {
        self.send(WriterMessage::RunFinished {
            session_id: session_id.to_string(),
            status,
        });
    }

    /// Queues deletion of the persisted state
    pub fn clear(&self) {
        self.send(WriterMessage::Clear);
    }

    /// Drains the queue and joins the writer thread
    pub fn shutdown(&mut self) {
        if let Some(worker) = self.worker.take() {
            self.send(WriterMessage::Shutdown);
            if worker.join().is_err() {
                tracing::error!("State writer thread panicked");
            }
        }
    }

    fn send(&self, message: WriterMessage) {
        if self.tx.send(message).is_err() {
            tracing::warn!("State writer is gone; dropping persistence message");
        }
    }
}

impl Drop for PersistHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run_writer(mut store: Box<dyn StateStore>, rx: Receiver<WriterMessage>) {
    let mut stopping = false;

    while !stopping {
        let first = match rx.recv() {
            Ok(message) => message,
            Err(_) => break,
        };

        let mut batch = vec![first];
        batch.extend(rx.try_iter());

        let mut pending: Option<Arc<ScrapeState>> = None;
        for message in batch {
            match message {
                WriterMessage::Save(state) => pending = Some(state),
                WriterMessage::Clear => {
                    pending = None;
                    if let Err(e) = store.clear_state() {
                        tracing::error!("Failed to clear persisted state: {}", e);
                    }
                }
                WriterMessage::RunStarted {
                    session_id,
                    datasets,
                    config_hash,
                } => {
                    if let Err(e) = store.create_run(&session_id, &datasets, &config_hash) {
                        tracing::error!("Failed to record run {}: {}", session_id, e);
                    }
                }
                WriterMessage::RunStatus { session_id, status } => {
                    if let Err(e) = store.update_run_status(&session_id, status) {
                        tracing::warn!("Failed to update run {}: {}", session_id, e);
                    }
                }
                WriterMessage::RunFinished { session_id, status } => {
                    if let Err(e) = store.finish_run(&session_id, status) {
                        tracing::warn!("Failed to close run {}: {}", session_id, e);
                    }
                }
                WriterMessage::Shutdown => stopping = true,
            }
        }

        if let Some(state) = pending {
            match store.save_state(&state) {
                Ok(()) => tracing::trace!("Persisted state snapshot"),
                Err(e) => tracing::error!("Failed to persist state: {}", e),
            }
        }
    }

    tracing::debug!("State writer stopped");
}
