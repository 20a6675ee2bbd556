//! Cooperative pause and hard-stop signals
//!
//! A run never aborts an in-flight request. It polls the handle between
//! datasets and between catalog sub-items and stops at the next poll point.

use crate::{HarvestError, Result};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Reply to a graceful stop request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StopAck {
    pub paused: bool,
}

/// Reply to a hard stop request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TerminateAck {
    pub terminated: bool,
}

#[derive(Debug, Default)]
struct Flags {
    pause: AtomicBool,
    terminate: AtomicBool,
}

/// Cloneable handle other tasks use to stop a run
#[derive(Debug, Clone, Default)]
pub struct ControlHandle {
    flags: Arc<Flags>,
}

impl ControlHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Asks the run to pause at its next poll point
    pub fn request_pause(&self) -> StopAck {
        self.flags.pause.store(true, Ordering::SeqCst);
        StopAck { paused: true }
    }

    /// Asks the run to stop for good at its next poll point
    pub fn request_terminate(&self) -> TerminateAck {
        self.flags.terminate.store(true, Ordering::SeqCst);
        TerminateAck { terminated: true }
    }

    /// True if the run should stop (pause or terminate)
    pub fn stop_requested(&self) -> bool {
        self.flags.pause.load(Ordering::SeqCst) || self.terminate_requested()
    }

    pub fn terminate_requested(&self) -> bool {
        self.flags.terminate.load(Ordering::SeqCst)
    }

    /// Poll point: fails with `PauseRequested` once a stop was asked for
    pub fn checkpoint(&self) -> Result<()> {
        if self.stop_requested() {
            Err(HarvestError::PauseRequested)
        } else {
            Ok(())
        }
    }

    /// Clears both flags before a new run or a resume
    pub fn reset(&self) {
        self.flags.pause.store(false, Ordering::SeqCst);
        self.flags.terminate.store(false, Ordering::SeqCst);
    }
}
