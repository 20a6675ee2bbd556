/// Run status of the scrape orchestrator
///
/// This module defines the lifecycle of a scrape run and which moves between
/// statuses are legal.
use serde::{Deserialize, Serialize};
use std::fmt;

/// Represents where the orchestrator is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    /// Nothing has run yet (or the state was reset)
    #[default]
    Idle,

    /// A run is in flight
    Running,

    /// Stopped gracefully; a resume continues from the checkpoint
    Paused,

    // ===== Terminal States =====
    /// Every selected dataset was attempted
    Completed,

    /// Aborted by a fatal error (bad credentials, none stored)
    Failed,

    /// Hard-stopped; checkpoints were discarded and there is no resume
    Terminated,
}

impl RunStatus {
    /// Returns true if the run is over and a new one may start
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Terminated)
    }

    /// Returns true if a resume can continue this run
    pub fn is_resumable(&self) -> bool {
        matches!(self, Self::Paused)
    }

    /// Checks whether moving to `to` is a legal transition
    ///
    /// | From | To |
    /// |------|----|
    /// | Idle, terminal | Running |
    /// | Running | Paused, Completed, Failed, Terminated |
    /// | Paused | Running, Terminated |
    /// | anything but Running | Idle |
    pub fn can_transition_to(&self, to: RunStatus) -> bool {
        use RunStatus::*;
        match (self, to) {
            (Running, Idle) => false,
            (from, Idle) => *from != Idle,
            (Idle | Completed | Failed | Terminated, Running) => true,
            (Running, Paused | Completed | Failed | Terminated) => true,
            (Paused, Running | Terminated) => true,
            _ => false,
        }
    }

    /// Converts the status to its database string representation
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::Paused => "paused",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Terminated => "terminated",
        }
    }

    /// Parses a status from its database string representation
    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "idle" => Some(Self::Idle),
            "running" => Some(Self::Running),
            "paused" => Some(Self::Paused),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            "terminated" => Some(Self::Terminated),
            _ => None,
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_string())
    }
}
