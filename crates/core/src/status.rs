// Worker status domain types
//
// Point-in-time view of the supervised worker, as reported by the status
// endpoint and logged on every transition.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::run::RunParameters;

#[cfg(feature = "openapi")]
use utoipa::ToSchema;

/// Worker liveness.
/// - `not_running`: no worker process exists
/// - `running`: a worker was spawned and has not exited
/// - `stopping`: a stop was requested and the process has not exited yet
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
#[serde(rename_all = "snake_case")]
pub enum WorkerState {
    #[default]
    NotRunning,
    Running,
    Stopping,
}

impl WorkerState {
    /// Running and stopping both hold the single worker slot.
    pub fn is_live(self) -> bool {
        !matches!(self, WorkerState::NotRunning)
    }
}

impl std::fmt::Display for WorkerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WorkerState::NotRunning => write!(f, "not_running"),
            WorkerState::Running => write!(f, "running"),
            WorkerState::Stopping => write!(f, "stopping"),
        }
    }
}

/// How a worker process ended.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct WorkerExit {
    /// Exit code, when the process exited normally.
    pub code: Option<i32>,
    /// Terminating signal number, when the process was killed by a signal.
    pub signal: Option<i32>,
    /// True when the supervisor had to escalate to a forced kill.
    pub forced: bool,
}

impl WorkerExit {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

/// Snapshot of the worker slot.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct WorkerStatus {
    /// Current liveness.
    pub state: WorkerState,
    /// Identifier of the live run, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run_id: Option<Uuid>,
    /// OS process id of the live worker, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pid: Option<u32>,
    /// Parameters the live worker was started with.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parameters: Option<RunParameters>,
    /// When the live worker was spawned.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    /// Outcome of the most recently finished run.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_exit: Option<WorkerExit>,
}
