//! Job lifecycle states and completion ledger status.
//!
//! ```text
//! (absent) --submit--> Queued --permit--> Running --exit 0--> Completed
//!                                             \--exit != 0 / signal / deadline--> Failed
//! Queued / Running --shutdown--> Failed(Cancelled)
//! ```
//!
//! Terminal states are reported and then the registry entry is removed, so a
//! poll after exit sees no entry at all.

use serde::Serialize;

/// Why a job ended in [`JobState::Failed`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum FailureReason {
    /// The child exited with a non-zero status code.
    ExitCode(i32),
    /// The child was terminated by a signal (no exit code).
    Signalled,
    /// The child outlived its deadline and was killed.
    Timeout,
    /// The job was abandoned because the service is shutting down.
    Cancelled,
    /// The child could not be started.
    SpawnFailed(String),
    /// Waiting on the child failed at the OS level.
    Io(String),
}

impl std::fmt::Display for FailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ExitCode(code) => write!(f, "exited with code {code}"),
            Self::Signalled => write!(f, "terminated by signal"),
            Self::Timeout => write!(f, "timed out"),
            Self::Cancelled => write!(f, "cancelled during shutdown"),
            Self::SpawnFailed(msg) => write!(f, "failed to start: {msg}"),
            Self::Io(msg) => write!(f, "supervision error: {msg}"),
        }
    }
}

/// State of a tracked pipeline job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "reason", rename_all = "snake_case")]
pub enum JobState {
    /// Accepted, waiting for a worker slot.
    Queued,
    /// Child process is running.
    Running,
    /// Child exited with status 0.
    Completed,
    /// Child exited abnormally.
    Failed(FailureReason),
}

impl JobState {
    /// Whether the job still occupies its key (blocks resubmission).
    pub fn is_live(&self) -> bool {
        matches!(self, Self::Queued | Self::Running)
    }

    /// Short lower-case label used in API responses and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed(_) => "failed",
        }
    }
}

/// Result of a completion ledger lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionStatus {
    Completed,
    Pending,
}

impl CompletionStatus {
    /// Wire value of the `status` field (`"success"` / `"pending"`).
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Completed => "success",
            Self::Pending => "pending",
        }
    }

    /// Human-readable message accompanying the status.
    pub fn message(self) -> &'static str {
        match self {
            Self::Completed => "Pipeline completed successfully",
            Self::Pending => "Pipeline still processing",
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
