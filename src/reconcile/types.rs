//! Reconciliation session types

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::hash::Sha1Digest;
use crate::remote::TaskStatus;

// ============================================================================
// States
// ============================================================================

/// Why a session ended in `Failed`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailureTag {
    /// Task claimed success, but no artifact was produced
    InconsistentSuccess,
    /// Task queue reported a failure
    TaskFailure,
    /// Error budget exhausted
    TooManyErrors,
}

impl FailureTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InconsistentSuccess => "inconsistent-success",
            Self::TaskFailure => "task-failure",
            Self::TooManyErrors => "too-many-errors",
        }
    }
}

impl fmt::Display for FailureTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Session state
///
/// `Idle` and `Probing` are entry states, `WaitingArtifact` (no task id) and
/// `Polling` (task id known) are the steady states, the rest are terminal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "kebab-case")]
pub enum SessionState {
    Idle,
    Probing,
    WaitingArtifact,
    Polling,
    Complete,
    Failed {
        tag: FailureTag,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        detail: Option<String>,
    },
    TimedOut,
    Cancelled,
}

impl SessionState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Complete | Self::Failed { .. } | Self::TimedOut | Self::Cancelled
        )
    }

    pub fn failure_tag(&self) -> Option<FailureTag> {
        match self {
            Self::Failed { tag, .. } => Some(*tag),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Probing => "probing",
            Self::WaitingArtifact => "waiting-artifact",
            Self::Polling => "polling",
            Self::Complete => "complete",
            Self::Failed { .. } => "failed",
            Self::TimedOut => "timed-out",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Failed { tag, .. } => write!(f, "failed ({})", tag),
            other => f.write_str(other.name()),
        }
    }
}

// ============================================================================
// Per-Poll Snapshot
// ============================================================================

/// What one poll learned. Recomputed every iteration, never stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessingStatus {
    pub artifact_complete: bool,
    /// `None` while no task id is known
    pub task: Option<TaskStatus>,
}

// ============================================================================
// Session
// ============================================================================

/// One polling run for one fingerprint.
///
/// Owned by whoever drives it and passed by `&mut` through every
/// reconciler call; there is no shared session registry.
#[derive(Debug, Clone)]
pub struct ReconciliationSession {
    pub fingerprint: Sha1Digest,
    pub task_id: Option<String>,
    pub state: SessionState,
    pub poll_count: u32,
    pub consecutive_error_count: u32,
    /// Clock offset at creation
    pub started_at: Duration,
    pub started_wall: DateTime<Utc>,
    pub last_error: Option<String>,
}

impl ReconciliationSession {
    pub fn new(fingerprint: Sha1Digest, started_at: Duration) -> Self {
        Self {
            fingerprint,
            task_id: None,
            state: SessionState::Idle,
            poll_count: 0,
            consecutive_error_count: 0,
            started_at,
            started_wall: Utc::now(),
            last_error: None,
        }
    }

    /// Record the task handle returned by a submission
    pub fn attach_task(&mut self, task_id: impl Into<String>) {
        self.task_id = Some(task_id.into());
    }

    /// `Polling` with a task id, `WaitingArtifact` without
    pub fn steady_state(&self) -> SessionState {
        if self.task_id.is_some() {
            SessionState::Polling
        } else {
            SessionState::WaitingArtifact
        }
    }
}

// ============================================================================
// Outcome
// ============================================================================

/// How a session ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionOutcome {
    pub state: SessionState,
    pub polls: u32,
    pub elapsed: Duration,
}

impl SessionOutcome {
    pub fn is_complete(&self) -> bool {
        self.state == SessionState::Complete
    }

    /// Map onto an error for callers that treat every non-completion as a
    /// failure. Cancellation is caller-initiated and stays `Ok`.
    pub fn into_result(self) -> Result<SessionState, ReconcileError> {
        match self.state {
            SessionState::Failed {
                tag: FailureTag::InconsistentSuccess,
                ..
            } => Err(ReconcileError::InconsistentSuccess),
            SessionState::Failed {
                tag: FailureTag::TaskFailure,
                detail,
            } => Err(ReconcileError::TaskFailed(
                detail.unwrap_or_else(|| "unknown error".to_string()),
            )),
            SessionState::Failed {
                tag: FailureTag::TooManyErrors,
                detail,
            } => Err(ReconcileError::TooManyErrors {
                polls: self.polls,
                last_error: detail.unwrap_or_default(),
            }),
            SessionState::TimedOut => Err(ReconcileError::TimedOut(self.elapsed)),
            state => Ok(state),
        }
    }
}

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum ReconcileError {
    #[error("Task reported success but no artifact exists (inconsistent-success)")]
    InconsistentSuccess,

    #[error("Task failed: {0}")]
    TaskFailed(String),

    #[error("Too many consecutive status errors after {polls} polls: {last_error}")]
    TooManyErrors { polls: u32, last_error: String },

    #[error("Timed out after {0:?}")]
    TimedOut(Duration),
}

impl ReconcileError {
    pub fn tag(&self) -> Option<FailureTag> {
        match self {
            Self::InconsistentSuccess => Some(FailureTag::InconsistentSuccess),
            Self::TaskFailed(_) => Some(FailureTag::TaskFailure),
            Self::TooManyErrors { .. } => Some(FailureTag::TooManyErrors),
            Self::TimedOut(_) => None,
        }
    }
}
