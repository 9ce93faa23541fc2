//! Signal reduction
//!
//! Folds the artifact report and the task report of one poll into a single
//! verdict. Priority, highest first:
//! 1. artifact complete → complete, whatever the task says
//! 2. task success without artifact → failed (inconsistent-success)
//! 3. task failure → failed (task-failure)
//! 4. anything else → keep waiting

use crate::remote::TaskState;

use super::types::{FailureTag, ProcessingStatus, SessionState};

/// Result of reducing one poll
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// Stay in the current steady state
    Continue,
    /// Move to this terminal state
    Terminal(SessionState),
}

pub fn reduce(status: &ProcessingStatus) -> Verdict {
    if status.artifact_complete {
        return Verdict::Terminal(SessionState::Complete);
    }

    let Some(task) = &status.task else {
        return Verdict::Continue;
    };

    match task.state {
        TaskState::Success => Verdict::Terminal(SessionState::Failed {
            tag: FailureTag::InconsistentSuccess,
            detail: None,
        }),
        TaskState::Failure => Verdict::Terminal(SessionState::Failed {
            tag: FailureTag::TaskFailure,
            detail: task.error.clone(),
        }),
        TaskState::Queued | TaskState::Running | TaskState::Unknown => Verdict::Continue,
    }
}
