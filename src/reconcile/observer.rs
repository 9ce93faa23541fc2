//! State transition observers
//!
//! The rendering side of the reconciler. Observers are told about
//! transitions only, never about individual polls.

use crate::hash::Sha1Digest;

use super::types::SessionState;

pub trait StatusObserver: Send + Sync {
    fn on_transition(&self, fingerprint: &Sha1Digest, state: &SessionState, message: &str);
}

/// Logs transitions through `tracing`
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl StatusObserver for TracingObserver {
    fn on_transition(&self, fingerprint: &Sha1Digest, state: &SessionState, message: &str) {
        match state {
            SessionState::Failed { tag, .. } => {
                tracing::error!(fingerprint = %fingerprint, tag = %tag, "{}", message);
            }
            SessionState::TimedOut => {
                tracing::warn!(fingerprint = %fingerprint, state = %state, "{}", message);
            }
            _ => {
                tracing::info!(fingerprint = %fingerprint, state = %state, "{}", message);
            }
        }
    }
}

/// Human-readable message for entering `state`
pub fn describe(state: &SessionState) -> String {
    match state {
        SessionState::Idle => "Bundle ready.".to_string(),
        SessionState::Probing => "Checking if this bundle already exists...".to_string(),
        SessionState::WaitingArtifact => "Waiting for processing output...".to_string(),
        SessionState::Polling => "Upload complete. Processing files...".to_string(),
        SessionState::Complete => "Processing complete.".to_string(),
        SessionState::Failed { tag, detail } => match tag {
            super::FailureTag::InconsistentSuccess => {
                "Task reported success but produced no output. Re-submit the bundle to retry."
                    .to_string()
            }
            super::FailureTag::TaskFailure => format!(
                "Processing failed: {}",
                detail.as_deref().unwrap_or("unknown error")
            ),
            super::FailureTag::TooManyErrors => format!(
                "Status checks keep failing: {}",
                detail.as_deref().unwrap_or("unknown error")
            ),
        },
        SessionState::TimedOut => "Gave up waiting for processing to finish.".to_string(),
        SessionState::Cancelled => "Status tracking cancelled.".to_string(),
    }
}
