//! Status Reconciler
//!
//! Drives one session's polling loop:
//! - Each iteration queries the artifact status, then (if a task id is known
//!   and the artifact is not there yet) the task status. Never concurrently.
//! - Failed polls only spend the error budget; a successful poll refills it.
//! - The inter-poll wait is capped at the remaining lifetime, so the
//!   ceiling is enforced even while sleeping.
//! - Cancellation is checked before each iteration, during the wait, and
//!   after each query. An in-flight query is never aborted; its result is
//!   dropped.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;

use crate::config::PollingConfig;
use crate::hash::Sha1Digest;
use crate::remote::{ArtifactStatusSource, RemoteError, TaskStatusSource};

use super::cancel::{cancel_pair, CancelHandle, CancelToken};
use super::clock::{Clock, TokioClock};
use super::observer::{describe, StatusObserver, TracingObserver};
use super::reduce::{reduce, Verdict};
use super::types::{FailureTag, ProcessingStatus, ReconciliationSession, SessionOutcome, SessionState};

// ============================================================================
// Reconciler
// ============================================================================

/// Reconciles artifact and task signals into one session state
pub struct StatusReconciler {
    artifacts: Arc<dyn ArtifactStatusSource>,
    tasks: Arc<dyn TaskStatusSource>,
    clock: Arc<dyn Clock>,
    observer: Arc<dyn StatusObserver>,
    config: PollingConfig,
}

impl StatusReconciler {
    /// Create with the real clock and a tracing observer
    pub fn new(
        artifacts: Arc<dyn ArtifactStatusSource>,
        tasks: Arc<dyn TaskStatusSource>,
        config: PollingConfig,
    ) -> Self {
        Self {
            artifacts,
            tasks,
            clock: Arc::new(TokioClock::new()),
            observer: Arc::new(TracingObserver),
            config,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn StatusObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn config(&self) -> &PollingConfig {
        &self.config
    }

    // ========================================================================
    // Session Lifecycle
    // ========================================================================

    /// Start a session in `Idle`, stamped with the current clock time
    pub fn open_session(&self, fingerprint: Sha1Digest) -> ReconciliationSession {
        ReconciliationSession::new(fingerprint, self.clock.now())
    }

    /// Time since the session was opened
    pub fn elapsed(&self, session: &ReconciliationSession) -> Duration {
        self.clock.now().saturating_sub(session.started_at)
    }

    /// Move the session to `state` and notify the observer. Repeating the
    /// current state is a no-op; terminal states are final.
    pub fn transition(&self, session: &mut ReconciliationSession, state: SessionState) {
        if session.state == state || session.state.is_terminal() {
            return;
        }

        tracing::debug!(
            fingerprint = %session.fingerprint,
            from = %session.state,
            to = %state,
            polls = session.poll_count,
            "Session transition"
        );

        let message = describe(&state);
        session.state = state;
        self.observer
            .on_transition(&session.fingerprint, &session.state, &message);
    }

    // ========================================================================
    // Polling
    // ========================================================================

    /// Query both signals for one iteration.
    ///
    /// The artifact answer is evaluated before the task query is issued; a
    /// complete artifact makes the task query unnecessary.
    pub async fn query(
        &self,
        session: &ReconciliationSession,
    ) -> Result<ProcessingStatus, RemoteError> {
        let artifact = self.artifacts.artifact_status(&session.fingerprint).await?;
        let artifact_complete = artifact.is_complete();

        let task = match &session.task_id {
            Some(task_id) if !artifact_complete => Some(self.tasks.task_status(task_id).await?),
            _ => None,
        };

        Ok(ProcessingStatus {
            artifact_complete,
            task,
        })
    }

    /// Fold one query result into the session: error budget, then reduction
    pub fn apply(
        &self,
        session: &mut ReconciliationSession,
        result: Result<ProcessingStatus, RemoteError>,
    ) {
        session.poll_count += 1;

        match result {
            Ok(status) => {
                session.consecutive_error_count = 0;
                session.last_error = None;

                tracing::debug!(
                    fingerprint = %session.fingerprint,
                    poll = session.poll_count,
                    artifact_complete = status.artifact_complete,
                    task = ?status.task.as_ref().map(|t| t.state),
                    "Status poll"
                );

                if let Verdict::Terminal(state) = reduce(&status) {
                    self.transition(session, state);
                }
            }
            Err(err) => {
                session.consecutive_error_count += 1;
                let message = err.to_string();

                tracing::warn!(
                    fingerprint = %session.fingerprint,
                    consecutive = session.consecutive_error_count,
                    max = self.config.max_consecutive_errors,
                    error = %message,
                    "Status poll failed"
                );

                session.last_error = Some(message.clone());

                if session.consecutive_error_count >= self.config.max_consecutive_errors {
                    self.transition(
                        session,
                        SessionState::Failed {
                            tag: FailureTag::TooManyErrors,
                            detail: Some(message),
                        },
                    );
                }
            }
        }
    }

    /// One full iteration without waiting
    pub async fn poll_once(&self, session: &mut ReconciliationSession) {
        let result = self.query(session).await;
        self.apply(session, result);
    }

    /// Poll until the session reaches a terminal state
    pub async fn run(
        &self,
        session: &mut ReconciliationSession,
        mut cancel: CancelToken,
    ) -> SessionOutcome {
        let steady = session.steady_state();
        self.transition(session, steady);

        let lifetime = self.config.lifetime();
        let interval = self.config.interval();

        while !session.state.is_terminal() {
            if cancel.is_cancelled() {
                self.transition(session, SessionState::Cancelled);
                break;
            }

            if self.elapsed(session) >= lifetime {
                self.transition(session, SessionState::TimedOut);
                break;
            }

            let result = self.query(session).await;

            if cancel.is_cancelled() {
                tracing::debug!(
                    fingerprint = %session.fingerprint,
                    "Discarding poll result after cancellation"
                );
                self.transition(session, SessionState::Cancelled);
                break;
            }

            self.apply(session, result);
            if session.state.is_terminal() {
                break;
            }

            let remaining = lifetime.saturating_sub(self.elapsed(session));
            if remaining.is_zero() {
                continue;
            }

            tokio::select! {
                _ = self.clock.sleep(interval.min(remaining)) => {}
                _ = cancel.cancelled() => {}
            }
        }

        let outcome = SessionOutcome {
            state: session.state.clone(),
            polls: session.poll_count,
            elapsed: self.elapsed(session),
        };

        tracing::info!(
            fingerprint = %session.fingerprint,
            state = %outcome.state,
            polls = outcome.polls,
            elapsed_secs = outcome.elapsed.as_secs(),
            "Session finished"
        );

        outcome
    }

    /// Run a session on its own task
    pub fn spawn(self: &Arc<Self>, mut session: ReconciliationSession) -> SessionHandle {
        let (cancel, token) = cancel_pair();
        let reconciler = Arc::clone(self);

        let join = tokio::spawn(async move {
            let outcome = reconciler.run(&mut session, token).await;
            (session, outcome)
        });

        SessionHandle { cancel, join }
    }
}

// ============================================================================
// Session Handle
// ============================================================================

/// A session running on its own task
pub struct SessionHandle {
    cancel: CancelHandle,
    join: JoinHandle<(ReconciliationSession, SessionOutcome)>,
}

impl SessionHandle {
    /// Request cancellation; takes effect before the next iteration
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    /// Wait for the session to end
    pub async fn wait(
        self,
    ) -> Result<(ReconciliationSession, SessionOutcome), tokio::task::JoinError> {
        self.join.await
    }
}
