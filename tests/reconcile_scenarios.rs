//! End-to-end polling scenarios against scripted collaborators

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use bundle_tracker::config::PollingConfig;
use bundle_tracker::hash::Sha1Digest;
use bundle_tracker::reconcile::{
    cancel_pair, CancelHandle, CancelToken, FailureTag, ManualClock, ReconcileError,
    SessionState, StatusObserver, StatusReconciler,
};
use bundle_tracker::remote::{
    ArtifactStatus, ArtifactStatusSource, RemoteError, TaskState, TaskStatus, TaskStatusSource,
};

// ============================================================================
// Fakes
// ============================================================================

/// Replays a script; the last entry repeats
struct Script<T> {
    steps: Mutex<VecDeque<Result<T, String>>>,
    calls: Mutex<u32>,
}

impl<T: Clone> Script<T> {
    fn new(steps: Vec<Result<T, String>>) -> Arc<Self> {
        Arc::new(Self {
            steps: Mutex::new(steps.into()),
            calls: Mutex::new(0),
        })
    }

    fn repeat(step: Result<T, String>) -> Arc<Self> {
        Self::new(vec![step])
    }

    fn step(&self) -> Result<T, RemoteError> {
        *self.calls.lock() += 1;
        let mut steps = self.steps.lock();
        let step = if steps.len() > 1 {
            steps.pop_front()
        } else {
            steps.front().cloned()
        };
        step.unwrap_or_else(|| Err("script exhausted".to_string()))
            .map_err(RemoteError::Network)
    }

    fn calls(&self) -> u32 {
        *self.calls.lock()
    }
}

#[async_trait]
impl ArtifactStatusSource for Script<ArtifactStatus> {
    async fn artifact_status(&self, _: &Sha1Digest) -> Result<ArtifactStatus, RemoteError> {
        self.step()
    }
}

#[async_trait]
impl TaskStatusSource for Script<TaskStatus> {
    async fn task_status(&self, _: &str) -> Result<TaskStatus, RemoteError> {
        self.step()
    }
}

/// Cancels its own session while the query is in flight, then reports
/// a complete artifact
struct CancelMidQuery {
    handle: Mutex<Option<CancelHandle>>,
}

#[async_trait]
impl ArtifactStatusSource for CancelMidQuery {
    async fn artifact_status(&self, _: &Sha1Digest) -> Result<ArtifactStatus, RemoteError> {
        if let Some(handle) = self.handle.lock().as_ref() {
            handle.cancel();
        }
        Ok(ArtifactStatus::new(true, true))
    }
}

#[derive(Default)]
struct RecordingObserver {
    seen: Mutex<Vec<String>>,
}

impl StatusObserver for RecordingObserver {
    fn on_transition(&self, _: &Sha1Digest, state: &SessionState, _: &str) {
        self.seen.lock().push(state.name().to_string());
    }
}

fn fingerprint() -> Sha1Digest {
    "84983e441c3bd26ebaae4aa1f95129e5e54670f1".parse().unwrap()
}

fn pending() -> Result<ArtifactStatus, String> {
    Ok(ArtifactStatus::new(false, false))
}

fn done() -> Result<ArtifactStatus, String> {
    Ok(ArtifactStatus::new(true, false))
}

fn task(state: TaskState) -> Result<TaskStatus, String> {
    Ok(TaskStatus::new(state))
}

fn reconciler(
    artifacts: Arc<dyn ArtifactStatusSource>,
    tasks: Arc<dyn TaskStatusSource>,
) -> (StatusReconciler, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new());
    let reconciler =
        StatusReconciler::new(artifacts, tasks, PollingConfig::default()).with_clock(clock.clone());
    (reconciler, clock)
}

// ============================================================================
// Scenarios
// ============================================================================

#[tokio::test]
async fn test_artifact_wins_over_running_task() {
    let artifacts = Script::repeat(done());
    let tasks = Script::repeat(task(TaskState::Running));
    let observer = Arc::new(RecordingObserver::default());
    let (reconciler, _) = reconciler(artifacts.clone(), tasks.clone());
    let reconciler = reconciler.with_observer(observer.clone());

    let mut session = reconciler.open_session(fingerprint());
    session.attach_task("task-1");
    let outcome = reconciler.run(&mut session, CancelToken::never()).await;

    assert_eq!(outcome.state, SessionState::Complete);
    assert_eq!(outcome.polls, 1);
    assert_eq!(tasks.calls(), 0);
    assert_eq!(*observer.seen.lock(), vec!["polling", "complete"]);
}

#[tokio::test]
async fn test_polls_until_artifact_appears() {
    let artifacts = Script::new(vec![pending(), pending(), pending(), done()]);
    let tasks = Script::repeat(task(TaskState::Running));
    let (reconciler, clock) = reconciler(artifacts.clone(), tasks.clone());

    let mut session = reconciler.open_session(fingerprint());
    session.attach_task("task-1");
    let outcome = reconciler.run(&mut session, CancelToken::never()).await;

    assert!(outcome.is_complete());
    assert_eq!(outcome.polls, 4);
    assert_eq!(artifacts.calls(), 4);
    assert_eq!(tasks.calls(), 3);
    assert_eq!(clock.sleeps().len(), 3);
    assert_eq!(outcome.elapsed, Duration::from_secs(30));
}

#[tokio::test]
async fn test_success_without_output_is_inconsistent() {
    let artifacts = Script::repeat(pending());
    let tasks = Script::repeat(task(TaskState::Success));
    let (reconciler, _) = reconciler(artifacts, tasks);

    let mut session = reconciler.open_session(fingerprint());
    session.attach_task("task-1");
    let outcome = reconciler.run(&mut session, CancelToken::never()).await;

    assert_eq!(
        outcome.state.failure_tag(),
        Some(FailureTag::InconsistentSuccess)
    );
    assert_eq!(outcome.polls, 1);

    let err = outcome.into_result().unwrap_err();
    assert!(matches!(err, ReconcileError::InconsistentSuccess));
    assert_eq!(err.tag(), Some(FailureTag::InconsistentSuccess));
}

#[tokio::test]
async fn test_task_failure_carries_reason() {
    let artifacts = Script::repeat(pending());
    let tasks = Script::repeat(Ok(TaskStatus::failed("bad manifest column")));
    let (reconciler, _) = reconciler(artifacts, tasks);

    let mut session = reconciler.open_session(fingerprint());
    session.attach_task("task-1");
    let outcome = reconciler.run(&mut session, CancelToken::never()).await;

    match &outcome.state {
        SessionState::Failed { tag, detail } => {
            assert_eq!(*tag, FailureTag::TaskFailure);
            assert_eq!(detail.as_deref(), Some("bad manifest column"));
        }
        other => panic!("unexpected state {:?}", other),
    }
}

#[tokio::test]
async fn test_error_budget_stops_after_five_failures() {
    let artifacts = Script::repeat(Err("connection refused".to_string()));
    let tasks = Script::repeat(task(TaskState::Running));
    let observer = Arc::new(RecordingObserver::default());
    let (reconciler, _) = reconciler(artifacts.clone(), tasks.clone());
    let reconciler = reconciler.with_observer(observer.clone());

    let mut session = reconciler.open_session(fingerprint());
    session.attach_task("task-1");
    let outcome = reconciler.run(&mut session, CancelToken::never()).await;

    assert_eq!(outcome.state.failure_tag(), Some(FailureTag::TooManyErrors));
    assert_eq!(outcome.polls, 5);
    assert_eq!(artifacts.calls(), 5);
    assert_eq!(tasks.calls(), 0);
    assert_eq!(session.consecutive_error_count, 5);

    // Intermediate failures never reach the observer
    assert_eq!(*observer.seen.lock(), vec!["polling", "failed"]);
}

#[tokio::test]
async fn test_interleaved_success_keeps_session_alive() {
    let mut steps = Vec::new();
    for _ in 0..3 {
        steps.extend([
            Err("timeout".to_string()),
            Err("timeout".to_string()),
            Err("timeout".to_string()),
            Err("timeout".to_string()),
            pending(),
        ]);
    }
    steps.push(done());
    let artifacts = Script::new(steps);
    let tasks = Script::repeat(task(TaskState::Running));
    let (reconciler, _) = reconciler(artifacts.clone(), tasks);

    let mut session = reconciler.open_session(fingerprint());
    let outcome = reconciler.run(&mut session, CancelToken::never()).await;

    assert!(outcome.is_complete());
    assert_eq!(artifacts.calls(), 16);
}

#[tokio::test]
async fn test_session_past_lifetime_times_out() {
    let artifacts = Script::repeat(pending());
    let tasks = Script::repeat(task(TaskState::Running));
    let (reconciler, clock) = reconciler(artifacts.clone(), tasks);

    let mut session = reconciler.open_session(fingerprint());
    session.attach_task("task-1");
    clock.advance(Duration::from_secs(25 * 3600));

    let outcome = reconciler.run(&mut session, CancelToken::never()).await;

    assert_eq!(outcome.state, SessionState::TimedOut);
    assert_eq!(outcome.polls, 0);
    assert_eq!(artifacts.calls(), 0);
    assert!(matches!(
        outcome.into_result(),
        Err(ReconcileError::TimedOut(_))
    ));
}

#[tokio::test]
async fn test_lifetime_reached_while_polling() {
    let artifacts = Script::repeat(pending());
    let tasks = Script::repeat(task(TaskState::Queued));
    let clock = Arc::new(ManualClock::new());
    let config = PollingConfig {
        interval_secs: 10,
        max_consecutive_errors: 5,
        lifetime_hours: 1,
    };
    let reconciler =
        StatusReconciler::new(artifacts.clone(), tasks, config).with_clock(clock.clone());

    let mut session = reconciler.open_session(fingerprint());
    session.attach_task("task-1");
    let outcome = reconciler.run(&mut session, CancelToken::never()).await;

    assert_eq!(outcome.state, SessionState::TimedOut);
    assert_eq!(outcome.elapsed, Duration::from_secs(3600));
    assert_eq!(artifacts.calls(), 360);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_spawned_session() {
    let artifacts = Script::repeat(pending());
    let tasks = Script::repeat(task(TaskState::Running));
    let reconciler = Arc::new(StatusReconciler::new(
        artifacts.clone(),
        tasks,
        PollingConfig::default(),
    ));

    let mut session = reconciler.open_session(fingerprint());
    session.attach_task("task-1");
    let handle = reconciler.spawn(session);

    // Polls at t=0, 10 and 20
    tokio::time::sleep(Duration::from_secs(25)).await;
    handle.cancel();

    let (session, outcome) = handle.wait().await.unwrap();
    assert_eq!(outcome.state, SessionState::Cancelled);
    assert_eq!(outcome.polls, 3);
    assert_eq!(session.state, SessionState::Cancelled);
    assert!(outcome.into_result().is_ok());
}

#[tokio::test]
async fn test_result_in_flight_at_cancel_is_discarded() {
    let (handle, token) = cancel_pair();
    let artifacts = Arc::new(CancelMidQuery {
        handle: Mutex::new(Some(handle)),
    });
    let tasks = Script::repeat(task(TaskState::Success));
    let (reconciler, _) = reconciler(artifacts, tasks);

    let mut session = reconciler.open_session(fingerprint());
    let outcome = reconciler.run(&mut session, token).await;

    assert_eq!(outcome.state, SessionState::Cancelled);
    assert_eq!(outcome.polls, 0);
}

#[tokio::test]
async fn test_artifact_only_session_waits_for_output() {
    let artifacts = Script::new(vec![pending(), done()]);
    let tasks = Script::repeat(task(TaskState::Failure));
    let observer = Arc::new(RecordingObserver::default());
    let (reconciler, _) = reconciler(artifacts, tasks.clone());
    let reconciler = reconciler.with_observer(observer.clone());

    let mut session = reconciler.open_session(fingerprint());
    let outcome = reconciler.run(&mut session, CancelToken::never()).await;

    assert!(outcome.is_complete());
    assert_eq!(tasks.calls(), 0);
    assert_eq!(*observer.seen.lock(), vec!["waiting-artifact", "complete"]);
}
