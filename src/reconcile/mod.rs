//! Status Reconciliation Module
//!
//! Tracks a submitted bundle to completion by polling two signals that do
//! not always agree:
//! - the artifact record (keyed by fingerprint), which proves output exists
//! - the task queue (keyed by task id), which reports job progress
//!
//! State machine:
//! ```text
//! Idle → Probing → WaitingArtifact | Polling → Complete | Failed | TimedOut | Cancelled
//! ```
//!
//! `Failed` carries a `FailureTag` (`inconsistent-success`, `task-failure`,
//! `too-many-errors`) so callers can render different guidance.

pub mod cancel;
pub mod clock;
pub mod observer;
pub mod reconciler;
pub mod reduce;
pub mod types;

pub use cancel::{cancel_pair, CancelHandle, CancelToken};
pub use clock::{Clock, ManualClock, TokioClock};
pub use observer::{describe, StatusObserver, TracingObserver};
pub use reconciler::{SessionHandle, StatusReconciler};
pub use reduce::{reduce, Verdict};
pub use types::*;
