//! Bundle Tracker Library
//!
//! Content-addressed submission of data bundles to a processing server,
//! and client-side tracking of the resulting processing job.
//!
//! # Modules
//!
//! - `hash`: SHA-1 engines (accelerated and portable, byte-identical)
//! - `manifest`: selection, canonical manifest and bundle fingerprint
//! - `remote`: server collaborators and their HTTP implementation
//! - `reconcile`: polling session state machine
//! - `pipeline`: fingerprint → existence check → upload → track

pub mod config;
pub mod hash;
pub mod manifest;
pub mod pipeline;
pub mod reconcile;
pub mod remote;

pub use config::Config;
pub use hash::{select_engine, HashEngine, Sha1Digest};
pub use manifest::{Bundle, ManifestBuilder};
pub use pipeline::{BundlePipeline, PipelineError, Submission};
pub use reconcile::{SessionState, StatusReconciler};
