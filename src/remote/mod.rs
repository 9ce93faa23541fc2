//! Processing Server Collaborators
//!
//! Everything the client needs from the server, split by concern so the
//! pipeline and reconciler can be driven by fakes in tests:
//! - `ExistenceCheck`: has a bundle with this fingerprint been stored?
//! - `Uploader`: store a bundle, maybe start a processing task
//! - `ArtifactStatusSource`: has processing output been written?
//! - `TaskStatusSource`: what does the task queue say?
//!
//! `HttpClient` implements all of them against the server's HTTP routes.

mod http;
mod types;

use std::sync::Arc;

use async_trait::async_trait;

use crate::hash::Sha1Digest;
use crate::manifest::ItemSource;

pub use http::HttpClient;
pub use types::*;

/// Bundle existence lookup
#[async_trait]
pub trait ExistenceCheck: Send + Sync {
    async fn exists(&self, fingerprint: &Sha1Digest) -> Result<bool, RemoteError>;
}

/// Bundle upload
#[async_trait]
pub trait Uploader: Send + Sync {
    /// Send every item with its original file name under `fingerprint`
    async fn upload(
        &self,
        fingerprint: &Sha1Digest,
        items: &[Arc<dyn ItemSource>],
    ) -> Result<UploadReceipt, RemoteError>;
}

/// Artifact (output metadata) status lookup
#[async_trait]
pub trait ArtifactStatusSource: Send + Sync {
    async fn artifact_status(&self, fingerprint: &Sha1Digest) -> Result<ArtifactStatus, RemoteError>;
}

/// Task queue status lookup
#[async_trait]
pub trait TaskStatusSource: Send + Sync {
    async fn task_status(&self, task_id: &str) -> Result<TaskStatus, RemoteError>;
}

/// Generated output listing
#[async_trait]
pub trait ArtifactCatalog: Send + Sync {
    async fn list_images(&self, fingerprint: &Sha1Digest) -> Result<ImageListing, RemoteError>;
}

/// Stored bundle removal
#[async_trait]
pub trait BundleRemover: Send + Sync {
    async fn remove(&self, fingerprint: &Sha1Digest) -> Result<(), RemoteError>;
}
