//! Bundle submission pipeline
//!
//! Selection → fingerprint → existence check → upload (only when the server
//! does not have the bundle) → status reconciliation.

use std::sync::Arc;

use crate::config::{Config, ConfigError};
use crate::hash::{select_engine, HashError};
use crate::manifest::{Bundle, ItemSource, ManifestBuilder, ManifestError, PreparedBundle};
use crate::reconcile::{
    CancelToken, ReconciliationSession, SessionOutcome, SessionState, StatusObserver,
    StatusReconciler,
};
use crate::remote::{ExistenceCheck, HttpClient, RemoteError, Uploader};

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error(transparent)]
    Hash(#[from] HashError),

    #[error(transparent)]
    Manifest(#[from] ManifestError),

    #[error(transparent)]
    Remote(#[from] RemoteError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// What the submit step did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Submission {
    /// The server already had this fingerprint; nothing was uploaded
    AlreadyStored,
    /// Files were uploaded; a task id is returned when processing was queued
    Uploaded { task_id: Option<String> },
}

/// Everything a full run produced
#[derive(Debug, Clone)]
pub struct PipelineReport {
    pub bundle: Bundle,
    pub submission: Submission,
    pub outcome: SessionOutcome,
}

pub struct BundlePipeline {
    builder: ManifestBuilder,
    existence: Arc<dyn ExistenceCheck>,
    uploader: Arc<dyn Uploader>,
    reconciler: Arc<StatusReconciler>,
}

impl BundlePipeline {
    pub fn new(
        builder: ManifestBuilder,
        existence: Arc<dyn ExistenceCheck>,
        uploader: Arc<dyn Uploader>,
        reconciler: Arc<StatusReconciler>,
    ) -> Self {
        Self {
            builder,
            existence,
            uploader,
            reconciler,
        }
    }

    /// Wire everything to the HTTP server described by `config`
    pub fn from_config(
        config: &Config,
        observer: Arc<dyn StatusObserver>,
    ) -> Result<Self, PipelineError> {
        let engine = select_engine(config.hashing.engine)?;
        let client = Arc::new(HttpClient::new(&config.server)?);

        let reconciler = StatusReconciler::new(client.clone(), client.clone(), config.polling.clone())
            .with_observer(observer);

        Ok(Self::new(
            ManifestBuilder::new(engine),
            client.clone(),
            client,
            Arc::new(reconciler),
        ))
    }

    pub fn reconciler(&self) -> &Arc<StatusReconciler> {
        &self.reconciler
    }

    /// Fingerprint a selection
    pub async fn prepare(
        &self,
        sources: Vec<Arc<dyn ItemSource>>,
    ) -> Result<PreparedBundle, PipelineError> {
        Ok(self.builder.build(sources).await?)
    }

    /// Check existence, upload if needed, and return a session ready for polling
    pub async fn submit(
        &self,
        prepared: &PreparedBundle,
    ) -> Result<(ReconciliationSession, Submission), PipelineError> {
        let fingerprint = *prepared.fingerprint();
        let mut session = self.reconciler.open_session(fingerprint);

        self.reconciler.transition(&mut session, SessionState::Probing);

        let submission = if self.existence.exists(&fingerprint).await? {
            tracing::info!(fingerprint = %fingerprint, "Bundle already stored, skipping upload");
            Submission::AlreadyStored
        } else {
            let receipt = self.uploader.upload(&fingerprint, &prepared.sources).await?;

            match &receipt.task_id {
                Some(task_id) => {
                    tracing::info!(fingerprint = %fingerprint, task_id = %task_id, "Upload accepted");
                    session.attach_task(task_id.clone());
                }
                None => {
                    tracing::info!(fingerprint = %fingerprint, "Upload accepted without task id");
                }
            }

            Submission::Uploaded {
                task_id: receipt.task_id,
            }
        };

        let steady = session.steady_state();
        self.reconciler.transition(&mut session, steady);

        Ok((session, submission))
    }

    /// Poll a submitted session to a terminal state
    pub async fn track(
        &self,
        session: &mut ReconciliationSession,
        cancel: CancelToken,
    ) -> SessionOutcome {
        self.reconciler.run(session, cancel).await
    }

    /// Full run: fingerprint, submit, track
    pub async fn run(
        &self,
        sources: Vec<Arc<dyn ItemSource>>,
        cancel: CancelToken,
    ) -> Result<PipelineReport, PipelineError> {
        let prepared = self.prepare(sources).await?;
        let (mut session, submission) = self.submit(&prepared).await?;
        let outcome = self.track(&mut session, cancel).await;

        Ok(PipelineReport {
            bundle: prepared.bundle,
            submission,
            outcome,
        })
    }
}
