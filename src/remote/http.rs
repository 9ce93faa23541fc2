//! HTTP implementation of the server collaborators
//!
//! Routes live under a configurable prefix (`/bval` by default):
//! - `GET    /{prefix}/exists/{fingerprint}`          200 = stored, 404 = not stored
//! - `POST   /{prefix}/upload`                        multipart bundle upload
//! - `GET    /{prefix}/metadata-status/{fingerprint}` artifact status
//! - `GET    /{prefix}/status/{task_id}`              task status
//! - `GET    /{prefix}/images/{fingerprint}`          generated images
//! - `DELETE /{prefix}/remove/{fingerprint}`          remove stored bundle

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;

use crate::config::ServerConfig;
use crate::hash::Sha1Digest;
use crate::manifest::ItemSource;

use super::types::{
    ArtifactStatus, ImageListing, RemoteError, TaskStatus, TaskStatusResponse, UploadReceipt,
};
use super::{
    ArtifactCatalog, ArtifactStatusSource, BundleRemover, ExistenceCheck, TaskStatusSource,
    Uploader,
};

/// Client for the processing server
#[derive(Clone)]
pub struct HttpClient {
    client: reqwest::Client,
    base_url: String,
}

impl HttpClient {
    /// Create from server configuration
    pub fn new(config: &ServerConfig) -> Result<Self, RemoteError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(RemoteError::from)?;

        Ok(Self::with_client(client, &config.base_url, &config.route_prefix))
    }

    /// Create with an existing reqwest client
    pub fn with_client(client: reqwest::Client, base_url: &str, route_prefix: &str) -> Self {
        let base = base_url.trim_end_matches('/');
        let prefix = route_prefix.trim_matches('/');
        let base_url = if prefix.is_empty() {
            base.to_string()
        } else {
            format!("{}/{}", base, prefix)
        };

        Self { client, base_url }
    }

    fn url(&self, route: &str, key: &str) -> String {
        format!("{}/{}/{}", self.base_url, route, urlencoding::encode(key))
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl ExistenceCheck for HttpClient {
    async fn exists(&self, fingerprint: &Sha1Digest) -> Result<bool, RemoteError> {
        let url = self.url("exists", &fingerprint.to_hex());
        let response = self.client.get(&url).send().await?;

        match response.status() {
            status if status.is_success() => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            status => Err(unexpected(status, response).await),
        }
    }
}

#[async_trait]
impl Uploader for HttpClient {
    async fn upload(
        &self,
        fingerprint: &Sha1Digest,
        items: &[Arc<dyn ItemSource>],
    ) -> Result<UploadReceipt, RemoteError> {
        let mut form = Form::new()
            .text("bundle_id", fingerprint.to_hex())
            .text("file_count", items.len().to_string());

        for item in items {
            let bytes = item.read_all().await.map_err(|e| RemoteError::ReadItem {
                path: item.relative_path().to_string(),
                source: e,
            })?;
            let part = Part::bytes(bytes).file_name(item.file_name().to_string());
            form = form.part("files", part);
        }

        let url = format!("{}/upload", self.base_url);
        tracing::info!(
            fingerprint = %fingerprint,
            files = items.len(),
            url = %url,
            "Uploading bundle"
        );

        let response = self.client.post(&url).multipart(form).send().await?;
        decode(response).await
    }
}

#[async_trait]
impl ArtifactStatusSource for HttpClient {
    async fn artifact_status(&self, fingerprint: &Sha1Digest) -> Result<ArtifactStatus, RemoteError> {
        let url = self.url("metadata-status", &fingerprint.to_hex());
        let response = self.client.get(&url).send().await?;
        decode(response).await
    }
}

#[async_trait]
impl TaskStatusSource for HttpClient {
    async fn task_status(&self, task_id: &str) -> Result<TaskStatus, RemoteError> {
        let url = self.url("status", task_id);
        let response = self.client.get(&url).send().await?;
        let body: TaskStatusResponse = decode(response).await?;
        Ok(body.into())
    }
}

#[async_trait]
impl ArtifactCatalog for HttpClient {
    async fn list_images(&self, fingerprint: &Sha1Digest) -> Result<ImageListing, RemoteError> {
        let url = self.url("images", &fingerprint.to_hex());
        let response = self.client.get(&url).send().await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(RemoteError::NotFound(fingerprint.to_hex()));
        }
        decode(response).await
    }
}

#[async_trait]
impl BundleRemover for HttpClient {
    async fn remove(&self, fingerprint: &Sha1Digest) -> Result<(), RemoteError> {
        let url = self.url("remove", &fingerprint.to_hex());
        let response = self.client.delete(&url).send().await?;

        match response.status() {
            status if status.is_success() => Ok(()),
            StatusCode::NOT_FOUND => Err(RemoteError::NotFound(fingerprint.to_hex())),
            status => Err(unexpected(status, response).await),
        }
    }
}

// ============================================================================
// Helpers
// ============================================================================

async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, RemoteError> {
    let status = response.status();
    if !status.is_success() {
        return Err(unexpected(status, response).await);
    }

    let bytes = response.bytes().await?;
    serde_json::from_slice(&bytes).map_err(|e| RemoteError::Protocol(e.to_string()))
}

async fn unexpected(status: StatusCode, response: reqwest::Response) -> RemoteError {
    let body = response.text().await.unwrap_or_default();
    RemoteError::UnexpectedStatus {
        status: status.as_u16(),
        body,
    }
}

impl From<reqwest::Error> for RemoteError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            RemoteError::Protocol(err.to_string())
        } else {
            RemoteError::Network(err.to_string())
        }
    }
}
