//! Wire types for the processing server

use serde::{Deserialize, Deserializer, Serialize};

// ============================================================================
// Artifact Status
// ============================================================================

/// Response of `GET /{prefix}/metadata-status/{fingerprint}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactStatus {
    /// Echo of the queried fingerprint
    #[serde(default, rename = "sha1_hash")]
    pub fingerprint: Option<String>,

    /// Whether the output metadata record exists
    pub metadata_exists: bool,

    /// Whether the server considers processing finished
    pub processing_complete: bool,
}

impl ArtifactStatus {
    pub fn new(metadata_exists: bool, processing_complete: bool) -> Self {
        Self {
            fingerprint: None,
            metadata_exists,
            processing_complete,
        }
    }

    /// The artifact record is the proof that processing happened
    pub fn is_complete(&self) -> bool {
        self.metadata_exists || self.processing_complete
    }
}

// ============================================================================
// Task Status
// ============================================================================

/// Normalized task queue state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskState {
    Queued,
    Running,
    Success,
    Failure,
    Unknown,
}

impl TaskState {
    /// Map a worker status string (`PENDING`, `STARTED`, `SUCCESS`, ...)
    pub fn from_wire(status: &str) -> Self {
        match status.trim().to_ascii_uppercase().as_str() {
            "PENDING" | "RECEIVED" | "QUEUED" => Self::Queued,
            "STARTED" | "RETRY" | "PROGRESS" | "RUNNING" => Self::Running,
            "SUCCESS" => Self::Success,
            "FAILURE" | "REVOKED" => Self::Failure,
            _ => Self::Unknown,
        }
    }
}

/// Response of `GET /{prefix}/status/{task_id}` as sent on the wire
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskStatusResponse {
    pub task_id: String,
    pub status: String,
    #[serde(default)]
    pub result: Option<serde_json::Value>,
    #[serde(default)]
    pub error: Option<String>,
}

/// Normalized task report
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskStatus {
    pub state: TaskState,
    pub error: Option<String>,
}

impl TaskStatus {
    pub fn new(state: TaskState) -> Self {
        Self { state, error: None }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            state: TaskState::Failure,
            error: Some(error.into()),
        }
    }
}

impl From<TaskStatusResponse> for TaskStatus {
    fn from(response: TaskStatusResponse) -> Self {
        Self {
            state: TaskState::from_wire(&response.status),
            error: response.error,
        }
    }
}

// ============================================================================
// Upload
// ============================================================================

/// Response of `POST /{prefix}/upload`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UploadReceipt {
    /// The server answers `""` when it already stored the bundle and
    /// queued nothing; that reads as `None`.
    #[serde(default, deserialize_with = "non_blank")]
    pub task_id: Option<String>,
    #[serde(default, rename = "sha1_hash")]
    pub fingerprint: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub file_count: Option<usize>,
}

fn non_blank<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.filter(|s| !s.trim().is_empty()))
}

// ============================================================================
// Images
// ============================================================================

/// One generated image
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratedImage {
    pub filename: String,
    #[serde(default, rename = "image_url")]
    pub url: Option<String>,
    #[serde(default, rename = "file_size")]
    pub size: Option<u64>,
    /// Seconds since the epoch
    #[serde(default)]
    pub created_time: Option<f64>,
}

/// Response of `GET /{prefix}/images/{fingerprint}`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageListing {
    #[serde(rename = "sha1_hash")]
    pub fingerprint: String,
    pub image_count: usize,
    pub images: Vec<GeneratedImage>,
}

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum RemoteError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Malformed response: {0}")]
    Protocol(String),

    #[error("Unexpected status {status}: {body}")]
    UnexpectedStatus { status: u16, body: String },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Failed to read {path:?} for upload: {source}")]
    ReadItem {
        path: String,
        #[source]
        source: std::io::Error,
    },
}
