//! Item sources
//!
//! The selection side of fingerprinting: something that knows a file's
//! relative path and size, and can produce its bytes on demand. Sources
//! are read twice over a bundle's life (once for hashing, once for upload)
//! and never held in memory between reads.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use walkdir::WalkDir;

use super::types::ManifestError;

/// A selected file
#[async_trait]
pub trait ItemSource: Send + Sync {
    /// Path relative to the selection root, `/`-separated
    fn relative_path(&self) -> &str;

    /// Size recorded at selection time
    fn size_bytes(&self) -> u64;

    /// Name sent to the server with the upload. This is also the item's
    /// entry name in the bundle manifest.
    fn file_name(&self) -> &str {
        let path = self.relative_path();
        path.rsplit('/').next().unwrap_or(path)
    }

    /// Full content
    async fn read_all(&self) -> std::io::Result<Vec<u8>>;
}

// ============================================================================
// Filesystem
// ============================================================================

/// A file on local disk
#[derive(Debug, Clone)]
pub struct FileItem {
    path: PathBuf,
    relative_path: String,
    size_bytes: u64,
}

impl FileItem {
    pub fn new(path: PathBuf, relative_path: String, size_bytes: u64) -> Self {
        Self {
            path,
            relative_path,
            size_bytes,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl ItemSource for FileItem {
    fn relative_path(&self) -> &str {
        &self.relative_path
    }

    fn size_bytes(&self) -> u64 {
        self.size_bytes
    }

    async fn read_all(&self) -> std::io::Result<Vec<u8>> {
        tokio::fs::read(&self.path).await
    }
}

// ============================================================================
// In-Memory
// ============================================================================

/// Bytes already in memory
#[derive(Debug, Clone)]
pub struct MemoryItem {
    relative_path: String,
    size_bytes: u64,
    bytes: Vec<u8>,
}

impl MemoryItem {
    pub fn new(relative_path: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        let bytes = bytes.into();
        Self {
            relative_path: relative_path.into(),
            size_bytes: bytes.len() as u64,
            bytes,
        }
    }

    /// Override the recorded size
    pub fn with_size(mut self, size_bytes: u64) -> Self {
        self.size_bytes = size_bytes;
        self
    }
}

#[async_trait]
impl ItemSource for MemoryItem {
    fn relative_path(&self) -> &str {
        &self.relative_path
    }

    fn size_bytes(&self) -> u64 {
        self.size_bytes
    }

    async fn read_all(&self) -> std::io::Result<Vec<u8>> {
        Ok(self.bytes.clone())
    }
}

// ============================================================================
// Selection
// ============================================================================

/// Case-insensitive file extension filter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtensionAllowList {
    extensions: Vec<String>,
}

impl ExtensionAllowList {
    /// Build from extensions with or without a leading dot
    pub fn new<I, S>(extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let extensions = extensions
            .into_iter()
            .map(|ext| ext.as_ref().trim().trim_start_matches('.').to_ascii_lowercase())
            .filter(|ext| !ext.is_empty())
            .map(|ext| format!(".{}", ext))
            .collect();
        Self { extensions }
    }

    /// Parse a comma separated list such as `.csv,.idat`
    pub fn parse(list: &str) -> Self {
        Self::new(list.split(','))
    }

    pub fn allows(&self, file_name: &str) -> bool {
        let name = file_name.to_ascii_lowercase();
        self.extensions.iter().any(|ext| name.ends_with(ext.as_str()))
    }

    pub fn extensions(&self) -> &[String] {
        &self.extensions
    }
}

impl Default for ExtensionAllowList {
    fn default() -> Self {
        Self::new([".csv", ".idat"])
    }
}

/// Walk `root` recursively and return every allowed regular file.
///
/// Order is unspecified; the manifest builder sorts.
pub fn scan_directory(
    root: &Path,
    allow_list: &ExtensionAllowList,
) -> Result<Vec<Arc<dyn ItemSource>>, ManifestError> {
    let mut items: Vec<Arc<dyn ItemSource>> = Vec::new();

    for entry in WalkDir::new(root) {
        let entry = entry.map_err(|source| ManifestError::Scan {
            root: root.display().to_string(),
            source,
        })?;

        if !entry.file_type().is_file() {
            continue;
        }

        let file_name = entry.file_name().to_string_lossy();
        if !allow_list.allows(&file_name) {
            continue;
        }

        let metadata = entry.metadata().map_err(|source| ManifestError::Scan {
            root: root.display().to_string(),
            source,
        })?;

        let relative = entry.path().strip_prefix(root).unwrap_or(entry.path());
        let relative_path = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");

        items.push(Arc::new(FileItem::new(
            entry.path().to_path_buf(),
            relative_path,
            metadata.len(),
        )));
    }

    tracing::debug!(
        root = %root.display(),
        count = items.len(),
        "Scanned selection"
    );

    Ok(items)
}
