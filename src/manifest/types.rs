//! Manifest types

use std::fmt::Write as _;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::hash::Sha1Digest;

use super::source::ItemSource;

// ============================================================================
// Items
// ============================================================================

/// One hashed file of a bundle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InputItem {
    /// Entry name within the bundle: the file's base name, exactly as it
    /// is uploaded
    pub relative_path: String,

    /// Size as reported by the selection (not re-measured)
    pub size_bytes: u64,

    /// SHA-1 of the full content
    pub content_digest: Sha1Digest,
}

impl InputItem {
    /// Canonical manifest record: `path\nsize\nhexdigest\n`
    pub fn write_record(&self, out: &mut String) {
        // Writing to a String cannot fail
        let _ = write!(
            out,
            "{}\n{}\n{}\n",
            self.relative_path, self.size_bytes, self.content_digest
        );
    }
}

// ============================================================================
// Bundle
// ============================================================================

/// A content-identified set of files
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bundle {
    /// Items sorted ascending by ordinal entry-name comparison
    pub items: Vec<InputItem>,

    /// SHA-1 of the canonical manifest
    pub fingerprint: Sha1Digest,
}

impl Bundle {
    /// The exact text the fingerprint was computed over
    pub fn canonical_manifest(&self) -> String {
        canonical_manifest(&self.items)
    }

    pub fn item_count(&self) -> usize {
        self.items.len()
    }

    /// Sum of the recorded item sizes
    pub fn total_bytes(&self) -> u64 {
        self.items.iter().map(|item| item.size_bytes).sum()
    }
}

/// Concatenate the canonical records of already-sorted items
pub fn canonical_manifest(items: &[InputItem]) -> String {
    let mut text = String::new();
    for item in items {
        item.write_record(&mut text);
    }
    text
}

/// A bundle together with its sources in manifest order, ready for upload
#[derive(Clone)]
pub struct PreparedBundle {
    pub bundle: Bundle,
    pub sources: Vec<Arc<dyn ItemSource>>,
}

impl PreparedBundle {
    pub fn fingerprint(&self) -> &Sha1Digest {
        &self.bundle.fingerprint
    }
}

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum ManifestError {
    #[error("No eligible files in selection")]
    NoEligibleFiles,

    #[error("Two selected files share the name {name:?}: {first:?} and {second:?}")]
    DuplicatePath {
        name: String,
        first: String,
        second: String,
    },

    #[error("Hashing failed for {path:?}: {source}")]
    Hashing {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to scan {root:?}: {source}")]
    Scan {
        root: String,
        #[source]
        source: walkdir::Error,
    },
}
