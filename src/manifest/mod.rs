//! Bundle Manifest Module
//!
//! Content-derived identity for a set of files:
//! - Selection: directory walk filtered by an extension allow-list
//! - Canonical manifest: one `path\nsize\nsha1\n` record per file, sorted
//! - Fingerprint: SHA-1 of the manifest text
//!
//! The fingerprint depends only on paths, recorded sizes and content. Two
//! machines selecting the same files always agree on it.

pub mod builder;
pub mod source;
pub mod types;

pub use builder::ManifestBuilder;
pub use source::{scan_directory, ExtensionAllowList, FileItem, ItemSource, MemoryItem};
pub use types::*;
