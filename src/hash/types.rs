//! Digest value and engine selection types

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

// ============================================================================
// Constants
// ============================================================================

/// Digest length in bytes (160 bits)
pub const DIGEST_LEN: usize = 20;

/// Compression block size in bytes
pub const BLOCK_LEN: usize = 64;

// ============================================================================
// Digest
// ============================================================================

/// A 160-bit SHA-1 digest.
///
/// Used both for per-file content digests and for bundle fingerprints.
/// Renders as 40 lowercase hex characters.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Sha1Digest([u8; DIGEST_LEN]);

impl Sha1Digest {
    pub const fn from_bytes(bytes: [u8; DIGEST_LEN]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; DIGEST_LEN] {
        &self.0
    }

    /// Lowercase hex rendering
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for Sha1Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Sha1Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Sha1Digest({})", self.to_hex())
    }
}

impl FromStr for Sha1Digest {
    type Err = HashError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != DIGEST_LEN * 2 {
            return Err(HashError::InvalidDigest(s.to_string()));
        }
        let mut out = [0u8; DIGEST_LEN];
        hex::decode_to_slice(s, &mut out).map_err(|_| HashError::InvalidDigest(s.to_string()))?;
        Ok(Self(out))
    }
}

impl Serialize for Sha1Digest {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Sha1Digest {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

// ============================================================================
// Engine Selection
// ============================================================================

/// Which implementation computed a digest
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineKind {
    /// CPU SHA instructions via RustCrypto `sha1`
    Accelerated,
    /// Portable software implementation
    Portable,
}

/// Requested engine, resolved once at startup
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnginePreference {
    /// Accelerated when the CPU supports it, portable otherwise
    #[default]
    Auto,
    Accelerated,
    Portable,
}

impl FromStr for EnginePreference {
    type Err = HashError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" | "" => Ok(Self::Auto),
            "accelerated" | "hardware" => Ok(Self::Accelerated),
            "portable" | "software" => Ok(Self::Portable),
            other => Err(HashError::UnknownEngine(other.to_string())),
        }
    }
}

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum HashError {
    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(String),

    #[error("Unknown hash engine: {0}")]
    UnknownEngine(String),

    #[error("Invalid digest: {0:?} (expected 40 hex characters)")]
    InvalidDigest(String),
}
