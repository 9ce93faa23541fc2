//! Accelerated SHA-1
//!
//! Wraps RustCrypto `sha1`, which dispatches to SHA-NI on x86 and the ARMv8
//! SHA extensions on aarch64 at runtime.

use sha1::{Digest, Sha1};

use super::types::{Sha1Digest, DIGEST_LEN};
use super::{EngineKind, HashEngine, HashState};

/// Accelerated engine
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceleratedEngine;

impl AcceleratedEngine {
    /// Whether the CPU has SHA instructions
    pub fn is_supported() -> bool {
        cpu_has_sha_extensions()
    }
}

impl HashEngine for AcceleratedEngine {
    fn kind(&self) -> EngineKind {
        EngineKind::Accelerated
    }

    fn init(&self) -> Box<dyn HashState> {
        Box::new(AcceleratedState(Sha1::new()))
    }
}

struct AcceleratedState(Sha1);

impl HashState for AcceleratedState {
    fn update(&mut self, chunk: &[u8]) {
        Digest::update(&mut self.0, chunk);
    }

    fn finalize(self: Box<Self>) -> Sha1Digest {
        let AcceleratedState(hasher) = *self;
        let mut out = [0u8; DIGEST_LEN];
        out.copy_from_slice(&hasher.finalize());
        Sha1Digest::from_bytes(out)
    }
}

#[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
fn cpu_has_sha_extensions() -> bool {
    std::arch::is_x86_feature_detected!("sha")
        && std::arch::is_x86_feature_detected!("sse2")
        && std::arch::is_x86_feature_detected!("ssse3")
        && std::arch::is_x86_feature_detected!("sse4.1")
}

#[cfg(target_arch = "aarch64")]
fn cpu_has_sha_extensions() -> bool {
    std::arch::is_aarch64_feature_detected!("sha2")
}

#[cfg(not(any(target_arch = "x86", target_arch = "x86_64", target_arch = "aarch64")))]
fn cpu_has_sha_extensions() -> bool {
    false
}
