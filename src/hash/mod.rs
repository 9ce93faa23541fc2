//! Hash Engine
//!
//! SHA-1 digests for content identity, with two interchangeable engines:
//! - `AcceleratedEngine`: CPU SHA instructions (RustCrypto `sha1`)
//! - `PortableEngine`: pure software, always available
//!
//! The engine is chosen once by `select_engine` and shared behind
//! `Arc<dyn HashEngine>`. Both produce byte-identical output, so callers
//! never need to know which one ran.
//!
//! Digests here identify content; they are not an integrity boundary.

mod accelerated;
mod portable;
mod types;

use std::sync::Arc;

pub use accelerated::AcceleratedEngine;
pub use portable::{PortableEngine, PortableState};
pub use types::*;

/// Incremental hashing context produced by `HashEngine::init`
pub trait HashState: Send {
    /// Append bytes. Chunk boundaries (including empty chunks) never affect
    /// the final digest.
    fn update(&mut self, chunk: &[u8]);

    /// Pad, compress the trailing block(s) and emit the digest
    fn finalize(self: Box<Self>) -> Sha1Digest;
}

/// A SHA-1 implementation
pub trait HashEngine: Send + Sync {
    /// Which implementation this is
    fn kind(&self) -> EngineKind;

    /// Fresh incremental context
    fn init(&self) -> Box<dyn HashState>;

    /// One-shot digest
    fn digest(&self, bytes: &[u8]) -> Sha1Digest {
        let mut state = self.init();
        state.update(bytes);
        state.finalize()
    }
}

/// Resolve an engine preference against the running CPU.
///
/// `Auto` never fails. Asking for `Accelerated` on a CPU without SHA
/// instructions returns `UnsupportedOperation`.
pub fn select_engine(preference: EnginePreference) -> Result<Arc<dyn HashEngine>, HashError> {
    let accelerated = AcceleratedEngine::is_supported();

    let engine: Arc<dyn HashEngine> = match preference {
        EnginePreference::Auto if accelerated => Arc::new(AcceleratedEngine),
        EnginePreference::Auto | EnginePreference::Portable => Arc::new(PortableEngine),
        EnginePreference::Accelerated if accelerated => Arc::new(AcceleratedEngine),
        EnginePreference::Accelerated => {
            return Err(HashError::UnsupportedOperation(
                "CPU does not advertise SHA instructions".to_string(),
            ));
        }
    };

    tracing::debug!(
        preference = ?preference,
        engine = ?engine.kind(),
        "Selected hash engine"
    );

    Ok(engine)
}
