//! Metadata-object recognition engine.

use super::{detect_symbols, first_payload, DecodeAttempt, DecodeError, DecoderCapability, Engine};
use crate::luma::LumaPlane;
use tracing::trace;

/// Reports the first machine-readable object in the frame, unscored.
///
/// Like a metadata output, it never looks past the first object: if that one
/// cannot be read the frame yields an error even when other codes are
/// visible.
#[derive(Debug, Default, Clone, Copy)]
pub struct MetadataDecoder;

impl MetadataDecoder {
    /// Create the engine.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl DecoderCapability for MetadataDecoder {
    fn engine(&self) -> Engine {
        Engine::Metadata
    }

    fn try_decode(&mut self, frame: &LumaPlane) -> Result<Option<DecodeAttempt>, DecodeError> {
        let Some(payload) = first_payload(detect_symbols(frame)?)? else {
            return Ok(None);
        };
        trace!(len = payload.len(), "Metadata object decoded");
        Ok(Some(DecodeAttempt::new(payload)))
    }
}
