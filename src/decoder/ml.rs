//! ML-style barcode scanner engine.

use super::{detect_symbols, first_payload, DecodeAttempt, DecodeError, DecoderCapability, Engine};
use crate::luma::LumaPlane;
use tracing::trace;

/// Longest edge the scanner works at. Codes held up to a camera are large
/// enough to survive the downscale.
pub const DEFAULT_MAX_DIMENSION: u32 = 640;

/// Scans a downscaled copy of the frame and reports the first barcode found,
/// unscored. Later barcodes are never consulted, even when the first one
/// cannot be read.
#[derive(Debug)]
pub struct MlDecoder {
    max_dimension: u32,
}

impl Default for MlDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl MlDecoder {
    /// Create the engine with the default working resolution.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            max_dimension: DEFAULT_MAX_DIMENSION,
        }
    }

    /// Create the engine with a custom working resolution (0 disables downscaling).
    #[must_use]
    pub const fn with_max_dimension(max_dimension: u32) -> Self {
        Self { max_dimension }
    }
}

impl DecoderCapability for MlDecoder {
    fn engine(&self) -> Engine {
        Engine::Ml
    }

    fn try_decode(&mut self, frame: &LumaPlane) -> Result<Option<DecodeAttempt>, DecodeError> {
        let (scaled, scale) = frame.downscaled(self.max_dimension);
        trace!(
            width = scaled.width(),
            height = scaled.height(),
            scale,
            "Prepared scanner input"
        );

        let payload = first_payload(detect_symbols(&scaled)?)?;
        Ok(payload.map(DecodeAttempt::new))
    }
}
