//! Decoder capabilities: the interchangeable engines that turn a frame into a
//! [`DecodeAttempt`].
//!
//! Each engine wraps the `rqrr` detector differently, mirroring the three
//! vendor pipelines the tool compares:
//!
//! - [`Engine::Metadata`]: metadata-object recognition. Only the first symbol
//!   the detector reports is considered and no confidence is attached.
//! - [`Engine::Vision`]: barcode observation with a confidence score derived
//!   from how well the code's outline is seen.
//! - [`Engine::Ml`]: barcode scanner run on a downscaled frame; like the
//!   metadata engine it only reads the first symbol, unscored.

mod metadata;
mod ml;
mod vision;

pub use metadata::MetadataDecoder;
pub use ml::MlDecoder;
pub use vision::{outline_confidence, VisionDecoder};

use crate::luma::LumaPlane;
use std::time::Instant;

/// Scanning engine selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, clap::ValueEnum)]
pub enum Engine {
    /// Metadata-object recognition (first machine-readable object wins).
    Metadata,
    /// Vision-style barcode detection with a confidence score.
    Vision,
    /// ML-style barcode scanner on a downscaled frame.
    Ml,
}

impl Engine {
    /// All engines, in menu order.
    pub const ALL: [Self; 3] = [Self::Metadata, Self::Vision, Self::Ml];

    /// Stable name used on the command line and in logs.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Metadata => "metadata",
            Self::Vision => "vision",
            Self::Ml => "ml",
        }
    }

    /// Human readable title for result screens.
    #[must_use]
    pub const fn title(self) -> &'static str {
        match self {
            Self::Metadata => "AVFoundation metadata",
            Self::Vision => "Vision barcode detection",
            Self::Ml => "ML Kit barcode scanner",
        }
    }

    /// Platform vendor the engine imitates, used to group the engine list.
    #[must_use]
    pub const fn vendor(self) -> &'static str {
        match self {
            Self::Metadata | Self::Vision => "Apple",
            Self::Ml => "Google",
        }
    }

    /// Confidence an attempt must exceed before a session accepts it.
    ///
    /// Only the vision engine scores its observations; the others accept the
    /// first decode unconditionally.
    #[must_use]
    pub const fn default_min_confidence(self) -> Option<f32> {
        match self {
            Self::Vision => Some(0.9),
            Self::Metadata | Self::Ml => None,
        }
    }
}

impl std::fmt::Display for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// A candidate payload produced by one engine for one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodeAttempt {
    /// Decoded string.
    pub payload: String,
    /// When the frame was decoded.
    pub timestamp: Instant,
    /// Engine confidence in `[0, 1]`, if the engine scores its results.
    pub confidence: Option<f32>,
}

impl DecodeAttempt {
    /// An unscored attempt stamped with the current instant.
    #[must_use]
    pub fn new<S: Into<String>>(payload: S) -> Self {
        Self {
            payload: payload.into(),
            timestamp: Instant::now(),
            confidence: None,
        }
    }

    /// Attach a confidence score, clamped to `[0, 1]`.
    #[must_use]
    pub fn with_confidence(mut self, confidence: f32) -> Self {
        self.confidence = Some(if confidence.is_nan() {
            0.0
        } else {
            confidence.clamp(0.0, 1.0)
        });
        self
    }
}

/// Failure reported by an engine for a single frame.
///
/// Callers log these and carry on; a failed frame is simply a frame without
/// an attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// A symbol was located but its payload could not be read.
    Unreadable(String),
    /// The frame had no pixels.
    EmptyFrame,
}

impl std::fmt::Display for DecodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unreadable(msg) => write!(f, "Symbol unreadable: {msg}"),
            Self::EmptyFrame => write!(f, "Frame has no pixels"),
        }
    }
}

impl std::error::Error for DecodeError {}

/// A scanning engine that may find a payload in a frame.
pub trait DecoderCapability: Send {
    /// Which engine this is.
    fn engine(&self) -> Engine;

    /// Look for a code in `frame`.
    ///
    /// `Ok(None)` means no code was seen.
    fn try_decode(&mut self, frame: &LumaPlane) -> Result<Option<DecodeAttempt>, DecodeError>;
}

impl<D: DecoderCapability + ?Sized> DecoderCapability for Box<D> {
    fn engine(&self) -> Engine {
        (**self).engine()
    }

    fn try_decode(&mut self, frame: &LumaPlane) -> Result<Option<DecodeAttempt>, DecodeError> {
        (**self).try_decode(frame)
    }
}

/// Construct the engine selected by configuration.
#[must_use]
pub fn build(engine: Engine) -> Box<dyn DecoderCapability> {
    match engine {
        Engine::Metadata => Box::new(MetadataDecoder::new()),
        Engine::Vision => Box::new(VisionDecoder::new()),
        Engine::Ml => Box::new(MlDecoder::new()),
    }
}

/// A symbol located by the detector, with its outline in frame pixels.
#[derive(Debug, Clone)]
pub(crate) struct Symbol {
    /// Corners in detector order: top-left, top-right, bottom-right, bottom-left.
    pub corners: [(f32, f32); 4],
    /// Decoded payload or the decoder's complaint.
    pub content: Result<String, String>,
}

/// Run the `rqrr` detector over a plane and decode every grid it finds, in
/// detection order.
#[allow(clippy::cast_precision_loss)]
pub(crate) fn detect_symbols(frame: &LumaPlane) -> Result<Vec<Symbol>, DecodeError> {
    if frame.is_empty() {
        return Err(DecodeError::EmptyFrame);
    }

    let width = frame.width() as usize;
    let data = frame.as_bytes();
    let mut prepared =
        rqrr::PreparedImage::prepare_from_greyscale(width, frame.height() as usize, |x, y| {
            data.get(y * width + x).copied().unwrap_or(0)
        });

    let symbols = prepared
        .detect_grids()
        .iter()
        .map(|grid| Symbol {
            corners: grid.bounds.map(|p| (p.x as f32, p.y as f32)),
            content: grid
                .decode()
                .map(|(_meta, content)| content)
                .map_err(|err| err.to_string()),
        })
        .collect();

    Ok(symbols)
}

/// Payload of the first symbol, ignoring any that follow it.
///
/// An unreadable first symbol fails the frame even if a later one decodes.
pub(crate) fn first_payload(symbols: Vec<Symbol>) -> Result<Option<String>, DecodeError> {
    symbols
        .into_iter()
        .next()
        .map(|symbol| symbol.content.map_err(DecodeError::Unreadable))
        .transpose()
}
