//! Vision-style barcode detection engine with scored observations.

use super::{detect_symbols, DecodeAttempt, DecodeError, DecoderCapability, Engine};
use crate::luma::LumaPlane;
use tracing::trace;

/// Corners closer than this to the frame edge mark a clipped code.
const EDGE_MARGIN: f32 = 2.0;

/// Confidence multiplier for an outline that touches the frame edge.
const CLIPPED_PENALTY: f32 = 0.5;

/// Reports the first observation in the frame together with a confidence.
///
/// The confidence measures how squarely the code is seen: a code facing the
/// camera has equal opposite sides and a square outline and scores close to
/// 1.0, while steep perspective, a partially visible code or an outline
/// clipped by the frame edge scores lower.
#[derive(Debug, Default, Clone, Copy)]
pub struct VisionDecoder;

impl VisionDecoder {
    /// Create the engine.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl DecoderCapability for VisionDecoder {
    fn engine(&self) -> Engine {
        Engine::Vision
    }

    #[allow(clippy::cast_precision_loss)]
    fn try_decode(&mut self, frame: &LumaPlane) -> Result<Option<DecodeAttempt>, DecodeError> {
        let Some(observation) = detect_symbols(frame)?.into_iter().next() else {
            return Ok(None);
        };

        let confidence = outline_confidence(
            &observation.corners,
            frame.width() as f32,
            frame.height() as f32,
        );
        let payload = observation.content.map_err(DecodeError::Unreadable)?;
        trace!(confidence, len = payload.len(), "Barcode observation");

        Ok(Some(DecodeAttempt::new(payload).with_confidence(confidence)))
    }
}

/// Score a detected outline in `[0, 1]`.
///
/// `corners` are in order around the quadrilateral. The score is the product
/// of both opposite-side length ratios and the aspect ratio of the averaged
/// sides, halved when any corner lies within a couple of pixels of (or
/// beyond) the frame edge. Degenerate outlines score 0.
#[must_use]
pub fn outline_confidence(corners: &[(f32, f32); 4], width: f32, height: f32) -> f32 {
    let [a, b, c, d] = *corners;
    let sides = [distance(a, b), distance(b, c), distance(c, d), distance(d, a)];
    if sides.iter().any(|side| !side.is_finite() || *side <= f32::EPSILON) {
        return 0.0;
    }
    let [top, right, bottom, left] = sides;

    let horizontal = ratio(top, bottom);
    let vertical = ratio(right, left);
    let aspect = ratio((top + bottom) / 2.0, (right + left) / 2.0);

    let clipped = corners.iter().any(|&(x, y)| {
        x < EDGE_MARGIN || y < EDGE_MARGIN || x > width - EDGE_MARGIN || y > height - EDGE_MARGIN
    });

    let score = horizontal * vertical * aspect;
    let score = if clipped { score * CLIPPED_PENALTY } else { score };
    score.clamp(0.0, 1.0)
}

fn distance((x0, y0): (f32, f32), (x1, y1): (f32, f32)) -> f32 {
    (x1 - x0).hypot(y1 - y0)
}

fn ratio(a: f32, b: f32) -> f32 {
    a.min(b) / a.max(b)
}
