//! The capture loop: frames in, attempts out to a session.

use crate::decoder::{self, DecodeAttempt, DecodeError, DecoderCapability, Engine};
use crate::luma::LumaPlane;
use crate::session::{Phase, ScanSession, Submission};
use crate::traits::{CaptureStream, Format, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Counters for one run of the capture loop.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanSummary {
    /// Frames pulled from the stream.
    pub frames_captured: u64,
    /// Frames handed to the engine.
    pub frames_decoded: u64,
    /// Attempts the engine produced.
    pub attempts: u64,
    /// Attempts the session accepted.
    pub accepted: u64,
    /// Attempts the session discarded.
    pub discarded: u64,
    /// Frames where the engine reported an error.
    pub engine_errors: u64,
}

/// Drives one engine over a capture stream.
pub struct Scanner<D> {
    decoder: D,
    frame_stride: u32,
}

impl<D: DecoderCapability> Scanner<D> {
    /// Decode every `frame_stride`-th frame with `decoder` (0 is treated as 1).
    pub fn new(decoder: D, frame_stride: u32) -> Self {
        Self {
            decoder,
            frame_stride: frame_stride.max(1),
        }
    }

    /// The engine in use.
    pub fn engine(&self) -> Engine {
        self.decoder.engine()
    }

    /// Feed frames from `stream` into `session` until it delivers or `stop`
    /// is raised.
    ///
    /// Engine errors are logged and skipped. Camera errors end the loop.
    /// Decoding pauses while a delivery is pending, since nothing can win
    /// until the session is idle again.
    pub fn run<S>(
        &mut self,
        stream: &mut S,
        format: &Format,
        session: &ScanSession,
        stop: &AtomicBool,
    ) -> Result<ScanSummary>
    where
        S: CaptureStream + ?Sized,
    {
        let engine = self.decoder.engine();
        let stride = u64::from(self.frame_stride);
        let mut summary = ScanSummary::default();
        info!(%engine, stride, "Scanning");

        while !stop.load(Ordering::Acquire) && !session.is_delivered() {
            let frame = stream.next_frame()?;
            summary.frames_captured += 1;

            if (summary.frames_captured - 1) % stride != 0 || session.phase() == Phase::Accepted {
                continue;
            }

            let plane = LumaPlane::from_frame(&frame, format)?;
            summary.frames_decoded += 1;

            match self.decoder.try_decode(&plane) {
                Ok(Some(attempt)) => {
                    summary.attempts += 1;
                    match session.submit(attempt) {
                        Submission::Accepted => summary.accepted += 1,
                        outcome => {
                            debug!(%engine, ?outcome, "Attempt discarded");
                            summary.discarded += 1;
                        }
                    }
                }
                Ok(None) => {}
                Err(err) => {
                    summary.engine_errors += 1;
                    debug!(
                        %engine,
                        sequence = frame.metadata.sequence,
                        error = %err,
                        "Engine failed on frame"
                    );
                }
            }
        }

        info!(
            %engine,
            frames = summary.frames_captured,
            decoded = summary.frames_decoded,
            attempts = summary.attempts,
            "Scan loop finished"
        );
        Ok(summary)
    }
}

/// One engine's answer for a single frame.
#[derive(Debug)]
pub struct EngineReport {
    /// Engine that produced the result.
    pub engine: Engine,
    /// What it found.
    pub outcome: std::result::Result<Option<DecodeAttempt>, DecodeError>,
    /// Time spent decoding.
    pub elapsed: Duration,
}

impl EngineReport {
    /// Whether the attempt would pass `min_confidence` (the engine default
    /// when `None`).
    #[must_use]
    pub fn passes(&self, min_confidence: Option<f32>) -> bool {
        let threshold = min_confidence.or_else(|| self.engine.default_min_confidence());
        match (&self.outcome, threshold) {
            (Ok(Some(attempt)), None) => !attempt.payload.is_empty(),
            (Ok(Some(attempt)), Some(threshold)) => {
                !attempt.payload.is_empty() && attempt.confidence.is_some_and(|c| c > threshold)
            }
            _ => false,
        }
    }
}

/// Run every engine once over the same plane, side by side.
#[must_use]
pub fn compare(plane: &LumaPlane) -> Vec<EngineReport> {
    Engine::ALL
        .iter()
        .map(|&engine| {
            let mut decoder = decoder::build(engine);
            let start = Instant::now();
            let outcome = decoder.try_decode(plane);
            EngineReport {
                engine,
                outcome,
                elapsed: start.elapsed(),
            }
        })
        .collect()
}
