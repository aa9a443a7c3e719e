//! Scan session configuration.

use crate::decoder::Engine;
use std::time::Duration;

/// Settle delay applied when nothing else is configured.
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_millis(300);

/// Longest settle delay a session accepts.
pub const MAX_SETTLE_DELAY: Duration = Duration::from_secs(60 * 60);

/// Tunables for one scanning session.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanConfig {
    /// Wait between accepting a payload and delivering it.
    pub settle_delay: Duration,
    /// Attempts must report a confidence strictly above this to be accepted.
    /// `None` accepts every non-empty payload.
    pub min_confidence: Option<f32>,
    /// Decode every n-th captured frame (1 decodes all of them).
    pub frame_stride: u32,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            settle_delay: DEFAULT_SETTLE_DELAY,
            min_confidence: None,
            frame_stride: 1,
        }
    }
}

impl ScanConfig {
    /// Defaults for `engine`, including its confidence threshold.
    #[must_use]
    pub fn for_engine(engine: Engine) -> Self {
        Self {
            min_confidence: engine.default_min_confidence(),
            ..Self::default()
        }
    }

    /// Set the settle delay.
    #[must_use]
    pub const fn with_settle_delay(mut self, settle_delay: Duration) -> Self {
        self.settle_delay = settle_delay;
        self
    }

    /// Set or clear the confidence threshold.
    #[must_use]
    pub const fn with_min_confidence(mut self, min_confidence: Option<f32>) -> Self {
        self.min_confidence = min_confidence;
        self
    }

    /// Set the frame sampling stride.
    #[must_use]
    pub const fn with_frame_stride(mut self, frame_stride: u32) -> Self {
        self.frame_stride = frame_stride;
        self
    }

    /// Check that the values make sense.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.settle_delay > MAX_SETTLE_DELAY {
            return Err(ConfigError::SettleDelayTooLong(self.settle_delay));
        }
        if let Some(threshold) = self.min_confidence {
            if !threshold.is_finite() || !(0.0..=1.0).contains(&threshold) {
                return Err(ConfigError::ConfidenceOutOfRange(threshold));
            }
        }
        if self.frame_stride == 0 {
            return Err(ConfigError::ZeroFrameStride);
        }
        Ok(())
    }
}

/// Invalid [`ScanConfig`] value.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// Settle delay above [`MAX_SETTLE_DELAY`].
    SettleDelayTooLong(Duration),
    /// Confidence threshold outside `[0, 1]` or not a number.
    ConfidenceOutOfRange(f32),
    /// A frame stride of zero would never decode anything.
    ZeroFrameStride,
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SettleDelayTooLong(delay) => write!(
                f,
                "Settle delay must be at most {} ms, got {} ms",
                MAX_SETTLE_DELAY.as_millis(),
                delay.as_millis()
            ),
            Self::ConfidenceOutOfRange(value) => {
                write!(f, "Minimum confidence must be within 0..=1, got {value}")
            }
            Self::ZeroFrameStride => write!(f, "Frame stride must be at least 1"),
        }
    }
}

impl std::error::Error for ConfigError {}
