//! A capture stream backed by a still image.

use crate::luma::LumaPlane;
use crate::traits::{CaptureStream, Format, FourCC, Frame, FrameMetadata, Result};
use std::path::Path;
use std::thread;
use std::time::{Duration, Instant};
use tracing::debug;

/// Default pacing, roughly 30 frames per second.
pub const DEFAULT_FRAME_INTERVAL: Duration = Duration::from_millis(33);

/// Replays one greyscale image as an endless GREY stream, paced like a camera.
#[derive(Debug)]
pub struct StillImageStream {
    plane: LumaPlane,
    format: Format,
    interval: Duration,
    sequence: u32,
    started: Instant,
    last_frame: Option<Instant>,
}

impl StillImageStream {
    /// Load an image file (PNG, JPEG, GIF, BMP) and convert it to greyscale.
    pub fn open(path: &Path) -> Result<Self> {
        let image = image::open(path)?.to_luma8();
        debug!(
            path = %path.display(),
            width = image.width(),
            height = image.height(),
            "Loaded still image"
        );
        Ok(Self::from_plane(LumaPlane::from_image(image)))
    }

    /// Stream an existing plane.
    #[must_use]
    pub fn from_plane(plane: LumaPlane) -> Self {
        let format = Format::new(plane.width(), plane.height(), FourCC::GREY);
        Self {
            plane,
            format,
            interval: DEFAULT_FRAME_INTERVAL,
            sequence: 0,
            started: Instant::now(),
            last_frame: None,
        }
    }

    /// Change the pacing between frames.
    #[must_use]
    pub const fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// The stream's frame format (always GREY, tightly packed).
    #[must_use]
    pub const fn format(&self) -> &Format {
        &self.format
    }

    /// The image being replayed.
    #[must_use]
    pub const fn plane(&self) -> &LumaPlane {
        &self.plane
    }
}

impl CaptureStream for StillImageStream {
    fn next_frame(&mut self) -> Result<Frame> {
        if let Some(last) = self.last_frame {
            let due = last + self.interval;
            let now = Instant::now();
            if due > now {
                thread::sleep(due - now);
            }
        }
        self.last_frame = Some(Instant::now());

        let data = self.plane.as_bytes().to_vec();
        let bytes_used = u32::try_from(data.len()).unwrap_or(u32::MAX);
        let sequence = self.sequence;
        self.sequence = self.sequence.wrapping_add(1);

        Ok(Frame {
            data,
            metadata: FrameMetadata {
                sequence,
                timestamp: self.started.elapsed(),
                bytes_used,
            },
        })
    }
}
