//! V4L2 camera source using the v4l crate.

use v4l::buffer::Type;
use v4l::io::mmap::Stream;
use v4l::io::traits::CaptureStream as V4lCaptureStream;
use v4l::video::Capture;
use v4l::Device;

use crate::traits::{
    CameraDevice, CameraError, CaptureStream, DeviceCapabilities, Format, FourCC, Frame,
    FrameMetadata, Result,
};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

/// Pixel formats the scanning engines can read, in order of preference.
const SCAN_FORMATS: [FourCC; 2] = [FourCC::YUYV, FourCC::GREY];

/// V4L2 device implementation wrapping the v4l crate.
pub struct V4L2Device {
    device: Device,
    capabilities: DeviceCapabilities,
}

impl V4L2Device {
    /// Open a V4L2 device by index (e.g., 0 for /dev/video0).
    pub fn open(index: u32) -> Result<Self> {
        if !Path::new(&format!("/dev/video{index}")).exists() {
            return Err(CameraError::DeviceNotFound(index));
        }

        let device = Device::new(index as usize)
            .map_err(|err| CameraError::DeviceOpenFailed(err.to_string()))?;

        let caps = device
            .query_caps()
            .map_err(|err| CameraError::DeviceOpenFailed(err.to_string()))?;

        let capabilities = DeviceCapabilities {
            driver: caps.driver,
            card: caps.card,
            bus_info: caps.bus,
            can_capture: caps.capabilities.contains(v4l::capability::Flags::VIDEO_CAPTURE),
            can_stream: caps.capabilities.contains(v4l::capability::Flags::STREAMING),
        };

        debug!(
            index,
            driver = %capabilities.driver,
            card = %capabilities.card,
            "Opened V4L2 device"
        );

        Ok(Self {
            device,
            capabilities,
        })
    }

    /// Open a device and negotiate a frame format the engines can decode.
    ///
    /// Fails when the device cannot capture/stream or the driver only offers
    /// formats without a luma plane (e.g. MJPG only).
    pub fn open_for_scanning(index: u32, width: u32, height: u32) -> Result<(Self, Format)> {
        let mut device = Self::open(index)?;
        if !device.capabilities.supports_scanning() {
            return Err(CameraError::DeviceOpenFailed(format!(
                "{} cannot stream video",
                device.capabilities.card
            )));
        }

        for fourcc in SCAN_FORMATS {
            let requested = Format::new(width, height, fourcc);
            let actual = device.set_format(&requested)?;
            if actual.fourcc == fourcc {
                info!(
                    width = actual.width,
                    height = actual.height,
                    fourcc = %actual.fourcc,
                    "Negotiated scan format"
                );
                return Ok((device, actual));
            }
            debug!(requested = %fourcc, got = %actual.fourcc, "Driver substituted format");
        }

        Err(CameraError::FormatNotSupported(Format::new(
            width,
            height,
            FourCC::YUYV,
        )))
    }
}

fn format_from_v4l(fmt: &v4l::Format) -> Format {
    Format {
        width: fmt.width,
        height: fmt.height,
        fourcc: FourCC::from(fmt.fourcc),
        stride: fmt.stride,
        size: fmt.size,
    }
}

impl CameraDevice for V4L2Device {
    type Stream<'a> = V4L2Stream<'a>;

    fn capabilities(&self) -> &DeviceCapabilities {
        &self.capabilities
    }

    fn format(&self) -> Result<Format> {
        let fmt = self
            .device
            .format()
            .map_err(|err| CameraError::StreamError(err.to_string()))?;

        Ok(format_from_v4l(&fmt))
    }

    fn set_format(&mut self, format: &Format) -> Result<Format> {
        let mut fmt = self
            .device
            .format()
            .map_err(|err| CameraError::StreamError(err.to_string()))?;

        fmt.width = format.width;
        fmt.height = format.height;
        fmt.fourcc = format.fourcc.into();

        let fmt = self
            .device
            .set_format(&fmt)
            .map_err(|err| CameraError::StreamError(err.to_string()))?;

        Ok(format_from_v4l(&fmt))
    }

    fn create_stream(&mut self, buffer_count: u32) -> Result<Self::Stream<'_>> {
        let stream = Stream::with_buffers(&self.device, Type::VideoCapture, buffer_count)
            .map_err(|err| CameraError::StreamError(err.to_string()))?;

        Ok(V4L2Stream { stream })
    }
}

/// V4L2 capture stream wrapping mmap-based streaming.
pub struct V4L2Stream<'a> {
    stream: Stream<'a>,
}

impl CaptureStream for V4L2Stream<'_> {
    fn next_frame(&mut self) -> Result<Frame> {
        let (buf, meta) = self.stream.next().map_err(|err| match err.kind() {
            std::io::ErrorKind::TimedOut | std::io::ErrorKind::WouldBlock => CameraError::Timeout,
            _ => CameraError::StreamError(err.to_string()),
        })?;

        // V4L2 timestamps are non-negative in practice
        #[allow(clippy::cast_sign_loss)]
        let secs = meta.timestamp.sec.max(0) as u64;
        #[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
        let nanos = (meta.timestamp.usec.max(0) as u32).saturating_mul(1000);

        // Only the bytes the driver filled belong to the frame; 0 means "not reported"
        let used = match meta.bytesused as usize {
            0 => buf.len(),
            used => used.min(buf.len()),
        };
        let data = buf.get(..used).unwrap_or(buf).to_vec();

        Ok(Frame {
            data,
            metadata: FrameMetadata {
                sequence: meta.sequence,
                timestamp: Duration::new(secs, nanos),
                bytes_used: meta.bytesused,
            },
        })
    }
}
