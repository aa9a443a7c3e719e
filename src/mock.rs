//! Test doubles: a camera without hardware and an engine with a script.

use crate::decoder::{DecodeAttempt, DecodeError, DecoderCapability, Engine};
use crate::luma::LumaPlane;
use crate::traits::{
    CameraDevice, CaptureStream, DeviceCapabilities, Format, FourCC, Frame, FrameMetadata, Result,
};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Mock device for testing without hardware.
pub struct MockDevice {
    capabilities: DeviceCapabilities,
    format: Format,
    frame_count: u32,
}

impl Default for MockDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl MockDevice {
    /// Create a new mock device with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self {
            capabilities: DeviceCapabilities {
                driver: "mock".to_owned(),
                card: "Mock Camera".to_owned(),
                bus_info: "mock:0".to_owned(),
                can_capture: true,
                can_stream: true,
            },
            format: Format::new(640, 480, FourCC::YUYV),
            frame_count: 0,
        }
    }

    /// Set the format for this mock device.
    #[must_use]
    pub fn with_format(mut self, format: Format) -> Self {
        self.format = format;
        self
    }

    /// Set the capabilities for this mock device.
    #[must_use]
    pub fn with_capabilities(mut self, capabilities: DeviceCapabilities) -> Self {
        self.capabilities = capabilities;
        self
    }
}

impl CameraDevice for MockDevice {
    type Stream<'a> = MockStream<'a>;

    fn capabilities(&self) -> &DeviceCapabilities {
        &self.capabilities
    }

    fn format(&self) -> Result<Format> {
        Ok(self.format.clone())
    }

    fn set_format(&mut self, format: &Format) -> Result<Format> {
        self.format = format.clone();
        Ok(self.format.clone())
    }

    fn create_stream(&mut self, _buffer_count: u32) -> Result<Self::Stream<'_>> {
        Ok(MockStream {
            device: self,
            pattern: TestPattern::Gradient,
        })
    }
}

/// Test pattern types for mock frame generation.
#[derive(Debug, Clone, Copy)]
pub enum TestPattern {
    /// Horizontal luma gradient from dark to light.
    Gradient,
    /// Uniform luma.
    Solid(u8),
}

/// Mock capture stream for testing.
pub struct MockStream<'a> {
    device: &'a mut MockDevice,
    pattern: TestPattern,
}

impl MockStream<'_> {
    /// Set the test pattern for frame generation.
    #[must_use]
    pub fn with_pattern(mut self, pattern: TestPattern) -> Self {
        self.pattern = pattern;
        self
    }
}

impl CaptureStream for MockStream<'_> {
    fn next_frame(&mut self) -> Result<Frame> {
        let format = &self.device.format;
        let data = generate_test_frame(format, self.pattern);

        let seq = self.device.frame_count;
        self.device.frame_count += 1;

        Ok(Frame {
            data,
            metadata: FrameMetadata {
                sequence: seq,
                timestamp: Duration::from_millis(u64::from(seq) * 33), // ~30fps
                bytes_used: format.size,
            },
        })
    }
}

/// Generate frame bytes in the device's pixel format.
///
/// GREY frames carry luma directly; every other format is filled as YUYV
/// with neutral chroma.
fn generate_test_frame(format: &Format, pattern: TestPattern) -> Vec<u8> {
    let width = format.width;
    #[allow(clippy::cast_possible_truncation)]
    let luma_at = move |x: u32| -> u8 {
        match pattern {
            TestPattern::Gradient => ((x * 255) / width.max(1)) as u8,
            TestPattern::Solid(y) => y,
        }
    };

    if format.fourcc == FourCC::GREY {
        return (0..format.height)
            .flat_map(move |_| (0..width).map(luma_at))
            .collect();
    }

    let mut data = Vec::with_capacity((width * format.height * 2) as usize);
    for _ in 0..format.height {
        for x in 0..width {
            data.push(luma_at(x));
            data.push(128);
        }
    }
    data
}

/// Payload of [`sample_code_plane`].
pub const SAMPLE_PAYLOAD: &str = "4376471154038";

/// Version 1-M numeric code, mask 7. `#` is a dark module.
const SAMPLE_MODULES: [&str; 21] = [
    "#######.....#.#######",
    "#.....#..#....#.....#",
    "#.###.#...##..#.###.#",
    "#.###.#...#...#.###.#",
    "#.###.#..####.#.###.#",
    "#.....#.#.#...#.....#",
    "#######.#.#.#.#######",
    ".........#...........",
    "#..#.##.######.#.....",
    "###.#..##..#.#.#.##..",
    "#..#.####.##..###...#",
    "..#.#..#....#####....",
    "..#...##.#.#.###.##..",
    "........#.#..####.##.",
    "#######...###.#.####.",
    "#.....#.#.....##....#",
    "#.###.#..##.###..#.##",
    "#.###.#.#.#..####..##",
    "#.###.#..###.###.#..#",
    "#.....#..####..##..#.",
    "#######.###..#.###...",
];

/// Light border around the code, in modules.
const QUIET_ZONE: u32 = 4;

/// Render the sample code frontally, `module_px` pixels per module, black on
/// white with a standard quiet zone.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn sample_code_plane(module_px: u32) -> LumaPlane {
    let side = (SAMPLE_MODULES.len() as u32 + 2 * QUIET_ZONE) * module_px;
    let mut data = vec![255; (side * side) as usize];

    for (row, line) in SAMPLE_MODULES.iter().enumerate() {
        for (col, module) in line.bytes().enumerate() {
            if module != b'#' {
                continue;
            }
            let x0 = (col as u32 + QUIET_ZONE) * module_px;
            let y0 = (row as u32 + QUIET_ZONE) * module_px;
            for y in y0..y0 + module_px {
                let start = (y * side + x0) as usize;
                if let Some(pixels) = data.get_mut(start..start + module_px as usize) {
                    pixels.fill(0);
                }
            }
        }
    }

    LumaPlane::new(side, side, data).expect("sample code plane")
}

/// Shared count of `try_decode` calls, readable after the decoder moved.
#[derive(Debug, Clone, Default)]
pub struct CallCounter(Arc<AtomicUsize>);

impl CallCounter {
    /// Calls so far.
    pub fn get(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

type Scripted = std::result::Result<Option<DecodeAttempt>, DecodeError>;

/// Engine that replays a fixed list of outcomes, then finds nothing.
pub struct ScriptedDecoder {
    engine: Engine,
    script: VecDeque<Scripted>,
    calls: CallCounter,
}

impl ScriptedDecoder {
    /// An empty script for `engine`.
    #[must_use]
    pub fn new(engine: Engine) -> Self {
        Self {
            engine,
            script: VecDeque::new(),
            calls: CallCounter::default(),
        }
    }

    /// Next frame has no code.
    #[must_use]
    pub fn then_nothing(mut self) -> Self {
        self.script.push_back(Ok(None));
        self
    }

    /// Next frame decodes to `payload`, unscored.
    #[must_use]
    pub fn then_payload(mut self, payload: &str) -> Self {
        self.script.push_back(Ok(Some(DecodeAttempt::new(payload))));
        self
    }

    /// Next frame decodes to `payload` with `confidence`.
    #[must_use]
    pub fn then_scored(mut self, payload: &str, confidence: f32) -> Self {
        self.script
            .push_back(Ok(Some(DecodeAttempt::new(payload).with_confidence(confidence))));
        self
    }

    /// Next frame fails with `err`.
    #[must_use]
    pub fn then_error(mut self, err: DecodeError) -> Self {
        self.script.push_back(Err(err));
        self
    }

    /// Handle to the call counter.
    #[must_use]
    pub fn calls(&self) -> CallCounter {
        self.calls.clone()
    }
}

impl DecoderCapability for ScriptedDecoder {
    fn engine(&self) -> Engine {
        self.engine
    }

    fn try_decode(&mut self, _frame: &LumaPlane) -> Scripted {
        self.calls.0.fetch_add(1, Ordering::SeqCst);
        self.script.pop_front().unwrap_or(Ok(None))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_device_creation() {
        let device = MockDevice::new();
        assert_eq!(device.capabilities().driver, "mock");
        assert!(device.capabilities().supports_scanning());
    }

    #[test]
    fn test_capture_only_device_cannot_scan() {
        let device = MockDevice::new().with_capabilities(DeviceCapabilities {
            can_capture: true,
            can_stream: false,
            ..DeviceCapabilities::default()
        });
        assert!(!device.capabilities().supports_scanning());
    }

    #[test]
    fn test_mock_device_format() {
        let mut device = MockDevice::new();
        let format = device.format().expect("format should succeed");
        assert_eq!(format.width, 640);
        assert_eq!(format.height, 480);

        let new_format = Format::new(1280, 720, FourCC::GREY);
        let actual = device.set_format(&new_format).expect("set_format should succeed");
        assert_eq!(actual.width, 1280);
        assert_eq!(actual.fourcc, FourCC::GREY);
    }

    #[test]
    fn test_mock_stream_frames_decode_to_luma() {
        let mut device = MockDevice::new().with_format(Format::new(64, 8, FourCC::YUYV));
        let format = device.format().expect("format");
        let mut stream = device.create_stream(4).expect("create_stream should succeed");

        let frame1 = stream.next_frame().expect("next_frame should succeed");
        assert_eq!(frame1.metadata.sequence, 0);
        let frame2 = stream.next_frame().expect("next_frame should succeed");
        assert_eq!(frame2.metadata.sequence, 1);

        let plane = LumaPlane::from_frame(&frame2, &format).expect("luma");
        assert!(plane.get(0, 0).expect("left") < 10);
        assert!(plane.get(63, 7).expect("right") > 240);
    }

    #[test]
    fn test_solid_grey_pattern() {
        let mut device = MockDevice::new().with_format(Format::new(16, 16, FourCC::GREY));
        let format = device.format().expect("format");
        let stream = device.create_stream(1).expect("stream");
        let mut stream = stream.with_pattern(TestPattern::Solid(77));

        let frame = stream.next_frame().expect("frame");
        assert_eq!(frame.data.len(), 256);
        let plane = LumaPlane::from_frame(&frame, &format).expect("luma");
        assert!(plane.as_bytes().iter().all(|&y| y == 77));
    }

    #[test]
    fn test_sample_code_has_quiet_zone_and_finders() {
        let plane = sample_code_plane(4);
        assert_eq!(plane.width(), 29 * 4);
        assert_eq!(plane.get(0, 0), Some(255));
        // Top-left finder's outer ring starts right after the quiet zone
        assert_eq!(plane.get(16, 16), Some(0));
        assert_eq!(plane.get(16 + 4, 16 + 4), Some(255));
        assert_eq!(plane.get(16 + 8, 16 + 8), Some(0));
    }

    #[test]
    fn test_scripted_decoder_replays_then_idles() {
        let mut decoder = ScriptedDecoder::new(Engine::Vision)
            .then_scored("a", 0.5)
            .then_error(DecodeError::EmptyFrame);
        let calls = decoder.calls();
        let plane = LumaPlane::new(1, 1, vec![0]).expect("plane");

        let first = decoder.try_decode(&plane).expect("scripted ok");
        assert_eq!(first.map(|a| a.payload).as_deref(), Some("a"));
        assert!(decoder.try_decode(&plane).is_err());
        assert!(matches!(decoder.try_decode(&plane), Ok(None)));
        assert_eq!(calls.get(), 3);
    }
}
