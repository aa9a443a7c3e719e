//! QR Debugger: compare QR scanning engines on a live camera feed.
//!
//! Frames come from a [`CaptureStream`] (a V4L2 camera or a still image),
//! are reduced to a [`LumaPlane`] and handed to one of the interchangeable
//! [`DecoderCapability`] engines. Their [`DecodeAttempt`]s go to a
//! [`ScanSession`], which accepts the first good one and delivers it once,
//! after a settle delay, on the interaction context.

pub mod config;
pub mod decoder;
pub mod device;
pub mod dispatch;
pub mod luma;
pub mod scanner;
pub mod session;
pub mod still;
pub mod traits;

#[cfg(test)]
pub mod mock;

pub use config::{ConfigError, ScanConfig};
pub use decoder::{DecodeAttempt, DecodeError, DecoderCapability, Engine};
pub use device::V4L2Device;
pub use dispatch::{Executor, Inline, InteractionQueue};
pub use luma::LumaPlane;
pub use scanner::{compare, EngineReport, ScanSummary, Scanner};
pub use session::{Phase, ResultDelivery, ScanSession, SessionError, Submission};
pub use still::StillImageStream;
pub use traits::{
    CameraDevice, CameraError, CaptureStream, DeviceCapabilities, Format, FourCC, Frame,
    FrameMetadata,
};
