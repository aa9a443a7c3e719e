//! Greyscale planes handed to the decoding engines.
//!
//! Every engine works on 8-bit luma. Camera frames are reduced to their Y
//! samples (YUYV) or copied row by row (GREY), with stride padding dropped.

use crate::traits::{CameraError, Format, FourCC, Frame, Result};
use image::GrayImage;

/// A tightly packed 8-bit greyscale image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LumaPlane {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl LumaPlane {
    /// Wrap raw luma bytes. `data` must hold exactly `width * height` samples.
    pub fn new(width: u32, height: u32, data: Vec<u8>) -> Result<Self> {
        let expected = width as usize * height as usize;
        if data.len() != expected {
            return Err(CameraError::StreamError(format!(
                "Luma plane {width}x{height} needs {expected} bytes, got {}",
                data.len()
            )));
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    /// Extract the luma plane from a captured frame.
    pub fn from_frame(frame: &Frame, format: &Format) -> Result<Self> {
        let bytes_per_pixel: usize = match format.fourcc {
            FourCC::YUYV => 2,
            FourCC::GREY => 1,
            _ => return Err(CameraError::FormatNotSupported(format.clone())),
        };

        let width = format.width as usize;
        let height = format.height as usize;
        let stride = (format.stride as usize).max(width * bytes_per_pixel);

        let needed = stride * height.saturating_sub(1) + width * bytes_per_pixel;
        if height > 0 && frame.data.len() < needed {
            return Err(CameraError::StreamError(format!(
                "Frame {} too short: {} bytes for {}x{} {}",
                frame.metadata.sequence,
                frame.data.len(),
                format.width,
                format.height,
                format.fourcc
            )));
        }

        let mut data = Vec::with_capacity(width * height);
        for row in frame.data.chunks(stride).take(height) {
            let row = row.get(..width * bytes_per_pixel).ok_or_else(|| {
                CameraError::StreamError(format!(
                    "Frame {} has a truncated row",
                    frame.metadata.sequence
                ))
            })?;
            // YUYV: [Y0 U Y1 V], luma sits on every even byte
            data.extend(row.iter().step_by(bytes_per_pixel));
        }

        Self::new(format.width, format.height, data)
    }

    /// Build a plane from a decoded still image.
    #[must_use]
    pub fn from_image(image: GrayImage) -> Self {
        let (width, height) = image.dimensions();
        Self {
            width,
            height,
            data: image.into_raw(),
        }
    }

    /// Width in pixels.
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.width
    }

    /// Height in pixels.
    #[must_use]
    pub const fn height(&self) -> u32 {
        self.height
    }

    /// Whether the plane has no pixels.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Raw luma samples, row-major.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Luma value at (x, y), or `None` outside the plane.
    #[must_use]
    pub fn get(&self, x: u32, y: u32) -> Option<u8> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.data
            .get(y as usize * self.width as usize + x as usize)
            .copied()
    }

    /// Downscale so that neither side exceeds `max_dimension`.
    ///
    /// Returns the plane and the factor that maps downscaled coordinates back
    /// to the original (`1.0` when no scaling was needed).
    #[must_use]
    #[allow(
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss
    )]
    pub fn downscaled(&self, max_dimension: u32) -> (Self, f32) {
        if max_dimension == 0
            || (self.width <= max_dimension && self.height <= max_dimension)
            || self.is_empty()
        {
            return (self.clone(), 1.0);
        }

        let scale = (self.width as f32 / max_dimension as f32)
            .max(self.height as f32 / max_dimension as f32);
        let dst_width = ((self.width as f32 / scale) as u32).max(1);
        let dst_height = ((self.height as f32 / scale) as u32).max(1);

        let x_ratio = self.width as f32 / dst_width as f32;
        let y_ratio = self.height as f32 / dst_height as f32;
        let max_x = self.width - 1;
        let max_y = self.height - 1;

        let sample = |x: u32, y: u32| f32::from(self.get(x, y).unwrap_or(0));

        let mut data = Vec::with_capacity(dst_width as usize * dst_height as usize);
        for y in 0..dst_height {
            let src_y = y as f32 * y_ratio;
            let y0 = (src_y as u32).min(max_y);
            let y1 = (y0 + 1).min(max_y);
            let y_frac = src_y - y0 as f32;

            for x in 0..dst_width {
                let src_x = x as f32 * x_ratio;
                let x0 = (src_x as u32).min(max_x);
                let x1 = (x0 + 1).min(max_x);
                let x_frac = src_x - x0 as f32;

                let top = sample(x0, y0).mul_add(1.0 - x_frac, sample(x1, y0) * x_frac);
                let bottom = sample(x0, y1).mul_add(1.0 - x_frac, sample(x1, y1) * x_frac);
                let value = top.mul_add(1.0 - y_frac, bottom * y_frac);

                data.push(value.round().clamp(0.0, 255.0) as u8);
            }
        }

        (
            Self {
                width: dst_width,
                height: dst_height,
                data,
            },
            scale,
        )
    }
}
