//! Frame ownership layer.
//!
//! - `Frame`: owned 8-bit pixel buffer with geometry and format.
//! - `PixelFormat`: interleaved RGB or single-channel gray.
//!
//! A frame has exactly one owner at a time. Sources hand it to the pipeline
//! loop, the loop hands it to a filter stage, and the stage hands its output
//! to the display sink. `Frame` deliberately has no `Clone` impl, so two
//! stages can never hold the same buffer:
//!
//! ```compile_fail
//! use frame_pipeline::{Frame, PixelFormat};
//!
//! let frame = Frame::new(1, 1, PixelFormat::Gray8, vec![0]).unwrap();
//! let copy = frame.clone();
//! ```

use anyhow::{anyhow, Context, Result};
use image::{GrayImage, ImageBuffer, Luma, Rgb, RgbImage};
use serde::{Deserialize, Serialize};

/// Pixel layout of a frame buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PixelFormat {
    /// Three interleaved 8-bit channels.
    Rgb8,
    /// One 8-bit luminance channel.
    Gray8,
}

impl PixelFormat {
    pub fn channels(self) -> usize {
        match self {
            PixelFormat::Rgb8 => 3,
            PixelFormat::Gray8 => 1,
        }
    }
}

// ----------------------------------------------------------------------------
// Frame
// ----------------------------------------------------------------------------

/// One captured image.
///
/// Bytes are readable (sinks need them) but only the owner can mutate them.
/// There is no `Clone`; ownership moves along the pipeline.
#[derive(Debug, PartialEq, Eq)]
pub struct Frame {
    data: Vec<u8>,
    width: u32,
    height: u32,
    format: PixelFormat,
}

impl Frame {
    /// Build a frame, validating that the buffer matches the geometry.
    pub fn new(width: u32, height: u32, format: PixelFormat, data: Vec<u8>) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(anyhow!("frame dimensions must be non-zero ({}x{})", width, height));
        }
        let expected = (width as usize)
            .checked_mul(height as usize)
            .and_then(|v| v.checked_mul(format.channels()))
            .ok_or_else(|| anyhow!("frame dimensions overflow"))?;
        if data.len() != expected {
            return Err(anyhow!(
                "{:?} frame length mismatch: expected {}, got {}",
                format,
                expected,
                data.len()
            ));
        }
        Ok(Self {
            data,
            width,
            height,
            format,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    pub fn channels(&self) -> usize {
        self.format.channels()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }

    /// Flip left-right in place.
    pub fn mirror_horizontal(&mut self) {
        let (width, height) = (self.width, self.height);
        match self.format {
            PixelFormat::Rgb8 => {
                if let Some(mut view) =
                    ImageBuffer::<Rgb<u8>, &mut [u8]>::from_raw(width, height, &mut self.data[..])
                {
                    image::imageops::flip_horizontal_in_place(&mut view);
                }
            }
            PixelFormat::Gray8 => {
                if let Some(mut view) =
                    ImageBuffer::<Luma<u8>, &mut [u8]>::from_raw(width, height, &mut self.data[..])
                {
                    image::imageops::flip_horizontal_in_place(&mut view);
                }
            }
        }
    }

    /// Luminance derivation. Gray frames are copied as-is.
    pub fn to_gray_image(&self) -> Result<GrayImage> {
        match self.format {
            PixelFormat::Gray8 => {
                GrayImage::from_raw(self.width, self.height, self.data.clone())
                    .context("gray frame buffer does not match its geometry")
            }
            PixelFormat::Rgb8 => {
                let view = ImageBuffer::<Rgb<u8>, &[u8]>::from_raw(
                    self.width,
                    self.height,
                    &self.data[..],
                )
                .context("rgb frame buffer does not match its geometry")?;
                Ok(image::imageops::grayscale(&view))
            }
        }
    }

    /// Split interleaved channels into one gray plane per channel.
    pub fn to_planes(&self) -> Result<Vec<GrayImage>> {
        let channels = self.channels();
        (0..channels)
            .map(|c| {
                let plane: Vec<u8> = self.data.iter().skip(c).step_by(channels).copied().collect();
                GrayImage::from_raw(self.width, self.height, plane)
                    .context("channel plane does not match frame geometry")
            })
            .collect()
    }

    /// Interleave gray planes back into a frame of the given format.
    pub fn from_planes(planes: &[GrayImage], format: PixelFormat) -> Result<Self> {
        let channels = format.channels();
        if planes.len() != channels {
            return Err(anyhow!(
                "{:?} needs {} planes, got {}",
                format,
                channels,
                planes.len()
            ));
        }
        let (width, height) = planes[0].dimensions();
        if planes.iter().any(|p| p.dimensions() != (width, height)) {
            return Err(anyhow!("planes have mismatched dimensions"));
        }
        let pixel_count = (width as usize) * (height as usize);
        let mut data = vec![0u8; pixel_count * channels];
        for (c, plane) in planes.iter().enumerate() {
            for (i, value) in plane.as_raw().iter().enumerate() {
                data[i * channels + c] = *value;
            }
        }
        Self::new(width, height, format, data)
    }
}

impl TryFrom<RgbImage> for Frame {
    type Error = anyhow::Error;

    fn try_from(image: RgbImage) -> Result<Self> {
        let (width, height) = image.dimensions();
        Self::new(width, height, PixelFormat::Rgb8, image.into_raw())
    }
}

impl TryFrom<GrayImage> for Frame {
    type Error = anyhow::Error;

    fn try_from(image: GrayImage) -> Result<Self> {
        let (width, height) = image.dimensions();
        Self::new(width, height, PixelFormat::Gray8, image.into_raw())
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
