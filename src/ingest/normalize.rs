//! Driver buffer decoding.
//!
//! Capture buffers arrive in whatever layout the driver negotiated. They are
//! turned into owned `Rgb8` frames here so the rest of the pipeline only ever
//! sees one color layout.

use anyhow::{anyhow, Result};

use crate::frame::{Frame, PixelFormat};

/// Layout of a driver capture buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum WireFormat {
    /// Packed 8-bit RGB (fourcc `RGB3`).
    Rgb3,
    /// Full-size luma plane followed by interleaved half-size CbCr (fourcc `NV12`).
    Nv12,
}

impl WireFormat {
    pub(crate) fn from_fourcc(fourcc: &[u8; 4]) -> Option<Self> {
        match fourcc {
            b"RGB3" => Some(WireFormat::Rgb3),
            b"NV12" => Some(WireFormat::Nv12),
            _ => None,
        }
    }

    /// Bytes one buffer of `width` x `height` occupies.
    fn buffer_len(self, width: u32, height: u32) -> Option<usize> {
        let pixels = (width as usize).checked_mul(height as usize)?;
        match self {
            WireFormat::Rgb3 => pixels.checked_mul(3),
            WireFormat::Nv12 => {
                let chroma_rows = (height as usize).div_ceil(2);
                let chroma_row_bytes = (width as usize).div_ceil(2) * 2;
                pixels.checked_add(chroma_rows.checked_mul(chroma_row_bytes)?)
            }
        }
    }
}

/// Decode one capture buffer into an owned RGB frame.
///
/// Drivers may pad the buffer past the image; trailing bytes are ignored.
pub(crate) fn decode_frame(
    buf: &[u8],
    width: u32,
    height: u32,
    format: WireFormat,
) -> Result<Frame> {
    let needed = format
        .buffer_len(width, height)
        .ok_or_else(|| anyhow!("{}x{} capture buffer size overflows", width, height))?;
    let buf = buf.get(..needed).ok_or_else(|| {
        anyhow!(
            "{:?} capture buffer too short: need {} bytes, got {}",
            format,
            needed,
            buf.len()
        )
    })?;
    let rgb = match format {
        WireFormat::Rgb3 => buf.to_vec(),
        WireFormat::Nv12 => nv12_to_rgb(buf, width as usize, height as usize),
    };
    Frame::new(width, height, PixelFormat::Rgb8, rgb)
}

// BT.601 full-range coefficients in 8.8 fixed point.
const CR_TO_R: i32 = 359;
const CB_TO_G: i32 = 88;
const CR_TO_G: i32 = 183;
const CB_TO_B: i32 = 454;

fn nv12_to_rgb(buf: &[u8], width: usize, height: usize) -> Vec<u8> {
    let (luma, chroma) = buf.split_at(width * height);
    let chroma_row_bytes = width.div_ceil(2) * 2;

    let mut rgb = Vec::with_capacity(width * height * 3);
    for (row, luma_row) in luma.chunks_exact(width).enumerate() {
        let chroma_row = &chroma[(row / 2) * chroma_row_bytes..][..chroma_row_bytes];
        for (col, &y) in luma_row.iter().enumerate() {
            let pair = &chroma_row[(col / 2) * 2..][..2];
            let (cb, cr) = (pair[0] as i32 - 128, pair[1] as i32 - 128);
            let y = y as i32;
            rgb.push(saturate(y + ((CR_TO_R * cr) >> 8)));
            rgb.push(saturate(y - ((CB_TO_G * cb + CR_TO_G * cr) >> 8)));
            rgb.push(saturate(y + ((CB_TO_B * cb) >> 8)));
        }
    }
    rgb
}

fn saturate(value: i32) -> u8 {
    value.clamp(0, 255) as u8
}
