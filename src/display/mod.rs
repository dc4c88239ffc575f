//! Presentation sinks.
//!
//! A sink shows each processed frame and is polled for at most one key per
//! tick. The bounded wait passed to `poll_key` is the only place the loop
//! suspends, so it also acts as the frame-rate cap.
//!
//! - `WindowSink`: a desktop window (feature: display-minifb)
//! - `HeadlessSink`: no output, for tests and machines without a display

#[cfg(feature = "display-minifb")]
mod window;

use anyhow::{anyhow, Result};
use std::time::Duration;

use crate::frame::{Frame, PixelFormat};
use crate::mode::KeyEvent;

#[cfg(feature = "display-minifb")]
pub use window::WindowSink;

/// Presentation sink trait.
pub trait DisplaySink {
    /// Render a frame. The sink takes ownership and may drop it after drawing.
    fn present(&mut self, frame: Frame) -> Result<()>;

    /// Wait up to `timeout` for a key press.
    fn poll_key(&mut self, timeout: Duration) -> Result<Option<KeyEvent>>;

    /// Release the window. Idempotent.
    fn close(&mut self);
}

impl<D: DisplaySink + ?Sized> DisplaySink for Box<D> {
    fn present(&mut self, frame: Frame) -> Result<()> {
        (**self).present(frame)
    }

    fn poll_key(&mut self, timeout: Duration) -> Result<Option<KeyEvent>> {
        (**self).poll_key(timeout)
    }

    fn close(&mut self) {
        (**self).close()
    }
}

/// Geometry of the most recently presented frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FrameGeometry {
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
}

/// Sink without a window. Frames are counted and dropped; no key is ever
/// pressed, so only end of stream or Ctrl-C stops a loop driving it.
#[derive(Debug, Default)]
pub struct HeadlessSink {
    presented: u64,
    last: Option<FrameGeometry>,
    closed: bool,
}

impl HeadlessSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn frames_presented(&self) -> u64 {
        self.presented
    }

    pub fn last_geometry(&self) -> Option<FrameGeometry> {
        self.last
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

impl DisplaySink for HeadlessSink {
    fn present(&mut self, frame: Frame) -> Result<()> {
        if self.closed {
            return Err(anyhow!("headless sink is closed"));
        }
        self.presented += 1;
        self.last = Some(FrameGeometry {
            width: frame.width(),
            height: frame.height(),
            format: frame.format(),
        });
        Ok(())
    }

    fn poll_key(&mut self, timeout: Duration) -> Result<Option<KeyEvent>> {
        if self.closed {
            return Err(anyhow!("headless sink is closed"));
        }
        std::thread::sleep(timeout);
        Ok(None)
    }

    fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            log::info!("HeadlessSink: closed after {} frames", self.presented);
        }
    }
}

/// Expand a frame to the 0RGB words a window framebuffer expects.
#[cfg_attr(not(feature = "display-minifb"), allow(dead_code))]
pub(crate) fn to_0rgb(frame: &Frame, out: &mut Vec<u32>) {
    out.clear();
    match frame.format() {
        PixelFormat::Rgb8 => out.extend(
            frame
                .as_bytes()
                .chunks_exact(3)
                .map(|px| (px[0] as u32) << 16 | (px[1] as u32) << 8 | px[2] as u32),
        ),
        PixelFormat::Gray8 => out.extend(
            frame
                .as_bytes()
                .iter()
                .map(|&v| (v as u32) << 16 | (v as u32) << 8 | v as u32),
        ),
    }
}
