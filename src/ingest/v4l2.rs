//! V4L2 camera source.
//!
//! Captures frames from a local device node (e.g. /dev/video0) through
//! memory-mapped buffers. RGB3 is requested; NV12 is accepted and converted
//! when the driver refuses RGB.

use anyhow::{anyhow, Context, Result};
use ouroboros::self_referencing;

use super::normalize::{decode_frame, WireFormat};
use super::FrameSource;
use crate::frame::Frame;

/// Configuration for a V4L2 source.
#[derive(Clone, Debug)]
pub struct V4l2Config {
    /// Device path (e.g., "/dev/video0")
    pub device: String,
    /// Requested frame rate. Zero leaves the driver default.
    pub target_fps: u32,
    /// Preferred frame width.
    pub width: u32,
    /// Preferred frame height.
    pub height: u32,
}

impl Default for V4l2Config {
    fn default() -> Self {
        Self {
            device: "/dev/video0".to_string(),
            target_fps: 30,
            width: 640,
            height: 480,
        }
    }
}

#[self_referencing]
struct DeviceState {
    device: v4l::Device,
    #[borrows(mut device)]
    #[covariant]
    stream: v4l::prelude::MmapStream<'this, v4l::Device>,
}

/// V4L2 device source.
pub struct V4l2Source {
    config: V4l2Config,
    state: Option<DeviceState>,
    frame_count: u64,
    active_width: u32,
    active_height: u32,
    wire_format: WireFormat,
}

impl V4l2Source {
    pub fn new(config: V4l2Config) -> Result<Self> {
        Ok(Self {
            active_width: config.width,
            active_height: config.height,
            config,
            state: None,
            frame_count: 0,
            wire_format: WireFormat::Rgb3,
        })
    }

    /// Open the device, negotiate the format and start streaming.
    pub fn connect(&mut self) -> Result<()> {
        use v4l::buffer::Type;
        use v4l::video::Capture;

        let mut device = v4l::Device::with_path(&self.config.device)
            .with_context(|| format!("open v4l2 device {}", self.config.device))?;
        let mut format = device.format().context("read v4l2 format")?;
        format.width = self.config.width;
        format.height = self.config.height;
        format.fourcc = v4l::FourCC::new(b"RGB3");

        let format = match device.set_format(&format) {
            Ok(format) => format,
            Err(err) => {
                log::warn!(
                    "V4l2Source: failed to set format on {}: {}",
                    self.config.device,
                    err
                );
                device
                    .format()
                    .context("read v4l2 format after set failure")?
            }
        };

        self.wire_format = WireFormat::from_fourcc(&format.fourcc.repr).ok_or_else(|| {
            anyhow!(
                "v4l2 device {} uses unsupported pixel format {}",
                self.config.device,
                String::from_utf8_lossy(&format.fourcc.repr)
            )
        })?;

        if self.config.target_fps > 0 {
            let params = v4l::video::capture::Parameters::with_fps(self.config.target_fps);
            if let Err(err) = device.set_params(&params) {
                log::warn!(
                    "V4l2Source: failed to set fps on {}: {}",
                    self.config.device,
                    err
                );
            }
        }

        self.active_width = format.width;
        self.active_height = format.height;

        let state = DeviceStateBuilder {
            device,
            stream_builder: |device| {
                v4l::prelude::MmapStream::with_buffers(device, Type::VideoCapture, 4)
                    .map_err(|err| anyhow::Error::new(err).context("create v4l2 buffer stream"))
            },
        }
        .try_build()?;
        self.state = Some(state);

        log::info!(
            "V4l2Source: connected to {} ({}x{}, {:?})",
            self.config.device,
            self.active_width,
            self.active_height,
            self.wire_format
        );
        Ok(())
    }
}

impl FrameSource for V4l2Source {
    fn describe(&self) -> String {
        format!("v4l2 {}", self.config.device)
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        use v4l::io::traits::CaptureStream;

        let Some(state) = self.state.as_mut() else {
            return Ok(None);
        };
        let (buf, _meta) = state
            .with_mut(|fields| fields.stream.next())
            .context("capture v4l2 frame")?;
        let frame = decode_frame(buf, self.active_width, self.active_height, self.wire_format)?;
        self.frame_count += 1;
        Ok(Some(frame))
    }

    fn close(&mut self) {
        if self.state.take().is_some() {
            log::info!(
                "V4l2Source: released {} after {} frames",
                self.config.device,
                self.frame_count
            );
        }
    }

    fn frames_captured(&self) -> u64 {
        self.frame_count
    }
}

impl Drop for V4l2Source {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_device_fails_to_connect() -> Result<()> {
        let mut source = V4l2Source::new(V4l2Config {
            device: "/dev/video-does-not-exist".to_string(),
            ..V4l2Config::default()
        })?;
        assert!(source.connect().is_err());
        Ok(())
    }

    #[test]
    fn unconnected_source_reports_end_of_stream() -> Result<()> {
        let mut source = V4l2Source::new(V4l2Config::default())?;
        assert!(source.next_frame()?.is_none());
        source.close();
        Ok(())
    }
}
