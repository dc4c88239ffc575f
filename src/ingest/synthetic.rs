//! Synthetic frame source (`stub://`).
//!
//! Generates deterministic frames for tests and headless demos: a diagonal
//! gradient background with a bright square that slides one step per frame.
//! An optional frame limit turns it into a finite stream.

use anyhow::{anyhow, Result};

use crate::frame::{Frame, PixelFormat};

use super::FrameSource;

const DEFAULT_WIDTH: u32 = 640;
const DEFAULT_HEIGHT: u32 = 480;
/// Largest generated frame (8K UHD).
const MAX_PIXELS: u64 = 7680 * 4320;

/// Configuration for a synthetic source.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SyntheticConfig {
    pub name: String,
    /// Stop after this many frames. `None` runs forever.
    pub frames: Option<u64>,
    pub width: u32,
    pub height: u32,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            name: "synthetic".to_string(),
            frames: None,
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
        }
    }
}

impl SyntheticConfig {
    /// Parse `stub://name?frames=N&width=W&height=H`. All query keys are optional.
    pub fn from_url(url: &str) -> Result<Self> {
        let rest = url
            .strip_prefix("stub://")
            .ok_or_else(|| anyhow!("synthetic source must start with stub://"))?;
        let (name, query) = rest.split_once('?').unwrap_or((rest, ""));
        let mut cfg = Self {
            name: if name.is_empty() {
                "synthetic".to_string()
            } else {
                name.to_string()
            },
            ..Self::default()
        };
        for pair in query.split('&').filter(|p| !p.is_empty()) {
            let (key, value) = pair
                .split_once('=')
                .ok_or_else(|| anyhow!("malformed stub query parameter '{}'", pair))?;
            match key {
                "frames" => cfg.frames = Some(parse_param(key, value)?),
                "width" => cfg.width = parse_param(key, value)?,
                "height" => cfg.height = parse_param(key, value)?,
                other => return Err(anyhow!("unknown stub parameter '{}'", other)),
            }
        }
        if cfg.width == 0 || cfg.height == 0 {
            return Err(anyhow!("stub frame dimensions must be non-zero"));
        }
        if cfg.width as u64 * cfg.height as u64 > MAX_PIXELS {
            return Err(anyhow!(
                "stub frame {}x{} exceeds {} pixels",
                cfg.width,
                cfg.height,
                MAX_PIXELS
            ));
        }
        Ok(cfg)
    }
}

fn parse_param<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .parse()
        .map_err(|_| anyhow!("stub parameter {} is not a valid count: '{}'", key, value))
}

/// Deterministic generated frames.
pub struct SyntheticSource {
    config: SyntheticConfig,
    frame_count: u64,
    connected: bool,
    closed: bool,
}

impl SyntheticSource {
    pub fn new(config: SyntheticConfig) -> Self {
        Self {
            config,
            frame_count: 0,
            connected: false,
            closed: false,
        }
    }

    /// Synthetic sources are always reachable.
    pub fn connect(&mut self) -> Result<()> {
        self.connected = true;
        log::info!(
            "SyntheticSource: connected to stub://{} ({}x{})",
            self.config.name,
            self.config.width,
            self.config.height
        );
        Ok(())
    }

    fn generate_pixels(&self) -> Vec<u8> {
        let (w, h) = (self.config.width as u64, self.config.height as u64);
        let side = (w.min(h) / 4).max(1);
        let travel = w.saturating_sub(side).max(1);
        let left = (self.frame_count * 4) % travel;
        let top = (h - side.min(h)) / 2;

        let mut pixels = Vec::with_capacity((w * h * 3) as usize);
        for y in 0..h {
            for x in 0..w {
                let inside = (left..left + side).contains(&x) && (top..top + side).contains(&y);
                if inside {
                    pixels.extend_from_slice(&[240, 240, 240]);
                } else {
                    let v = ((x + y + self.frame_count) % 128) as u8;
                    pixels.extend_from_slice(&[v, v / 2, 127 - v]);
                }
            }
        }
        pixels
    }
}

impl FrameSource for SyntheticSource {
    fn describe(&self) -> String {
        format!("stub://{}", self.config.name)
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        if self.closed {
            return Ok(None);
        }
        if !self.connected {
            return Err(anyhow!("synthetic source not connected"));
        }
        if self.config.frames.is_some_and(|limit| self.frame_count >= limit) {
            return Ok(None);
        }
        let pixels = self.generate_pixels();
        self.frame_count += 1;
        Frame::new(
            self.config.width,
            self.config.height,
            PixelFormat::Rgb8,
            pixels,
        )
        .map(Some)
    }

    fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            log::info!(
                "SyntheticSource: closed stub://{} after {} frames",
                self.config.name,
                self.frame_count
            );
        }
    }

    fn frames_captured(&self) -> u64 {
        self.frame_count
    }
}

impl Drop for SyntheticSource {
    fn drop(&mut self) {
        self.close();
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn connected(url: &str) -> Result<SyntheticSource> {
        let mut source = SyntheticSource::new(SyntheticConfig::from_url(url)?);
        source.connect()?;
        Ok(source)
    }

    #[test]
    fn parses_query_parameters() -> Result<()> {
        let cfg = SyntheticConfig::from_url("stub://cam?frames=3&width=32&height=24")?;
        assert_eq!(cfg.name, "cam");
        assert_eq!(cfg.frames, Some(3));
        assert_eq!((cfg.width, cfg.height), (32, 24));
        assert!(SyntheticConfig::from_url("stub://cam?fps=3").is_err());
        assert!(SyntheticConfig::from_url("stub://cam?width=0").is_err());
        Ok(())
    }

    #[test]
    fn out_of_range_dimensions_are_rejected() {
        assert!(SyntheticConfig::from_url("stub://x?width=4294967297&height=2").is_err());
        assert!(SyntheticConfig::from_url("stub://x?height=-1").is_err());
        assert!(SyntheticConfig::from_url("stub://x?width=100000&height=100000").is_err());
        assert!(SyntheticConfig::from_url("stub://x?width=7680&height=4320").is_ok());
    }

    #[test]
    fn produces_frames_with_configured_geometry() -> Result<()> {
        let mut source = connected("stub://test?width=64&height=48")?;
        let frame = source.next_frame()?.expect("frame");
        assert_eq!((frame.width(), frame.height()), (64, 48));
        assert_eq!(frame.format(), PixelFormat::Rgb8);
        Ok(())
    }

    #[test]
    fn frame_limit_ends_stream() -> Result<()> {
        let mut source = connected("stub://test?frames=2&width=8&height=8")?;
        assert!(source.next_frame()?.is_some());
        assert!(source.next_frame()?.is_some());
        assert!(source.next_frame()?.is_none());
        assert_eq!(source.frames_captured(), 2);
        Ok(())
    }

    #[test]
    fn frames_are_deterministic_but_change_over_time() -> Result<()> {
        let mut a = connected("stub://a?width=16&height=16")?;
        let mut b = connected("stub://b?width=16&height=16")?;
        let a1 = a.next_frame()?.expect("frame");
        let b1 = b.next_frame()?.expect("frame");
        let a2 = a.next_frame()?.expect("frame");
        assert_eq!(a1, b1);
        assert_ne!(a1, a2);
        Ok(())
    }

    #[test]
    fn close_is_idempotent_and_ends_stream() -> Result<()> {
        let mut source = connected("stub://test?width=8&height=8")?;
        source.close();
        source.close();
        assert!(source.next_frame()?.is_none());
        Ok(())
    }
}
