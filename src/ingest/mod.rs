//! Frame sources.
//!
//! This module provides the sources the pipeline can pull frames from:
//! - Camera devices (feature: ingest-v4l2)
//! - Local video files (feature: ingest-file-ffmpeg)
//! - Image sequences such as `images/img_%02d.jpg`, or a single still image
//! - Stub source (`stub://`, testing and demos)
//!
//! Every source yields owned `Frame` values, one per call. End of stream is
//! `Ok(None)`, never an error. Sources only read locally; URL schemes other
//! than `stub://` are rejected.

pub mod file;
#[cfg(feature = "ingest-file-ffmpeg")]
pub(crate) mod file_ffmpeg;
#[cfg(feature = "ingest-v4l2")]
mod normalize;
pub mod sequence;
pub mod synthetic;
#[cfg(feature = "ingest-v4l2")]
pub mod v4l2;

use anyhow::{anyhow, Result};

use crate::frame::Frame;
use crate::PipelineError;

pub use file::FileConfig;
pub use sequence::ImageSequenceSource;
pub use synthetic::{SyntheticConfig, SyntheticSource};
#[cfg(feature = "ingest-v4l2")]
pub use v4l2::{V4l2Config, V4l2Source};

const STILL_IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp"];

/// A sequence of frames.
pub trait FrameSource {
    /// Human-readable identifier (for logs).
    fn describe(&self) -> String;

    /// Pull the next frame. `Ok(None)` signals end of stream.
    fn next_frame(&mut self) -> Result<Option<Frame>>;

    /// Release the underlying device or file. Idempotent; after closing,
    /// `next_frame` reports end of stream.
    fn close(&mut self);

    fn frames_captured(&self) -> u64;
}

impl<S: FrameSource + ?Sized> FrameSource for Box<S> {
    fn describe(&self) -> String {
        (**self).describe()
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        (**self).next_frame()
    }

    fn close(&mut self) {
        (**self).close()
    }

    fn frames_captured(&self) -> u64 {
        (**self).frames_captured()
    }
}

// ----------------------------------------------------------------------------
// Source identifiers
// ----------------------------------------------------------------------------

/// Parsed form of the positional source argument.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SourceSpec {
    /// Camera device index (`/dev/video{index}`).
    Device(u32),
    /// Generated frames (`stub://name?frames=N&width=W&height=H`).
    Synthetic(SyntheticConfig),
    /// printf-style numbered image files, or a single still image.
    ImageSequence(String),
    /// Local video file.
    VideoFile(String),
}

impl SourceSpec {
    pub fn parse(identifier: &str) -> Result<Self> {
        let identifier = identifier.trim();
        if identifier.is_empty() {
            return Err(anyhow!("source identifier must not be empty"));
        }
        if identifier.bytes().all(|b| b.is_ascii_digit()) {
            let index = identifier
                .parse()
                .map_err(|_| anyhow!("device index out of range: {}", identifier))?;
            return Ok(SourceSpec::Device(index));
        }
        if identifier.starts_with("stub://") {
            return Ok(SourceSpec::Synthetic(SyntheticConfig::from_url(identifier)?));
        }
        if identifier.contains("://") {
            return Err(anyhow!(
                "only local sources are supported (no URL schemes): {}",
                identifier
            ));
        }
        if sequence::has_index_placeholder(identifier) || is_still_image(identifier) {
            return Ok(SourceSpec::ImageSequence(identifier.to_string()));
        }
        Ok(SourceSpec::VideoFile(identifier.to_string()))
    }
}

impl std::fmt::Display for SourceSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceSpec::Device(index) => write!(f, "device {}", index),
            SourceSpec::Synthetic(cfg) => write!(f, "stub://{}", cfg.name),
            SourceSpec::ImageSequence(pattern) => write!(f, "image sequence {}", pattern),
            SourceSpec::VideoFile(path) => write!(f, "video file {}", path),
        }
    }
}

fn is_still_image(path: &str) -> bool {
    std::path::Path::new(path)
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            STILL_IMAGE_EXTENSIONS
                .iter()
                .any(|known| ext.eq_ignore_ascii_case(known))
        })
}

/// Open and connect the source named by `spec`.
///
/// Any failure is reported as `PipelineError::SourceUnavailable`.
pub fn open_source(spec: &SourceSpec) -> Result<Box<dyn FrameSource>> {
    open_backend(spec).map_err(|err| {
        PipelineError::SourceUnavailable {
            source: spec.to_string(),
            reason: format!("{:#}", err),
        }
        .into()
    })
}

fn open_backend(spec: &SourceSpec) -> Result<Box<dyn FrameSource>> {
    match spec {
        SourceSpec::Synthetic(cfg) => {
            let mut source = SyntheticSource::new(cfg.clone());
            source.connect()?;
            Ok(Box::new(source))
        }
        SourceSpec::ImageSequence(pattern) => Ok(Box::new(ImageSequenceSource::open(pattern)?)),
        SourceSpec::VideoFile(path) => file::open_file_source(FileConfig { path: path.clone() }),
        SourceSpec::Device(index) => open_device(*index),
    }
}

#[cfg(feature = "ingest-v4l2")]
fn open_device(index: u32) -> Result<Box<dyn FrameSource>> {
    let mut source = V4l2Source::new(V4l2Config {
        device: format!("/dev/video{}", index),
        ..V4l2Config::default()
    })?;
    source.connect()?;
    Ok(Box::new(source))
}

#[cfg(not(feature = "ingest-v4l2"))]
fn open_device(index: u32) -> Result<Box<dyn FrameSource>> {
    Err(anyhow!(
        "camera device {} requires the ingest-v4l2 feature",
        index
    ))
}
