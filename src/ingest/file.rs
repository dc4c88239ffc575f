//! Local video file source.
//!
//! Decoding is delegated to FFmpeg (feature: ingest-file-ffmpeg). Without
//! the feature, opening a video file fails with a clear message; image
//! sequences and stills are handled by `sequence` and need no decoder.

use anyhow::Result;

use super::FrameSource;
#[cfg(feature = "ingest-file-ffmpeg")]
use super::file_ffmpeg::FfmpegFileSource;

/// Configuration for a local file source.
#[derive(Clone, Debug, Default)]
pub struct FileConfig {
    /// Local file path (e.g., "video.avi").
    pub path: String,
}

/// Open a video file for decoding.
pub fn open_file_source(config: FileConfig) -> Result<Box<dyn FrameSource>> {
    if config.path.trim().is_empty() {
        anyhow::bail!("video file path must not be empty");
    }
    #[cfg(feature = "ingest-file-ffmpeg")]
    {
        let mut source = FfmpegFileSource::new(config)?;
        source.connect()?;
        Ok(Box::new(source))
    }
    #[cfg(not(feature = "ingest-file-ffmpeg"))]
    {
        Err(anyhow::anyhow!(
            "video file {} requires the ingest-file-ffmpeg feature",
            config.path
        ))
    }
}
