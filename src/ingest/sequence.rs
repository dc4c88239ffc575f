//! Image-sequence frame source.
//!
//! Reads numbered still images named by a printf-style pattern such as
//! `images/img_%02d.jpg`. Numbering starts at 0, or at 1 when no file with
//! index 0 exists, and the stream ends at the first missing index. A path
//! without a placeholder is read as a one-frame sequence.

use anyhow::{anyhow, Context, Result};
use std::path::PathBuf;

use crate::frame::Frame;

use super::FrameSource;

/// Widest zero padding accepted in a `%0Nd` placeholder.
const MAX_INDEX_PAD: usize = 20;

/// Parsed `%d` / `%0Nd` placeholder.
#[derive(Clone, Debug, PartialEq, Eq)]
struct IndexPattern {
    prefix: String,
    pad: usize,
    suffix: String,
}

impl IndexPattern {
    /// The first `%` followed by optional digits and `d` is the placeholder;
    /// other `%` signs are literal. `Ok(None)` when there is no placeholder.
    fn parse(pattern: &str) -> Result<Option<Self>> {
        for (start, _) in pattern.match_indices('%') {
            let rest = &pattern[start + 1..];
            let digits = rest.bytes().take_while(|b| b.is_ascii_digit()).count();
            let Some(suffix) = rest[digits..].strip_prefix('d') else {
                continue;
            };
            let pad = match &rest[..digits] {
                "" => 0,
                width => width
                    .parse()
                    .ok()
                    .filter(|pad| *pad <= MAX_INDEX_PAD)
                    .ok_or_else(|| {
                        anyhow!(
                            "index padding {} in {} exceeds {} digits",
                            width,
                            pattern,
                            MAX_INDEX_PAD
                        )
                    })?,
            };
            return Ok(Some(Self {
                prefix: pattern[..start].to_string(),
                pad,
                suffix: suffix.to_string(),
            }));
        }
        Ok(None)
    }

    fn path_for(&self, index: u64) -> PathBuf {
        PathBuf::from(format!(
            "{}{:0width$}{}",
            self.prefix,
            index,
            self.suffix,
            width = self.pad
        ))
    }
}

/// True when `pattern` names a numbered sequence. Malformed placeholders
/// count, so opening reports the problem instead of treating the pattern as
/// a video file.
pub(crate) fn has_index_placeholder(pattern: &str) -> bool {
    !matches!(IndexPattern::parse(pattern), Ok(None))
}

enum Frames {
    Numbered { pattern: IndexPattern, next: u64 },
    Single { path: PathBuf, done: bool },
}

/// Reads a sequence of still images from disk.
pub struct ImageSequenceSource {
    spec: String,
    frames: Frames,
    frame_count: u64,
    closed: bool,
}

impl ImageSequenceSource {
    /// Open the sequence. Fails when its first image does not exist.
    pub fn open(spec: &str) -> Result<Self> {
        let frames = match IndexPattern::parse(spec)? {
            Some(pattern) => {
                let first = [0, 1]
                    .into_iter()
                    .find(|i| pattern.path_for(*i).is_file())
                    .ok_or_else(|| {
                        anyhow!(
                            "no image found for index 0 or 1 ({})",
                            pattern.path_for(0).display()
                        )
                    })?;
                Frames::Numbered {
                    pattern,
                    next: first,
                }
            }
            None => {
                let path = PathBuf::from(spec);
                if !path.is_file() {
                    return Err(anyhow!("image not found: {}", path.display()));
                }
                Frames::Single { path, done: false }
            }
        };
        log::info!("ImageSequenceSource: opened {}", spec);
        Ok(Self {
            spec: spec.to_string(),
            frames,
            frame_count: 0,
            closed: false,
        })
    }

    fn next_path(&mut self) -> Option<PathBuf> {
        match &mut self.frames {
            Frames::Numbered { pattern, next } => {
                let path = pattern.path_for(*next);
                if !path.is_file() {
                    return None;
                }
                *next += 1;
                Some(path)
            }
            Frames::Single { path, done } => {
                if *done {
                    return None;
                }
                *done = true;
                Some(path.clone())
            }
        }
    }
}

impl FrameSource for ImageSequenceSource {
    fn describe(&self) -> String {
        format!("image sequence {}", self.spec)
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        if self.closed {
            return Ok(None);
        }
        let Some(path) = self.next_path() else {
            return Ok(None);
        };
        let image = image::open(&path)
            .with_context(|| format!("decode image {}", path.display()))?
            .to_rgb8();
        self.frame_count += 1;
        log::trace!("ImageSequenceSource: read {}", path.display());
        Frame::try_from(image).map(Some)
    }

    fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            log::info!(
                "ImageSequenceSource: closed {} after {} frames",
                self.spec,
                self.frame_count
            );
        }
    }

    fn frames_captured(&self) -> u64 {
        self.frame_count
    }
}

impl Drop for ImageSequenceSource {
    fn drop(&mut self) {
        self.close();
    }
}
