//! Real-time camera filter pipeline.
//!
//! Frames flow through a strictly sequential loop:
//!
//! 1. **Capture**: a `FrameSource` yields the next frame (or end of stream).
//! 2. **Mirror**: the frame is flipped left-right once, before any filter.
//! 3. **Filter**: the stage selected by the `ModeController` transforms it.
//! 4. **Present**: a `DisplaySink` shows the result.
//! 5. **Input**: the sink is polled for a key with a bounded wait, and the
//!    key drives the next mode transition.
//!
//! # Module Structure
//!
//! - `frame`: owned pixel buffers (`Frame`, `PixelFormat`)
//! - `ingest`: frame sources (device, video file, image sequence, stub)
//! - `filter`: stage tags, stage configuration, the filter library seam, the registry
//! - `mode`: key-driven mode state machine
//! - `display`: presentation sinks (window, headless)
//! - `pipeline`: the tick scheduler
//! - `config`: pipeline configuration
//! - `app`: startup shared by the binaries

pub mod app;
pub mod config;
pub mod display;
pub mod filter;
pub mod frame;
pub mod ingest;
pub mod mode;
pub mod pipeline;

pub use config::{PipelineConfig, StageSettings};
#[cfg(feature = "display-minifb")]
pub use display::WindowSink;
pub use display::{DisplaySink, HeadlessSink};
pub use filter::{
    BlurParams, Corner, CpuLibrary, EdgeParams, FeatureParams, FilterFailure, FilterLibrary,
    FilterStage, Rejected, StageKind, StageRegistry,
};
pub use frame::{Frame, PixelFormat};
pub use ingest::{open_source, FrameSource, SourceSpec, SyntheticConfig};
pub use mode::{KeyBindings, KeyEvent, Mode, ModeController, Transition};
pub use pipeline::{PipelineLoop, RunSummary, StopReason, TickReport};

// -------------------- Errors --------------------

/// Fatal pipeline errors.
///
/// Returned inside `anyhow::Error`; callers that care about the category use
/// `err.downcast_ref::<PipelineError>()`. End of stream is not an error and
/// per-frame filter failures are `FilterFailure`, which never escape the loop.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PipelineError {
    /// The frame source could not be opened at startup. No retry.
    SourceUnavailable { source: String, reason: String },
    /// Presenting a frame or polling for input failed.
    SinkFailure {
        operation: &'static str,
        reason: String,
    },
}

impl std::fmt::Display for PipelineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PipelineError::SourceUnavailable { source, reason } => {
                write!(f, "source unavailable: {}: {}", source, reason)
            }
            PipelineError::SinkFailure { operation, reason } => {
                write!(f, "display sink failed during {}: {}", operation, reason)
            }
        }
    }
}

impl std::error::Error for PipelineError {}
