//! Shared startup for the binaries.
//!
//! Order matters: the source is opened first, so an unavailable camera fails
//! before any window appears.

use anyhow::{Context, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::config::PipelineConfig;
use crate::display::DisplaySink;
use crate::filter::{CpuLibrary, StageRegistry};
use crate::ingest::open_source;
use crate::mode::KeyBindings;
use crate::pipeline::{PipelineLoop, RunSummary};

/// How a binary drives the loop.
#[derive(Clone, Debug)]
pub struct Profile {
    pub window_name: &'static str,
    pub mirror: bool,
    pub bindings: KeyBindings,
}

impl Profile {
    /// `camera_filters`: mirrored, all four stages on P/B/F/C.
    pub fn filters() -> Self {
        Self {
            window_name: "Camera Filters",
            mirror: true,
            bindings: KeyBindings::filters(),
        }
    }

    /// `camera_preview`: raw frames, Esc quits.
    pub fn preview() -> Self {
        Self {
            window_name: "Camera Preview",
            mirror: false,
            bindings: KeyBindings::preview_only(),
        }
    }

    pub fn config(&self, source: Option<&str>) -> Result<PipelineConfig> {
        let mut config = PipelineConfig::from_source_arg(source)?;
        config.window_name = self.window_name.to_string();
        config.mirror = self.mirror;
        Ok(config)
    }
}

/// Install a Ctrl-C handler that raises the returned flag.
pub fn install_interrupt_flag() -> Result<Arc<AtomicBool>> {
    let flag = Arc::new(AtomicBool::new(false));
    let handler_flag = Arc::clone(&flag);
    ctrlc::set_handler(move || {
        handler_flag.store(true, Ordering::SeqCst);
    })
    .context("install Ctrl-C handler")?;
    Ok(flag)
}

/// Open the configured source, then build the sink with `make_sink` and run
/// until the loop stops.
pub fn launch<D, F>(
    config: &PipelineConfig,
    profile: &Profile,
    make_sink: F,
    shutdown: Option<Arc<AtomicBool>>,
) -> Result<RunSummary>
where
    D: DisplaySink,
    F: FnOnce(&PipelineConfig) -> D,
{
    let mut source = open_source(&config.source)?;
    let mut sink = make_sink(config);
    let mut registry = StageRegistry::new(&config.stages, CpuLibrary::new());
    log::info!(
        "{}: source={} stages={:?}",
        config.window_name,
        source.describe(),
        registry.list()
    );

    let mut pipeline = PipelineLoop::new(&mut source, &mut sink, &mut registry, config)
        .with_bindings(profile.bindings.clone());
    if let Some(flag) = shutdown {
        pipeline = pipeline.with_shutdown_flag(flag);
    }
    pipeline.run()
}

/// The window the binaries present to. Only built with `display-minifb`, so
/// a binary always has a window to take Q/Esc from.
#[cfg(feature = "display-minifb")]
pub fn default_sink(config: &PipelineConfig) -> crate::display::WindowSink {
    crate::display::WindowSink::new(&config.window_name)
}
