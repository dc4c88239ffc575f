//! The tick scheduler.
//!
//! One tick pulls a frame, mirrors it, runs the active stage, presents the
//! result and polls for a key. Nothing overlaps: the loop holds at most one
//! `Frame` at a time and hands it on by value.

use anyhow::{Context, Result};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::config::PipelineConfig;
use crate::display::DisplaySink;
use crate::filter::{FilterFailure, Rejected, StageKind, StageRegistry};
use crate::ingest::FrameSource;
use crate::mode::{KeyBindings, KeyEvent, Mode, ModeController, Transition};
use crate::PipelineError;

/// Why a run ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    EndOfStream,
    UserQuit,
    Interrupted,
}

/// What happened during one tick.
#[derive(Clone, Debug, PartialEq)]
pub struct TickReport {
    /// 1-based tick number.
    pub tick: u64,
    /// Stage that was applied to this tick's frame.
    pub stage: StageKind,
    /// Set when the stage rejected the frame and the unfiltered frame was shown.
    pub filter_failure: Option<FilterFailure>,
    /// Key polled after presenting.
    pub key: Option<KeyEvent>,
    pub transition: Transition,
}

/// Counters reported when a run ends.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub ticks: u64,
    pub frames_presented: u64,
    pub filter_failures: u64,
    pub stop_reason: StopReason,
}

pub struct PipelineLoop<'a, S: FrameSource + ?Sized, D: DisplaySink + ?Sized> {
    source: &'a mut S,
    sink: &'a mut D,
    registry: &'a mut StageRegistry,
    controller: ModeController,
    poll_timeout: Duration,
    frame_budget: Option<Duration>,
    mirror: bool,
    shutdown: Option<Arc<AtomicBool>>,
    ticks: u64,
    frames_presented: u64,
    filter_failures: u64,
    stop: Option<StopReason>,
}

impl<'a, S: FrameSource + ?Sized, D: DisplaySink + ?Sized> PipelineLoop<'a, S, D> {
    pub fn new(
        source: &'a mut S,
        sink: &'a mut D,
        registry: &'a mut StageRegistry,
        config: &PipelineConfig,
    ) -> Self {
        Self {
            source,
            sink,
            registry,
            controller: ModeController::new(),
            poll_timeout: config.poll_timeout,
            frame_budget: config.frame_budget(),
            mirror: config.mirror,
            shutdown: None,
            ticks: 0,
            frames_presented: 0,
            filter_failures: 0,
            stop: None,
        }
    }

    /// Replace the key table. The loop still starts in Preview.
    pub fn with_bindings(mut self, bindings: KeyBindings) -> Self {
        self.controller = ModeController::with_bindings(bindings);
        self
    }

    /// Stop at the start of the next tick once `flag` is set.
    pub fn with_shutdown_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.shutdown = Some(flag);
        self
    }

    pub fn mode(&self) -> Mode {
        self.controller.mode()
    }

    pub fn stop_reason(&self) -> Option<StopReason> {
        self.stop
    }

    pub fn summary(&self) -> RunSummary {
        RunSummary {
            ticks: self.ticks,
            frames_presented: self.frames_presented,
            filter_failures: self.filter_failures,
            stop_reason: self.stop.unwrap_or(StopReason::UserQuit),
        }
    }

    fn halt(&mut self, reason: StopReason) {
        self.controller.terminate();
        if self.stop.is_none() {
            log::info!("pipeline stopping: {:?} after {} ticks", reason, self.ticks);
            self.stop = Some(reason);
        }
    }

    fn interrupted(&self) -> bool {
        self.shutdown
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::SeqCst))
    }

    /// Bounded wait for this tick's key poll.
    fn poll_wait(&self, started: Instant) -> Duration {
        match self.frame_budget {
            Some(budget) => budget
                .saturating_sub(started.elapsed())
                .max(self.poll_timeout),
            None => self.poll_timeout,
        }
    }

    /// Run one tick. `Ok(None)` means the loop has stopped and no frame was
    /// pulled.
    pub fn tick(&mut self) -> Result<Option<TickReport>> {
        if self.stop.is_some() {
            return Ok(None);
        }
        if self.interrupted() {
            self.halt(StopReason::Interrupted);
            return Ok(None);
        }
        let Some(stage) = self.controller.active_stage() else {
            self.halt(StopReason::UserQuit);
            return Ok(None);
        };

        let started = Instant::now();
        let frame = self
            .source
            .next_frame()
            .with_context(|| format!("read frame from {}", self.source.describe()))?;
        let Some(mut frame) = frame else {
            self.halt(StopReason::EndOfStream);
            return Ok(None);
        };
        self.ticks += 1;

        if self.mirror {
            frame.mirror_horizontal();
        }

        let (output, filter_failure) = match self.registry.apply(stage, frame) {
            Ok(output) => (output, None),
            Err(Rejected { failure, frame }) => {
                log::warn!("tick {}: {}; showing unfiltered frame", self.ticks, failure);
                self.filter_failures += 1;
                (frame, Some(failure))
            }
        };

        self.sink.present(output).map_err(|err| sink_failure("present", err))?;
        self.frames_presented += 1;

        let key = self
            .sink
            .poll_key(self.poll_wait(started))
            .map_err(|err| sink_failure("poll_key", err))?;
        let transition = self.controller.handle_key(key);
        if self.controller.is_terminated() {
            self.halt(StopReason::UserQuit);
        }

        log::debug!(
            "tick {}: stage={} key={:?} transition={:?}",
            self.ticks,
            stage,
            key,
            transition
        );
        Ok(Some(TickReport {
            tick: self.ticks,
            stage,
            filter_failure,
            key,
            transition,
        }))
    }

    /// Tick until the loop stops, then release the source and the sink.
    pub fn run(&mut self) -> Result<RunSummary> {
        self.run_observed(|_| {})
    }

    /// Like `run`, calling `on_tick` after every completed tick.
    pub fn run_observed<F: FnMut(&TickReport)>(&mut self, mut on_tick: F) -> Result<RunSummary> {
        log::info!(
            "pipeline starting: source={} library={} mirror={}",
            self.source.describe(),
            self.registry.library_name(),
            self.mirror
        );
        let result = loop {
            match self.tick() {
                Ok(Some(report)) => on_tick(&report),
                Ok(None) => break Ok(()),
                Err(err) => break Err(err),
            }
        };
        self.release();
        result?;
        Ok(self.summary())
    }

    /// Close the source and the sink. Both closes are idempotent.
    pub fn release(&mut self) {
        self.source.close();
        self.sink.close();
    }
}

fn sink_failure(operation: &'static str, err: anyhow::Error) -> anyhow::Error {
    PipelineError::SinkFailure {
        operation,
        reason: format!("{:#}", err),
    }
    .into()
}
