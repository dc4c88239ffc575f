//! End-to-end runs of the loop against scripted sources and sinks.

use anyhow::{anyhow, Result};
use image::{GrayImage, Rgb, RgbImage};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use frame_pipeline::{
    Corner, CpuLibrary, DisplaySink, FilterLibrary, Frame, FrameSource, KeyEvent,
    PipelineConfig, PipelineError, PipelineLoop, PixelFormat, StageKind, StageRegistry,
    StageSettings, StopReason, TickReport, Transition,
};

const WIDTH: u32 = 8;
const HEIGHT: u32 = 4;

/// Horizontal gradient whose leftmost column carries the frame number.
fn numbered_frame(n: u64) -> Result<Frame> {
    let mut data = Vec::with_capacity((WIDTH * HEIGHT * 3) as usize);
    for _y in 0..HEIGHT {
        for x in 0..WIDTH {
            let v = (x as u64 * 30 + n) as u8;
            data.extend_from_slice(&[v, v, v]);
        }
    }
    Frame::new(WIDTH, HEIGHT, PixelFormat::Rgb8, data)
}

fn mirrored(n: u64) -> Result<Vec<u8>> {
    let mut frame = numbered_frame(n)?;
    frame.mirror_horizontal();
    Ok(frame.into_bytes())
}

struct ScriptedSource {
    limit: Option<u64>,
    pulls: u64,
    produced: u64,
    closes: u32,
}

impl ScriptedSource {
    fn finite(frames: u64) -> Self {
        Self {
            limit: Some(frames),
            pulls: 0,
            produced: 0,
            closes: 0,
        }
    }

    fn endless() -> Self {
        Self {
            limit: None,
            ..Self::finite(0)
        }
    }
}

impl FrameSource for ScriptedSource {
    fn describe(&self) -> String {
        "scripted".to_string()
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        self.pulls += 1;
        if self.closes > 0 || self.limit.is_some_and(|limit| self.produced >= limit) {
            return Ok(None);
        }
        self.produced += 1;
        numbered_frame(self.produced).map(Some)
    }

    fn close(&mut self) {
        self.closes += 1;
    }

    fn frames_captured(&self) -> u64 {
        self.produced
    }
}

/// Records presented frames and answers polls from a key script indexed by
/// poll number (1-based).
#[derive(Default)]
struct ScriptedSink {
    keys: HashMap<u64, KeyEvent>,
    presented: Vec<Frame>,
    polls: u64,
    fail_present_at: Option<usize>,
    closes: u32,
}

impl ScriptedSink {
    fn with_keys(keys: &[(u64, char)]) -> Self {
        Self {
            keys: keys
                .iter()
                .map(|(poll, c)| (*poll, KeyEvent::char(*c)))
                .collect(),
            ..Self::default()
        }
    }
}

impl DisplaySink for ScriptedSink {
    fn present(&mut self, frame: Frame) -> Result<()> {
        if self.fail_present_at == Some(self.presented.len() + 1) {
            return Err(anyhow!("display lost"));
        }
        self.presented.push(frame);
        Ok(())
    }

    fn poll_key(&mut self, _timeout: Duration) -> Result<Option<KeyEvent>> {
        self.polls += 1;
        Ok(self.keys.get(&self.polls).copied())
    }

    fn close(&mut self) {
        self.closes += 1;
    }
}

/// CPU library whose blur refuses the frame numbered `fail_on`.
struct FlakyBlur {
    inner: CpuLibrary,
    fail_on: u8,
}

impl FilterLibrary for FlakyBlur {
    fn name(&self) -> &'static str {
        "flaky-blur"
    }

    fn box_blur(&mut self, plane: &GrayImage, kernel_size: u32) -> Result<GrayImage> {
        // Mirroring moves the numbered column to the right edge.
        if plane.get_pixel(plane.width() - 1, 0)[0] == self.fail_on {
            return Err(anyhow!("blur buffer exhausted"));
        }
        self.inner.box_blur(plane, kernel_size)
    }

    fn corner_responses(&mut self, gray: &GrayImage, block_size: u32) -> Result<Vec<Corner>> {
        self.inner.corner_responses(gray, block_size)
    }

    fn canny(&mut self, gray: &GrayImage, low: f32, high: f32) -> Result<GrayImage> {
        self.inner.canny(gray, low, high)
    }

    fn draw_hollow_circle(
        &mut self,
        canvas: &mut RgbImage,
        center: (i32, i32),
        radius: i32,
        color: Rgb<u8>,
    ) -> Result<()> {
        self.inner.draw_hollow_circle(canvas, center, radius, color)
    }
}

fn config() -> Result<PipelineConfig> {
    PipelineConfig::from_source_arg(Some("stub://scripted"))
}

fn cpu_registry() -> StageRegistry {
    StageRegistry::new(&StageSettings::default(), CpuLibrary::new())
}

fn run_collecting(
    source: &mut ScriptedSource,
    sink: &mut ScriptedSink,
    registry: &mut StageRegistry,
) -> Result<(frame_pipeline::RunSummary, Vec<TickReport>)> {
    let mut reports = Vec::new();
    let summary = PipelineLoop::new(source, sink, registry, &config()?)
        .run_observed(|report| reports.push(report.clone()))?;
    Ok((summary, reports))
}

#[test]
fn finite_source_without_keys_previews_every_frame() -> Result<()> {
    let mut source = ScriptedSource::finite(3);
    let mut sink = ScriptedSink::default();
    let mut registry = cpu_registry();

    let (summary, reports) = run_collecting(&mut source, &mut sink, &mut registry)?;

    assert_eq!(summary.ticks, 3);
    assert_eq!(summary.frames_presented, 3);
    assert_eq!(summary.stop_reason, StopReason::EndOfStream);
    assert!(reports.iter().all(|r| r.stage == StageKind::Preview));
    for (n, frame) in (1..=3).zip(&sink.presented) {
        assert_eq!(frame.as_bytes(), &mirrored(n)?[..]);
    }
    assert_eq!(source.closes, 1);
    assert_eq!(sink.closes, 1);
    Ok(())
}

#[test]
fn feature_key_switches_until_quit() -> Result<()> {
    let mut source = ScriptedSource::endless();
    let mut sink = ScriptedSink::with_keys(&[(1, 'F'), (5, 'Q')]);
    let mut registry = cpu_registry();

    let (summary, reports) = run_collecting(&mut source, &mut sink, &mut registry)?;

    let stages: Vec<StageKind> = reports.iter().map(|r| r.stage).collect();
    assert_eq!(
        stages,
        vec![
            StageKind::Preview,
            StageKind::Features,
            StageKind::Features,
            StageKind::Features,
            StageKind::Features,
        ]
    );
    assert_eq!(
        reports[0].transition,
        Transition::Switched {
            from: StageKind::Preview,
            to: StageKind::Features
        }
    );
    assert_eq!(reports[4].transition, Transition::Terminated);
    assert_eq!(summary.stop_reason, StopReason::UserQuit);
    assert_eq!(source.pulls, 5);
    Ok(())
}

#[test]
fn filter_failure_shows_mirrored_input_and_keeps_stage() -> Result<()> {
    let mut source = ScriptedSource::finite(5);
    let mut sink = ScriptedSink::with_keys(&[(1, 'b')]);
    let mut registry = StageRegistry::new(
        &StageSettings::default(),
        FlakyBlur {
            inner: CpuLibrary::new(),
            fail_on: 3,
        },
    );

    let (summary, reports) = run_collecting(&mut source, &mut sink, &mut registry)?;

    assert_eq!(summary.ticks, 5);
    assert_eq!(summary.filter_failures, 1);
    let failure = reports[2].filter_failure.as_ref().expect("tick 3 failure");
    assert_eq!(failure.stage, StageKind::Blur);
    assert!(failure.reason.contains("blur buffer exhausted"));
    assert_eq!(sink.presented[2].as_bytes(), &mirrored(3)?[..]);

    assert_eq!(reports[3].stage, StageKind::Blur);
    assert!(reports[3].filter_failure.is_none());
    assert_ne!(sink.presented[3].as_bytes(), &mirrored(4)?[..]);
    Ok(())
}

#[test]
fn unknown_keys_do_not_change_stage() -> Result<()> {
    let mut source = ScriptedSource::finite(4);
    let mut sink = ScriptedSink::with_keys(&[(1, 'x'), (2, 'z'), (3, '7')]);
    let mut registry = cpu_registry();

    let (_, reports) = run_collecting(&mut source, &mut sink, &mut registry)?;

    assert!(reports.iter().all(|r| r.stage == StageKind::Preview));
    assert!(reports.iter().all(|r| r.transition == Transition::Unchanged));
    Ok(())
}

#[test]
fn returning_to_preview_forgets_blur() -> Result<()> {
    let mut source = ScriptedSource::finite(3);
    let mut sink = ScriptedSink::with_keys(&[(1, 'b'), (2, 'p')]);
    let mut registry = cpu_registry();

    let (_, reports) = run_collecting(&mut source, &mut sink, &mut registry)?;

    assert_eq!(reports[2].stage, StageKind::Preview);
    assert_eq!(sink.presented[2].as_bytes(), &mirrored(3)?[..]);
    Ok(())
}

#[test]
fn edges_change_channel_count() -> Result<()> {
    let mut source = ScriptedSource::finite(2);
    let mut sink = ScriptedSink::with_keys(&[(1, 'c')]);
    let mut registry = cpu_registry();

    run_collecting(&mut source, &mut sink, &mut registry)?;

    assert_eq!(sink.presented[0].format(), PixelFormat::Rgb8);
    assert_eq!(sink.presented[1].format(), PixelFormat::Gray8);
    assert_eq!(
        (sink.presented[1].width(), sink.presented[1].height()),
        (WIDTH, HEIGHT)
    );
    Ok(())
}

#[test]
fn sink_failure_is_fatal_and_releases_the_source() -> Result<()> {
    let mut source = ScriptedSource::endless();
    let mut sink = ScriptedSink {
        fail_present_at: Some(2),
        ..ScriptedSink::default()
    };
    let mut registry = cpu_registry();

    let err = match PipelineLoop::new(&mut source, &mut sink, &mut registry, &config()?).run() {
        Ok(summary) => panic!("run should fail, got {:?}", summary),
        Err(err) => err,
    };

    assert!(matches!(
        err.downcast_ref::<PipelineError>(),
        Some(PipelineError::SinkFailure {
            operation: "present",
            ..
        })
    ));
    assert_eq!(source.pulls, 2);
    assert_eq!(source.closes, 1);
    assert_eq!(sink.closes, 1);
    Ok(())
}

#[test]
fn interrupt_flag_stops_within_one_tick() -> Result<()> {
    let mut source = ScriptedSource::endless();
    let mut sink = ScriptedSink::default();
    let mut registry = cpu_registry();
    let flag = Arc::new(AtomicBool::new(false));
    let observer_flag = Arc::clone(&flag);

    let summary = PipelineLoop::new(&mut source, &mut sink, &mut registry, &config()?)
        .with_shutdown_flag(flag)
        .run_observed(|report| {
            if report.tick == 2 {
                observer_flag.store(true, Ordering::SeqCst);
            }
        })?;

    assert_eq!(summary.ticks, 2);
    assert_eq!(summary.stop_reason, StopReason::Interrupted);
    assert_eq!(source.pulls, 2);
    assert_eq!(source.closes, 1);
    Ok(())
}

#[test]
fn mirror_can_be_disabled() -> Result<()> {
    let mut source = ScriptedSource::finite(1);
    let mut sink = ScriptedSink::default();
    let mut registry = cpu_registry();
    let mut cfg = config()?;
    cfg.mirror = false;

    PipelineLoop::new(&mut source, &mut sink, &mut registry, &cfg).run()?;

    assert_eq!(sink.presented[0].as_bytes(), numbered_frame(1)?.as_bytes());
    Ok(())
}
