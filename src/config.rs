use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use crate::filter::{BlurParams, EdgeParams, FeatureParams};
use crate::ingest::SourceSpec;

const DEFAULT_SOURCE: &str = "0";
const DEFAULT_WINDOW_NAME: &str = "Camera Filters";
const DEFAULT_POLL_TIMEOUT_MS: u64 = 1;

#[derive(Debug, Deserialize, Default)]
struct PipelineConfigFile {
    source: Option<String>,
    window_name: Option<String>,
    max_fps: Option<u32>,
    poll_timeout_ms: Option<u64>,
    mirror: Option<bool>,
    blur: Option<BlurParams>,
    features: Option<FeatureParams>,
    edges: Option<EdgeParams>,
}

/// Per-stage parameters.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct StageSettings {
    pub blur: BlurParams,
    pub features: FeatureParams,
    pub edges: EdgeParams,
}

/// Pipeline configuration, fixed once the loop starts.
#[derive(Clone, Debug)]
pub struct PipelineConfig {
    pub source: SourceSpec,
    pub window_name: String,
    /// Frame-rate ceiling. `None` leaves pacing to the poll timeout alone.
    pub max_fps: Option<u32>,
    /// Bounded wait for key input each tick.
    pub poll_timeout: Duration,
    /// Flip each captured frame left-right before filtering.
    pub mirror: bool,
    pub stages: StageSettings,
}

impl PipelineConfig {
    /// Defaults for the given positional source argument (device `0` when absent).
    pub fn from_source_arg(source: Option<&str>) -> Result<Self> {
        let source = SourceSpec::parse(source.unwrap_or(DEFAULT_SOURCE))?;
        let cfg = Self {
            source,
            window_name: DEFAULT_WINDOW_NAME.to_string(),
            max_fps: None,
            poll_timeout: Duration::from_millis(DEFAULT_POLL_TIMEOUT_MS),
            mirror: true,
            stages: StageSettings::default(),
        };
        cfg.validate()?;
        Ok(cfg)
    }

    /// Load a JSON or TOML settings file (chosen by extension). Missing keys
    /// keep their defaults.
    pub fn from_file(path: &Path) -> Result<Self> {
        let file = read_config_file(path)?;
        let mut cfg = Self::from_source_arg(file.source.as_deref())?;
        if let Some(name) = file.window_name {
            cfg.window_name = name;
        }
        cfg.max_fps = file.max_fps;
        if let Some(ms) = file.poll_timeout_ms {
            cfg.poll_timeout = Duration::from_millis(ms);
        }
        if let Some(mirror) = file.mirror {
            cfg.mirror = mirror;
        }
        if let Some(blur) = file.blur {
            cfg.stages.blur = blur;
        }
        if let Some(features) = file.features {
            cfg.stages.features = features;
        }
        if let Some(edges) = file.edges {
            cfg.stages.edges = edges;
        }
        cfg.validate()?;
        Ok(cfg)
    }

    /// Minimum tick duration implied by `max_fps`.
    pub fn frame_budget(&self) -> Option<Duration> {
        self.max_fps
            .filter(|fps| *fps > 0)
            .map(|fps| Duration::from_secs_f64(1.0 / fps as f64))
    }

    pub fn validate(&self) -> Result<()> {
        if self.window_name.trim().is_empty() {
            return Err(anyhow!("window name must not be empty"));
        }
        if self.max_fps == Some(0) {
            return Err(anyhow!("max_fps must be >= 1 when set"));
        }
        if self.poll_timeout.is_zero() {
            return Err(anyhow!("poll timeout must be at least 1ms"));
        }

        let blur = &self.stages.blur;
        if blur.kernel_size == 0 {
            return Err(anyhow!("blur kernel_size must be >= 1"));
        }

        let features = &self.stages.features;
        if !(features.quality_level > 0.0 && features.quality_level <= 1.0) {
            return Err(anyhow!("features quality_level must be in (0, 1]"));
        }
        if !(features.min_distance >= 0.0) {
            return Err(anyhow!("features min_distance must be >= 0"));
        }
        if features.block_size == 0 {
            return Err(anyhow!("features block_size must be >= 1"));
        }

        let edges = &self.stages.edges;
        if !(edges.low_threshold >= 0.0 && edges.low_threshold <= edges.high_threshold) {
            return Err(anyhow!(
                "edges thresholds must satisfy 0 <= low_threshold <= high_threshold"
            ));
        }
        Ok(())
    }
}

fn read_config_file(path: &Path) -> Result<PipelineConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let is_toml = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));
    let cfg = if is_toml {
        toml::from_str(&raw).map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    } else {
        serde_json::from_str(&raw)
            .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    };
    Ok(cfg)
}
