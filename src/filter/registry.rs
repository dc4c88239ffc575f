use std::collections::HashMap;

use anyhow::{anyhow, Result};
use image::{Rgb, RgbImage};

use crate::config::StageSettings;
use crate::frame::{Frame, PixelFormat};

use super::library::FilterLibrary;
use super::stage::{
    select_corners, BlurParams, EdgeParams, FeatureParams, FilterFailure, FilterStage, StageKind,
};

/// A stage refused a frame. The untouched input comes back with the failure
/// so the caller can still show it.
#[derive(Debug)]
pub struct Rejected {
    pub failure: FilterFailure,
    pub frame: Frame,
}

/// Configured stages, keyed by tag, plus the library they delegate to.
pub struct StageRegistry {
    stages: HashMap<StageKind, FilterStage>,
    library: Box<dyn FilterLibrary>,
}

impl StageRegistry {
    /// Registry with all four stages configured from `settings`.
    pub fn new<L: FilterLibrary + 'static>(settings: &StageSettings, library: L) -> Self {
        let mut registry = Self {
            stages: HashMap::new(),
            library: Box::new(library),
        };
        registry.register(FilterStage::Preview);
        registry.register(FilterStage::Blur(settings.blur));
        registry.register(FilterStage::Features(settings.features));
        registry.register(FilterStage::Edges(settings.edges));
        registry
    }

    /// Register or reconfigure a stage. The previous configuration of the
    /// same kind is replaced.
    pub fn register(&mut self, stage: FilterStage) {
        self.stages.insert(stage.kind(), stage);
    }

    pub fn get(&self, kind: StageKind) -> Option<&FilterStage> {
        self.stages.get(&kind)
    }

    /// Registered stage kinds, in declaration order.
    pub fn list(&self) -> Vec<StageKind> {
        let mut kinds: Vec<StageKind> = self.stages.keys().copied().collect();
        kinds.sort();
        kinds
    }

    pub fn library_name(&self) -> &'static str {
        self.library.name()
    }

    /// Run the stage registered for `kind` on `frame`.
    pub fn apply(&mut self, kind: StageKind, frame: Frame) -> Result<Frame, Rejected> {
        let Some(stage) = self.stages.get(&kind).copied() else {
            return Err(Rejected {
                failure: FilterFailure {
                    stage: kind,
                    reason: "stage not registered".to_string(),
                },
                frame,
            });
        };

        let output = match stage {
            FilterStage::Preview => return Ok(frame),
            FilterStage::Blur(params) => self.blur(&frame, &params),
            FilterStage::Features(params) => self.features(&frame, &params),
            FilterStage::Edges(params) => self.edges(&frame, &params),
        };

        match output {
            // No corners: hand back the input untouched.
            Ok(None) => Ok(frame),
            Ok(Some(filtered)) => Ok(filtered),
            Err(err) => Err(Rejected {
                failure: FilterFailure {
                    stage: kind,
                    reason: format!("{:#}", err),
                },
                frame,
            }),
        }
    }

    fn blur(&mut self, frame: &Frame, params: &BlurParams) -> Result<Option<Frame>> {
        let blurred = frame
            .to_planes()?
            .iter()
            .map(|plane| self.library.box_blur(plane, params.kernel_size))
            .collect::<Result<Vec<_>>>()?;
        Ok(Some(Frame::from_planes(&blurred, frame.format())?))
    }

    fn features(&mut self, frame: &Frame, params: &FeatureParams) -> Result<Option<Frame>> {
        if frame.format() != PixelFormat::Rgb8 {
            return Err(anyhow!(
                "corner overlay needs an Rgb8 frame, got {:?}",
                frame.format()
            ));
        }
        let gray = frame.to_gray_image()?;
        let responses = self.library.corner_responses(&gray, params.block_size)?;
        let corners = select_corners(responses, params);
        if corners.is_empty() {
            return Ok(None);
        }

        let mut canvas =
            RgbImage::from_raw(frame.width(), frame.height(), frame.as_bytes().to_vec())
                .ok_or_else(|| anyhow!("rgb frame buffer does not match its geometry"))?;
        let color = Rgb(params.marker_color);
        for corner in &corners {
            self.library.draw_hollow_circle(
                &mut canvas,
                (corner.x as i32, corner.y as i32),
                params.marker_radius as i32,
                color,
            )?;
        }
        log::trace!("features: {} corners drawn", corners.len());
        Ok(Some(Frame::try_from(canvas)?))
    }

    fn edges(&mut self, frame: &Frame, params: &EdgeParams) -> Result<Option<Frame>> {
        let gray = frame.to_gray_image()?;
        let edges = self
            .library
            .canny(&gray, params.low_threshold, params.high_threshold)?;
        Ok(Some(Frame::try_from(edges)?))
    }
}
