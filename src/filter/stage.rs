use serde::{Deserialize, Serialize};

use super::library::Corner;

/// Tag of a filter stage. The set is closed; the key table and the registry
/// both resolve through this tag.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StageKind {
    Preview,
    Blur,
    Features,
    Edges,
}

impl StageKind {
    pub const ALL: [StageKind; 4] = [
        StageKind::Preview,
        StageKind::Blur,
        StageKind::Features,
        StageKind::Edges,
    ];

    pub fn name(self) -> &'static str {
        match self {
            StageKind::Preview => "preview",
            StageKind::Blur => "blur",
            StageKind::Features => "features",
            StageKind::Edges => "edges",
        }
    }
}

impl std::fmt::Display for StageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Averaging blur configuration.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BlurParams {
    /// Side of the square averaging window.
    pub kernel_size: u32,
}

impl Default for BlurParams {
    fn default() -> Self {
        Self { kernel_size: 13 }
    }
}

/// Corner overlay configuration.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureParams {
    /// Upper bound on retained corners. Zero means unbounded.
    pub max_corners: usize,
    /// Fraction of the strongest response a corner must reach.
    pub quality_level: f32,
    /// Minimum Euclidean distance between retained corners, in pixels.
    pub min_distance: f32,
    /// Neighborhood used for local response estimation.
    pub block_size: u32,
    pub marker_radius: u32,
    pub marker_color: [u8; 3],
}

impl Default for FeatureParams {
    fn default() -> Self {
        Self {
            max_corners: 500,
            quality_level: 0.2,
            min_distance: 15.0,
            block_size: 9,
            marker_radius: 10,
            marker_color: [0, 255, 0],
        }
    }
}

/// Edge-linking thresholds.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EdgeParams {
    pub low_threshold: f32,
    pub high_threshold: f32,
}

impl Default for EdgeParams {
    fn default() -> Self {
        Self {
            low_threshold: 80.0,
            high_threshold: 150.0,
        }
    }
}

/// A configured filter stage.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum FilterStage {
    Preview,
    Blur(BlurParams),
    Features(FeatureParams),
    Edges(EdgeParams),
}

impl FilterStage {
    pub fn kind(&self) -> StageKind {
        match self {
            FilterStage::Preview => StageKind::Preview,
            FilterStage::Blur(_) => StageKind::Blur,
            FilterStage::Features(_) => StageKind::Features,
            FilterStage::Edges(_) => StageKind::Edges,
        }
    }
}

/// A stage could not transform a frame. Recoverable: the loop shows the
/// unfiltered frame for that tick and keeps going.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FilterFailure {
    pub stage: StageKind,
    pub reason: String,
}

impl std::fmt::Display for FilterFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} stage failed: {}", self.stage, self.reason)
    }
}

impl std::error::Error for FilterFailure {}

/// Pick the corners to draw from raw responses.
///
/// Drops responses below `quality_level` times the strongest, then accepts
/// strongest-first while keeping at least `min_distance` from every accepted
/// corner, stopping at `max_corners`.
pub fn select_corners(mut responses: Vec<Corner>, params: &FeatureParams) -> Vec<Corner> {
    let strongest = responses
        .iter()
        .map(|c| c.score)
        .fold(f32::NEG_INFINITY, f32::max);
    if responses.is_empty() || strongest <= 0.0 {
        return Vec::new();
    }

    let floor = params.quality_level * strongest;
    responses.retain(|c| c.score >= floor);
    responses.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then(a.y.cmp(&b.y))
            .then(a.x.cmp(&b.x))
    });

    let min_sq = params.min_distance * params.min_distance;
    let mut accepted: Vec<Corner> = Vec::new();
    for candidate in responses {
        if params.max_corners > 0 && accepted.len() >= params.max_corners {
            break;
        }
        let clear = accepted.iter().all(|kept| {
            let dx = kept.x as f32 - candidate.x as f32;
            let dy = kept.y as f32 - candidate.y as f32;
            dx * dx + dy * dy >= min_sq
        });
        if clear {
            accepted.push(candidate);
        }
    }
    accepted
}

#[cfg(test)]
mod tests {
    use super::*;

    fn corner(x: u32, y: u32, score: f32) -> Corner {
        Corner { x, y, score }
    }

    #[test]
    fn defaults_match_stock_filter_settings() {
        assert_eq!(BlurParams::default().kernel_size, 13);
        let features = FeatureParams::default();
        assert_eq!(features.max_corners, 500);
        assert_eq!(features.quality_level, 0.2);
        assert_eq!(features.min_distance, 15.0);
        assert_eq!(features.block_size, 9);
        assert_eq!(features.marker_radius, 10);
        let edges = EdgeParams::default();
        assert_eq!((edges.low_threshold, edges.high_threshold), (80.0, 150.0));
    }

    #[test]
    fn selection_drops_weak_responses() {
        let params = FeatureParams::default();
        let picked = select_corners(
            vec![corner(0, 0, 100.0), corner(50, 50, 19.0), corner(90, 90, 25.0)],
            &params,
        );
        let coords: Vec<_> = picked.iter().map(|c| (c.x, c.y)).collect();
        assert_eq!(coords, vec![(0, 0), (90, 90)]);
    }

    #[test]
    fn selection_enforces_min_distance_strongest_first() {
        let params = FeatureParams::default();
        let picked = select_corners(
            vec![corner(10, 10, 50.0), corner(20, 10, 90.0), corner(40, 10, 60.0)],
            &params,
        );
        let coords: Vec<_> = picked.iter().map(|c| (c.x, c.y)).collect();
        // (10, 10) is 10px from the stronger (20, 10).
        assert_eq!(coords, vec![(20, 10), (40, 10)]);
    }

    #[test]
    fn selection_caps_count() {
        let params = FeatureParams {
            max_corners: 2,
            ..FeatureParams::default()
        };
        let responses = (0..10).map(|i| corner(i * 100, 0, 50.0 + i as f32)).collect();
        let picked = select_corners(responses, &params);
        assert_eq!(picked.len(), 2);
        assert_eq!(picked[0].x, 900);
        assert_eq!(picked[1].x, 800);
    }

    #[test]
    fn selection_of_nothing_is_nothing() {
        assert!(select_corners(Vec::new(), &FeatureParams::default()).is_empty());
    }

    #[test]
    fn stage_kind_names_are_lowercase() {
        let names: Vec<_> = StageKind::ALL.iter().map(|k| k.to_string()).collect();
        assert_eq!(names, vec!["preview", "blur", "features", "edges"]);
    }
}
