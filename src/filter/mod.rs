mod backends;
mod library;
mod registry;
mod stage;

pub use backends::CpuLibrary;
pub use library::{Corner, FilterLibrary};
pub use registry::{Rejected, StageRegistry};
pub use stage::{
    select_corners, BlurParams, EdgeParams, FeatureParams, FilterFailure, FilterStage, StageKind,
};
