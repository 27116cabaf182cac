//! Toolpath model
//!
//! Turns simulated deposition moves into layers of paths:
//! - Arc interpolation
//! - Priming layer detection
//! - Padding, statistics and boundaries of the finished [`Model`]

pub mod builder;
pub mod interpolation;
pub mod layer;
pub mod model;
pub mod path;
pub mod priming;

pub use builder::{build_model, load_model, BuildControl, BuildOutcome, ModelBuilder, Stage};
pub use interpolation::interpolate_arc;
pub use layer::{Layer, SampleStats};
pub use model::{LayerInfo, Model, ModelInfo};
pub use path::Path;
pub use priming::{LayerAction, PrimingDetector, PrimingPhase};
