//! G-code Layers
//!
//! Ingests FDM 3D printer G-code and builds a validated, layered toolpath
//! model.
//!
//! This library provides:
//! - G-code scanning and parsing into a closed command vocabulary
//! - Deterministic machine state simulation
//! - Arc interpolation, priming layer detection and layer statistics
//! - Configuration management

pub mod config;
pub mod error;
pub mod geometry;
pub mod parser;
pub mod simulation;
pub mod toolpath;

// Re-exports for clean public API
pub use config::{BuildSettings, Config};
pub use error::{Error, Result};
pub use parser::{open_file, parse_file, parse_line, parse_text, Command, CommandKind};
pub use simulation::{Machine, MachineState};
pub use toolpath::{
    build_model, load_model, BuildControl, BuildOutcome, Model, ModelBuilder, ModelInfo, Stage,
};
