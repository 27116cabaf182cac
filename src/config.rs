//! Configuration management for the model loader.
//!
//! Handles:
//! - Command-line argument parsing
//! - TOML build settings (user config directory, explicit file)
//!
//! Later sources win: built-in defaults, the user settings file, the file
//! given with `--config`, then individual command-line flags.

use anyhow::{Context, Result};
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::ConfigError;

/// Directory name under the platform config directory
pub const APP_DIR: &str = "gcode-layers";

/// File name of the settings file inside [`APP_DIR`]
pub const SETTINGS_FILE: &str = "settings.toml";

/// Command-line arguments for the model loader
#[derive(Debug, Parser)]
#[command(name = "gcode-layers")]
#[command(about = "Build a layered toolpath model from an FDM G-code file")]
#[command(version)]
pub struct Args {
    /// G-code file to load
    pub path: PathBuf,

    /// Settings file overriding the user settings
    #[arg(long, help = "Path to a TOML settings file")]
    pub config: Option<PathBuf>,

    #[arg(long, help = "Nozzle diameter in millimetres")]
    pub nozzle_diameter: Option<f64>,

    #[arg(long, help = "Maximum chordal error of interpolated arcs in millimetres")]
    pub arc_max_error: Option<f64>,

    /// Fail on unsupported commands instead of skipping them
    #[arg(long)]
    pub strict: bool,

    /// Print the model summary as JSON
    #[arg(long)]
    pub json: bool,

    #[arg(
        long,
        default_value = "info",
        help = "Log level (trace, debug, info, warn, error)"
    )]
    pub log_level: String,
}

/// Smallest accepted arc error, in millimetres.
pub const MIN_ARC_MAX_ERROR: f64 = 1e-6;

/// Settings that shape a model build.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BuildSettings {
    /// Nozzle diameter in millimetres, half of it pads every path end
    pub nozzle_diameter: f64,
    /// Maximum chordal error of interpolated arcs in millimetres
    pub arc_max_error: f64,
    /// Skip unsupported commands instead of failing
    pub skip_unknown: bool,
}

impl Default for BuildSettings {
    fn default() -> Self {
        Self {
            nozzle_diameter: 0.4,
            arc_max_error: 0.05,
            skip_unknown: true,
        }
    }
}

impl BuildSettings {
    /// Reject settings the builder cannot work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        positive("nozzle_diameter", self.nozzle_diameter)?;
        positive("arc_max_error", self.arc_max_error)?;
        if self.arc_max_error < MIN_ARC_MAX_ERROR {
            return Err(ConfigError::BelowMinimum {
                name: "arc_max_error",
                value: self.arc_max_error,
                min: MIN_ARC_MAX_ERROR,
            });
        }
        Ok(())
    }

    /// Overlay the keys present in `file`.
    pub fn apply(&mut self, file: &SettingsFile) {
        if let Some(nozzle_diameter) = file.nozzle_diameter {
            self.nozzle_diameter = nozzle_diameter;
        }
        if let Some(arc_max_error) = file.arc_max_error {
            self.arc_max_error = arc_max_error;
        }
        if let Some(skip_unknown) = file.skip_unknown {
            self.skip_unknown = skip_unknown;
        }
    }
}

fn positive(name: &'static str, value: f64) -> Result<(), ConfigError> {
    // Also rejects NaN
    if value > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::NonPositive { name, value })
    }
}

/// Contents of a settings file. Every key is optional.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SettingsFile {
    pub nozzle_diameter: Option<f64>,
    pub arc_max_error: Option<f64>,
    pub skip_unknown: Option<bool>,
}

impl SettingsFile {
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read settings file {}", path.display()))?;
        Self::from_toml_str(&content)
            .with_context(|| format!("invalid settings file {}", path.display()))
    }
}

/// Combined configuration from all sources
#[derive(Debug, Clone)]
pub struct Config {
    /// G-code file to load
    pub path: PathBuf,
    /// Effective build settings
    pub settings: BuildSettings,
    /// Print JSON instead of text
    pub json: bool,
    /// Log level
    pub log_level: String,
}

impl Config {
    /// Create configuration from command-line arguments
    pub fn from_args_and_env() -> Result<Self> {
        Self::from_args(Args::parse())
    }

    /// Create configuration from explicit arguments (useful for testing)
    pub fn from_args(args: Args) -> Result<Self> {
        let user_file = dirs::config_dir().map(|dir| dir.join(APP_DIR).join(SETTINGS_FILE));
        Self::from_sources(args, user_file.as_deref())
    }

    /// Create configuration with an explicit user settings file location.
    ///
    /// A missing or broken user file falls back to the defaults; a broken
    /// `--config` file is an error.
    pub fn from_sources(args: Args, user_file: Option<&Path>) -> Result<Self> {
        let mut settings = BuildSettings::default();

        if let Some(path) = user_file.filter(|p| p.is_file()) {
            match SettingsFile::load(path) {
                Ok(file) => settings.apply(&file),
                Err(e) => log::warn!("Ignoring user settings: {:#}. Using defaults.", e),
            }
        }

        if let Some(path) = &args.config {
            settings.apply(&SettingsFile::load(path)?);
        }

        if let Some(nozzle_diameter) = args.nozzle_diameter {
            settings.nozzle_diameter = nozzle_diameter;
        }
        if let Some(arc_max_error) = args.arc_max_error {
            settings.arc_max_error = arc_max_error;
        }
        if args.strict {
            settings.skip_unknown = false;
        }

        settings.validate()?;

        Ok(Config {
            path: args.path,
            settings,
            json: args.json,
            log_level: args.log_level,
        })
    }
}
