//! Error taxonomy
//!
//! Every failure is terminal for the build that raised it. Parsing failures
//! are wrapped in [`SyntaxError`] so they always carry the offending line.

use thiserror::Error;

/// Problems found while scanning and grouping the tokens of a single line.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TokenError {
    #[error("line length must not be greater than {max} (is {length})")]
    LineTooLong { length: usize, max: usize },

    #[error("unrecognized G-code field letter '{0}'")]
    UnrecognizedLetter(char),

    #[error("parameter field '{0}' specified without a previous command field")]
    ParameterBeforeCommand(char),

    #[error("malformed number literal '{literal}' for field '{letter}'")]
    MalformedNumber { letter: char, literal: String },
}

/// Problems found while constructing a typed command from its token group.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CommandError {
    #[error("{command} requires {expected}")]
    MissingParameter {
        command: String,
        expected: &'static str,
    },

    #[error("unrecognized parameter letter for {command}: '{letter}'")]
    InvalidParameter { command: String, letter: char },

    #[error("unsupported command: {0}")]
    UnsupportedCommand(String),
}

/// The nested cause of a [`SyntaxError`].
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LineError {
    #[error(transparent)]
    Token(#[from] TokenError),

    #[error(transparent)]
    Command(#[from] CommandError),
}

/// A line of G-code that could not be turned into commands.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("G-code syntax error at line {line_number}: {cause}")]
pub struct SyntaxError {
    pub line_number: usize,
    /// The raw line, trimmed of surrounding whitespace.
    pub line: String,
    #[source]
    pub cause: LineError,
}

impl SyntaxError {
    pub fn new(line_number: usize, line: &str, cause: impl Into<LineError>) -> Self {
        Self {
            line_number,
            line: line.trim().to_string(),
            cause: cause.into(),
        }
    }

    pub fn as_markdown(&self) -> String {
        format!(
            "G-code syntax error at line {}:\n\n`{}`\n\n{}",
            self.line_number, self.line, self.cause
        )
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SimulationError {
    #[error("unknown command {code} at line {line_number}")]
    UnknownCommand { code: String, line_number: usize },
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum GeometryError {
    /// The effector went down after more than one regular layer was printed.
    #[error(
        "Effector descended after printing {prev_layer_count} layers \
         (from {prev_layer_z}mm to {cur_layer_z}mm)."
    )]
    LateEffectorDescent {
        cur_layer_z: f64,
        prev_layer_z: f64,
        prev_layer_count: usize,
    },

    /// A second descent, after the priming layer had already been detected.
    #[error(
        "Effector descended after post priming descent \
         (from {prev_layer_z}mm to {cur_layer_z}mm)."
    )]
    PostPrimingDescent { cur_layer_z: f64, prev_layer_z: f64 },

    #[error(
        "points (source={source_point:?}, destination={destination:?}) are not \
         equidistant from pivot={pivot:?}"
    )]
    ArcNotEquidistant {
        source_point: (f64, f64),
        destination: (f64, f64),
        pivot: (f64, f64),
    },
}

impl GeometryError {
    pub fn as_markdown(&self) -> String {
        self.to_string()
    }
}

/// Invalid build settings.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("{name} must be a positive number (got {value})")]
    NonPositive { name: &'static str, value: f64 },

    #[error("{name} must be at least {min} (got {value})")]
    BelowMinimum {
        name: &'static str,
        value: f64,
        min: f64,
    },

    #[error("failed to parse settings: {0}")]
    Parse(String),
}

/// Top-level error for the whole ingestion pipeline.
#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Syntax(#[from] SyntaxError),

    #[error(transparent)]
    Simulation(#[from] SimulationError),

    #[error(transparent)]
    Geometry(#[from] GeometryError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("failed to read G-code: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub fn as_markdown(&self) -> String {
        match self {
            Error::Syntax(e) => e.as_markdown(),
            Error::Geometry(e) => e.as_markdown(),
            other => other.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
