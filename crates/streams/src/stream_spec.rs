//! Stream specifications parsed from the command line.
//!
//! A spec has the literal form `window,input,output`. An `input` of `-`
//! denotes standard input and an `output` of `-` denotes standard output;
//! anything else is a file path. Commas cannot be escaped.

use serde::Serialize;
use std::fmt;
use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;

/// Descriptor value that selects the shared standard input/output channel.
pub const STDIO_MARKER: &str = "-";

/// Error type for malformed stream specifications
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SpecError {
    /// Spec does not have exactly three comma-separated fields
    #[error("Invalid spec '{spec}': expected window,input,output but found {found} field(s)")]
    WrongFieldCount { spec: String, found: usize },

    /// Window length is not an integer
    #[error("Invalid spec '{spec}': window length '{window}' is not an integer")]
    InvalidWindow { spec: String, window: String },

    /// Window length is zero or negative
    #[error("Invalid spec '{spec}': window length must be positive, got {window}")]
    NonPositiveWindow { spec: String, window: i64 },

    /// Input or output field is empty
    #[error("Invalid spec '{spec}': {field} must not be empty")]
    EmptyDescriptor { spec: String, field: &'static str },

    /// More than one spec reads standard input
    #[error("Invalid spec '{spec}': standard input is already consumed by '{first}'")]
    DuplicateStdin { spec: String, first: String },
}

/// Where a stream reads its samples from
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InputDescriptor {
    Stdin,
    File(PathBuf),
}

impl InputDescriptor {
    fn parse(field: &str) -> Self {
        if field == STDIO_MARKER {
            InputDescriptor::Stdin
        } else {
            InputDescriptor::File(PathBuf::from(field))
        }
    }

    pub fn is_stdin(&self) -> bool {
        matches!(self, InputDescriptor::Stdin)
    }
}

impl fmt::Display for InputDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InputDescriptor::Stdin => write!(f, "{}", STDIO_MARKER),
            InputDescriptor::File(path) => write!(f, "{}", path.display()),
        }
    }
}

/// Where a stream writes its averages to
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputDescriptor {
    Stdout,
    File(PathBuf),
}

impl OutputDescriptor {
    fn parse(field: &str) -> Self {
        if field == STDIO_MARKER {
            OutputDescriptor::Stdout
        } else {
            OutputDescriptor::File(PathBuf::from(field))
        }
    }

    pub fn is_stdout(&self) -> bool {
        matches!(self, OutputDescriptor::Stdout)
    }
}

impl fmt::Display for OutputDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputDescriptor::Stdout => write!(f, "{}", STDIO_MARKER),
            OutputDescriptor::File(path) => write!(f, "{}", path.display()),
        }
    }
}

/// One validated stream job description
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StreamSpec {
    /// Number of samples averaged per output
    pub window: NonZeroUsize,
    pub input: InputDescriptor,
    pub output: OutputDescriptor,
}

impl StreamSpec {
    pub fn new(window: NonZeroUsize, input: InputDescriptor, output: OutputDescriptor) -> Self {
        Self {
            window,
            input,
            output,
        }
    }
}

impl FromStr for StreamSpec {
    type Err = SpecError;

    fn from_str(spec: &str) -> Result<Self, Self::Err> {
        let fields: Vec<&str> = spec.split(',').collect();
        let [window, input, output] = fields.as_slice() else {
            return Err(SpecError::WrongFieldCount {
                spec: spec.to_string(),
                found: fields.len(),
            });
        };

        let window = parse_window(spec, window)?;

        if input.is_empty() {
            return Err(SpecError::EmptyDescriptor {
                spec: spec.to_string(),
                field: "input",
            });
        }
        if output.is_empty() {
            return Err(SpecError::EmptyDescriptor {
                spec: spec.to_string(),
                field: "output",
            });
        }

        Ok(Self {
            window,
            input: InputDescriptor::parse(input),
            output: OutputDescriptor::parse(output),
        })
    }
}

impl fmt::Display for StreamSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{},{}", self.window, self.input, self.output)
    }
}

fn parse_window(spec: &str, raw: &str) -> Result<NonZeroUsize, SpecError> {
    let invalid = || SpecError::InvalidWindow {
        spec: spec.to_string(),
        window: raw.to_string(),
    };

    let value: i64 = raw.trim().parse().map_err(|_| invalid())?;
    if value <= 0 {
        return Err(SpecError::NonPositiveWindow {
            spec: spec.to_string(),
            window: value,
        });
    }

    usize::try_from(value)
        .ok()
        .and_then(NonZeroUsize::new)
        .ok_or_else(invalid)
}

/// Parse every spec, failing on the first malformed one.
pub fn parse_specs<S: AsRef<str>>(raw: &[S]) -> Result<Vec<StreamSpec>, SpecError> {
    raw.iter().map(|s| s.as_ref().parse()).collect()
}
