use std::error::Error;
use std::fmt;

/// Failures the harness itself detects, as opposed to errors raised by the
/// estimator backends (those travel as `anyhow::Error`).
#[derive(Debug, Clone, PartialEq)]
pub enum BenchError {
    /// A recognised option carried a value outside its allowed set or range.
    InvalidOption { flag: String, message: String },
    /// Fewer dataset files than the method needs.
    InsufficientDatasets { required: usize, found: usize },
    /// Two arrays that must line up row-for-row did not.
    LengthMismatch { expected: usize, found: usize },
    UnknownMethod(String),
}

impl fmt::Display for BenchError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            BenchError::InvalidOption { flag, message } => {
                write!(f, "Invalid value for option {}: {}", flag, message)
            }
            BenchError::InsufficientDatasets { required, found } => write!(
                f,
                "This method requires {} datasets, but {} were given",
                required, found
            ),
            BenchError::LengthMismatch { expected, found } => write!(
                f,
                "Length mismatch: expected {} entries, found {}",
                expected, found
            ),
            BenchError::UnknownMethod(name) => write!(
                f,
                "Unknown method: {}. Valid options are: ann, elastic_net, svm",
                name
            ),
        }
    }
}

impl Error for BenchError {}

impl BenchError {
    pub fn invalid_option(flag: impl Into<String>, message: impl Into<String>) -> Self {
        BenchError::InvalidOption {
            flag: flag.into(),
            message: message.into(),
        }
    }
}
