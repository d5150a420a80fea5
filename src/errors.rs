//! errors.rs — lightweight error type for knn-loadgen
//!
//! * No `thiserror`; the enum is small enough to format by hand.
//! * Use `Result<T>` alias for convenience.

use core::fmt;

/// Result alias used across crate.
pub type Result<T, E = LoadGenError> = core::result::Result<T, E>;

/// Every failure the load generator can surface.
#[derive(Debug, Clone, PartialEq)]
pub enum LoadGenError {
    /// The shared cancellation signal fired (benchmark duration elapsed).
    Cancelled,

    /// A single search call against the service under test failed.
    Search(String),

    /// The service omitted the stored vectors a session needs to continue.
    MissingVectors,

    /// A vector does not match the run's dimensionality.
    DimensionMismatch { expected: usize, found: usize },

    /// Rejected by `BenchmarkBuilder::build`.
    InvalidConfig(String),

    /// Dataset or output file I/O failed.
    Io(String),

    /// CSV encoding failed.
    Csv(String),

    /// Serialization or deserialization failed (snapshot feature).
    #[cfg(feature = "snapshot")]
    Serialize(String),
}

impl LoadGenError {
    /// Cancellation is expected at the end of every run and is never a failure.
    #[inline]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, LoadGenError::Cancelled)
    }
}

impl fmt::Display for LoadGenError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadGenError::Cancelled => write!(f, "operation cancelled"),
            LoadGenError::Search(msg) => write!(f, "search failed: {}", msg),
            LoadGenError::MissingVectors => {
                write!(f, "search response carries no result vectors")
            }
            LoadGenError::DimensionMismatch { expected, found } => {
                write!(f, "dimension mismatch: expected {}, got {}", expected, found)
            }
            LoadGenError::InvalidConfig(msg) => write!(f, "invalid configuration: {}", msg),
            LoadGenError::Io(msg) => write!(f, "i/o error: {}", msg),
            LoadGenError::Csv(msg) => write!(f, "csv error: {}", msg),
            #[cfg(feature = "snapshot")]
            LoadGenError::Serialize(msg) => write!(f, "serialization error: {}", msg),
        }
    }
}

impl std::error::Error for LoadGenError {}

impl From<std::io::Error> for LoadGenError {
    fn from(e: std::io::Error) -> Self {
        LoadGenError::Io(e.to_string())
    }
}

impl From<csv::Error> for LoadGenError {
    fn from(e: csv::Error) -> Self {
        LoadGenError::Csv(e.to_string())
    }
}

#[cfg(feature = "snapshot")]
impl From<serde_json::Error> for LoadGenError {
    fn from(e: serde_json::Error) -> Self {
        LoadGenError::Serialize(e.to_string())
    }
}
