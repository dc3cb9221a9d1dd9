//! Error types for the MTS engine

use std::path::PathBuf;

use thiserror::Error;

/// MTS error type
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid binning policy, unknown variable, or an outlier fraction that
    /// cannot be applied.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The record source cannot be opened or decoded.
    #[error("record source unavailable ({}): {reason}", path.display())]
    SourceUnavailable {
        /// Location of the source.
        path: PathBuf,
        /// Underlying failure.
        reason: String,
    },

    /// No in-range samples were retained for a statistic.
    #[error("no in-range samples for '{sample}'")]
    EmptySampleSet {
        /// Histogram name the sample set belongs to.
        sample: String,
    },

    /// Malformed artifact or inconsistent comparison inputs.
    #[error("Validation error: {0}")]
    Validation(String),
}

impl Error {
    pub(crate) fn source_unavailable(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Error::SourceUnavailable { path: path.into(), reason: reason.to_string() }
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
