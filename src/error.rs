use std::path::PathBuf;

use thiserror::Error;

use crate::data::model::ChannelId;

// ---------------------------------------------------------------------------
// Engine errors
// ---------------------------------------------------------------------------

/// Errors raised by the analysis engine.
///
/// Degenerate data (a channel with no peaks, an empty channel selection) is
/// never reported here; those cases resolve to defined default values.
#[derive(Error, Debug)]
pub enum AnalysisError {
    /// A parameter is non-finite or outside its allowed range.
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// An operation needs a loaded recording.
    #[error("No recording loaded")]
    NotLoaded,

    /// An operation needs derived state (peaks, statistics, ...) that has not been computed.
    #[error("{0} not available; run the corresponding analysis first")]
    MissingDerivedState(&'static str),

    #[error("Unknown channel id: {0}")]
    UnknownChannel(ChannelId),

    #[error("Shape mismatch: {0}")]
    ShapeMismatch(String),

    #[error("Unsupported file format '.{extension}' for {}", path.display())]
    UnsupportedFormat { path: PathBuf, extension: String },

    #[error("File not found: {}", .0.display())]
    FileNotFound(PathBuf),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, AnalysisError>;

/// Reject non-finite or non-positive values.
pub(crate) fn ensure_positive(name: &str, value: f64) -> Result<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(AnalysisError::InvalidParameter(format!(
            "{name} must be a positive finite number, got {value}"
        )))
    }
}
