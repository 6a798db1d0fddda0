//! Error types for the analysis pipeline.

use thiserror::Error;

/// Errors produced while resolving, fetching, analysing or persisting imagery.
#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("invalid geometry: {0}")]
    InvalidGeometry(String),

    #[error("no area of interest given (need a point with radius or a polygon)")]
    MissingArea,

    #[error("invalid date range: {0}")]
    InvalidDateRange(String),

    #[error("imagery source unavailable: {0}")]
    SourceUnavailable(String),

    #[error("no imagery found between {start} and {end} with cloud cover below {max_cloud_pct}%")]
    NoImageryFound {
        start: String,
        end: String,
        max_cloud_pct: f64,
    },

    #[error("none of the {attempted} candidate images could be processed")]
    NoUsableImagery { attempted: usize },

    #[error("image {image_id} could not be resolved: {reason}")]
    PartialBandFailure { image_id: String, reason: String },

    #[error("missing band: {0}")]
    MissingBand(String),

    #[error("analysis {id} not found for owner {owner}")]
    NotFound { owner: String, id: String },

    #[error("serialization failure: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("raster dimensions mismatch: expected {expected:?}, got {actual:?}")]
    DimensionMismatch {
        expected: (usize, usize),
        actual: (usize, usize),
    },

    #[error("could not decode {format} data: {reason}")]
    Decode {
        format: &'static str,
        reason: String,
    },

    #[error("persistence failure: {0}")]
    Persistence(String),

    #[error("configuration error: {0}")]
    Config(String),
}

/// Result alias for pipeline operations.
pub type Result<T> = std::result::Result<T, AnalysisError>;
