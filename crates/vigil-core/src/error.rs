//! Error types shared across the Vigil core.

use thiserror::Error;

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during normalization, indexing, and querying.
#[derive(Error, Debug)]
pub enum Error {
    /// JSON parsing error (malformed queue entry or raw record).
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Queue entry carries no usable timestamp.
    #[error("invalid timestamp: {0}")]
    InvalidTimestamp(String),

    /// A filter names a field outside the recognized set.
    #[error("unknown filter field: '{0}'")]
    UnknownFilterField(String),

    /// Query time range is inverted.
    #[error("invalid time range: start {start} > end {end}")]
    InvalidTimeRange {
        /// Requested range start (epoch seconds).
        start: f64,
        /// Requested range end (epoch seconds).
        end: f64,
    },

    /// Query limit is out of bounds.
    #[error("invalid limit: {0} (must be between 1 and 1000)")]
    InvalidLimit(usize),

    /// Key-value store error (connectivity, timeout, protocol).
    #[error("store error: {0}")]
    Store(String),
}

impl Error {
    /// Whether this error is a client error (bad input) rather than a
    /// service-side failure. Client errors are never retried.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::UnknownFilterField(_) | Self::InvalidTimeRange { .. } | Self::InvalidLimit(_)
        )
    }
}

impl From<redis::RedisError> for Error {
    fn from(err: redis::RedisError) -> Self {
        Self::Store(err.to_string())
    }
}
