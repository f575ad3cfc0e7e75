//! Error types for the indexing pipeline.

use thiserror::Error;

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during an indexing run.
#[derive(Error, Debug)]
pub enum Error {
    /// Core error (store, normalization, serialization).
    #[error(transparent)]
    Core(#[from] vigil_core::Error),

    /// A store operation kept failing after bounded retries.
    #[error("'{op}' failed after {attempts} attempts: {last}")]
    RetriesExhausted {
        /// Name of the failing operation.
        op: &'static str,
        /// How many attempts were made.
        attempts: u32,
        /// Message of the last underlying error.
        last: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retries_exhausted_display() {
        let err = Error::RetriesExhausted {
            op: "index batch",
            attempts: 3,
            last: "store error: timed out".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("index batch"));
        assert!(msg.contains("3 attempts"));
        assert!(msg.contains("timed out"));
    }

    #[test]
    fn test_core_error_passes_through() {
        let err: Error = vigil_core::Error::Store("connection refused".into()).into();
        assert!(err.to_string().contains("connection refused"));
    }
}
