//! Error types for sitrep.
//!
//! Library crates use [`SitrepError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all sitrep operations.
#[derive(Debug, thiserror::Error)]
pub enum SitrepError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Network/HTTP error while talking to a remote collaborator.
    #[error("network error: {0}")]
    Network(String),

    /// Taxonomy dataset error (bad payload, missing split, schema mismatch).
    #[error("dataset error: {message}")]
    Dataset { message: String },

    /// Embeddings collaborator error (request, response shape).
    #[error("embeddings error: {0}")]
    Embeddings(String),

    /// RAG collaborator error (request, response parsing).
    #[error("rag error: {0}")]
    Rag(String),

    /// Results table persistence error.
    #[error("storage error: {0}")]
    Storage(String),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Data validation error (empty document slice, malformed entry key, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, SitrepError>;

impl SitrepError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a dataset error from any displayable message.
    pub fn dataset(msg: impl Into<String>) -> Self {
        Self::Dataset {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_formatting() {
        let err = SitrepError::config("missing dataset name");
        assert_eq!(err.to_string(), "config error: missing dataset name");

        let err = SitrepError::validation("document d1 has no passage rows");
        assert!(err.to_string().contains("d1"));
    }

    #[test]
    fn collaborator_errors_carry_detail() {
        let err = SitrepError::Embeddings("expected 3 vectors, got 2".into());
        assert!(err.to_string().contains("expected 3 vectors"));

        let err = SitrepError::Rag("HTTP 503".into());
        assert_eq!(err.to_string(), "rag error: HTTP 503");
    }
}
