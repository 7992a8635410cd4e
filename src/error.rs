//! Error types for index construction, queries and configuration.

use std::path::PathBuf;
use thiserror::Error;

/// All errors that can occur while building or querying an index.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// I/O error with context.
    #[error("I/O error at {path}: {context} ({source})")]
    Io {
        #[source]
        source: std::io::Error,
        path: PathBuf,
        context: String,
    },

    /// Invalid argument or configuration value.
    #[error("invalid argument for field '{field}': {reason}")]
    InvalidArgument { field: String, reason: String },

    /// Element has no data behind it (e.g. missing embedding).
    #[error("not found: {id}")]
    NotFound { id: String },

    /// Vector dimension mismatch.
    #[error("dimension mismatch: expected {expected}, got {got}")]
    WrongDimension { expected: usize, got: usize },

    /// The metric provider failed or produced an unusable distance.
    #[error("metric error: {0}")]
    Metric(String),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl Error {
    /// Create an I/O error with context.
    pub fn io_err(path: impl Into<PathBuf>, context: impl Into<String>) -> impl FnOnce(std::io::Error) -> Self {
        move |e: std::io::Error| Error::Io {
            source: e,
            path: path.into(),
            context: context.into(),
        }
    }

    /// Create an invalid argument error.
    pub fn invalid_arg(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::InvalidArgument {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Create a not-found error for an element.
    pub fn not_found(id: impl std::fmt::Debug) -> Self {
        Error::NotFound {
            id: format!("{:?}", id),
        }
    }
}

/// Result type alias for index operations.
pub type Result<T> = std::result::Result<T, Error>;
