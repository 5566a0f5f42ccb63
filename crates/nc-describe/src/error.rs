//! Error types for describing data files.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for describe operations.
pub type DescribeResult<T> = Result<T, DescribeError>;

/// Errors raised while reading a data file's description.
#[derive(Error, Debug)]
pub enum DescribeError {
    /// File I/O error
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Malformed description document
    #[error("Invalid description document {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// Description is internally inconsistent
    #[error("Invalid description of {path}: {message}")]
    InvalidFormat { path: String, message: String },

    #[error(transparent)]
    Meta(#[from] meta_common::MetaError),
}

impl DescribeError {
    pub fn io(source: std::io::Error, path: impl Into<PathBuf>) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
