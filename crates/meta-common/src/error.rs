//! Error types for the shared modelmeta vocabulary.

use thiserror::Error;

/// Result type alias using MetaError.
pub type MetaResult<T> = Result<T, MetaError>;

/// Errors raised while parsing or validating shared domain values.
#[derive(Debug, Error)]
pub enum MetaError {
    #[error("Invalid PROJ4 string '{input}': {message}")]
    InvalidProj4 { input: String, message: String },

    #[error("Unknown time resolution: {0}")]
    InvalidTimeResolution(String),

    #[error("Unknown model type: {0}")]
    InvalidModelType(String),

    #[error("Axis '{0}' has no values")]
    EmptyAxis(String),
}
