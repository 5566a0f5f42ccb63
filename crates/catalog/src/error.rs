//! Error types for catalogue operations.

use thiserror::Error;

/// Result type alias using CatalogError.
pub type Result<T> = std::result::Result<T, CatalogError>;

/// Errors raised while indexing files or maintaining the catalogue.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// One physical file is represented by more than one catalogue entry.
    #[error("Split brain: {path} is in the catalogue under multiple data files {data_file_ids:?}")]
    SplitBrain { path: String, data_file_ids: Vec<i64> },

    /// A combination of match results the reconciliation table does not cover.
    #[error(
        "Unanticipated case for {path}: id match {id_match:?}, hash match {hash_match:?}, \
         filename match {filename_match:?}, old path exists {old_path_exists}, \
         same target {same_target}, index up to date {index_up_to_date}"
    )]
    UnanticipatedCase {
        path: String,
        id_match: Option<i64>,
        hash_match: Option<i64>,
        filename_match: Option<i64>,
        old_path_exists: bool,
        same_target: bool,
        index_up_to_date: bool,
    },

    #[error("{path} is missing required metadata: {}", fields.join(", "))]
    MissingMetadata { path: String, fields: Vec<String> },

    #[error("No existing ensemble matches name = '{name}' and version = '{version}'")]
    EnsembleNotFound { name: String, version: f64 },

    #[error("Variable '{variable}' is not described in {path}")]
    UnknownVariable { path: String, variable: String },

    #[error("Variable '{variable}' in {path} is not gridded")]
    NotGridded { path: String, variable: String },

    #[error("Data file variable {data_file_variable_id} has unusable geometry type '{geometry_type}'")]
    CorruptVariable { data_file_variable_id: i64, geometry_type: String },

    #[error("Invalid pattern: {0}")]
    InvalidPattern(#[from] regex::Error),

    #[error(transparent)]
    Describe(#[from] nc_describe::DescribeError),

    #[error(transparent)]
    Meta(#[from] meta_common::MetaError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

impl CatalogError {
    /// True when the storage layer rejected a write on a uniqueness constraint.
    pub fn is_unique_violation(&self) -> bool {
        match self {
            Self::Database(sqlx::Error::Database(e)) => e.is_unique_violation(),
            _ => false,
        }
    }
}
