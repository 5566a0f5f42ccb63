//! modelmeta catalogue of climate data files.
//!
//! Provides:
//! - SQLite catalogue handle and schema ([`Catalog`])
//! - Reconciliation of described files with catalogued data files
//! - Find-or-insert resolvers for the reference data a file points at
//! - Ensemble association and read-only reports

pub mod catalog;
pub mod data_file;
pub mod ensemble;
pub mod error;
pub mod geometry_cache;
pub mod indexer;
pub mod models;
pub mod reconcile;
pub mod report;
pub mod resolve;

pub use catalog::Catalog;
pub use data_file::{
    delete_data_file, find_data_file_by_id_hash_filename, get_data_file, insert_data_file,
    DataFileMatches,
};
pub use ensemble::{
    associate_ensemble_to_filepaths, associate_to_data_file, associate_to_filepath,
    associate_to_variable, find_ensemble, find_or_insert_ensemble, insert_ensemble,
    AssociationOutcome, FileAssociation,
};
pub use error::{CatalogError, Result};
pub use geometry_cache::{GeometryCache, GeometryCacheStats, GridInfo, LevelSetInfo, DEFAULT_CACHE_SIZE};
pub use indexer::Indexer;
pub use models::*;
pub use reconcile::{
    classify, find_update_or_insert_cf_file, index_cf_file, reindex_cf_file, FileAction,
    IndexedFile, MatchFlags,
};
pub use report::{DirCount, EnsembleCount, FileEnsembles, FileFilter};
