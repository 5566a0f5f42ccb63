//! Reconciling a described file with the catalogue.
//!
//! An incoming [`DescribedFile`] is matched against existing data files by
//! unique id, content hash and filename. The combination of matches, plus a
//! few facts about the filesystem and index time, decides the one action
//! taken: insert, skip, touch the index time, update the filename, or
//! delete and reindex.

use std::path::Path;

use serde::Serialize;
use sqlx::SqliteConnection;
use tracing::{error, info, warn};

use nc_describe::DescribedFile;

use crate::data_file::{
    delete_data_file, find_data_file_by_id_hash_filename, insert_data_file, touch_index_time,
    update_filename, DataFileMatches,
};
use crate::error::{CatalogError, Result};
use crate::geometry_cache::GeometryCache;
use crate::models::DataFile;
use crate::resolve::find_or_insert_data_file_variables;

/// What reconciliation did with a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FileAction {
    /// No catalogue entry matched; a new data file was inserted.
    Inserted,
    /// Same file, already indexed; only the index time was touched.
    Unchanged,
    /// Symlink to a catalogued file.
    Symlink,
    /// Copy of a catalogued file that still exists elsewhere.
    Copy,
    /// Catalogued file moved; its filename was updated.
    Moved,
    /// Same content and filename, but indexed under another unique id.
    DifferentUniqueId,
    /// Content changed in place; reindexed.
    ContentChanged,
    /// Index older than the file; reindexed.
    Stale,
    /// Moved and modified; reindexed.
    MovedAndChanged,
}

impl FileAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Inserted => "inserted",
            Self::Unchanged => "unchanged",
            Self::Symlink => "symlink",
            Self::Copy => "copy",
            Self::Moved => "moved",
            Self::DifferentUniqueId => "different_unique_id",
            Self::ContentChanged => "content_changed",
            Self::Stale => "stale",
            Self::MovedAndChanged => "moved_and_changed",
        }
    }

    /// True if the existing data file is deleted and indexed again.
    pub fn is_reindex(&self) -> bool {
        matches!(self, Self::ContentChanged | Self::Stale | Self::MovedAndChanged)
    }
}

impl std::fmt::Display for FileAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of reconciling one file.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndexedFile {
    pub data_file: DataFile,
    pub action: FileAction,
}

/// Inputs to the decision table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MatchFlags {
    pub id_match: bool,
    pub hash_match: bool,
    pub filename_match: bool,
    /// The catalogued filename still exists on disk.
    pub old_path_exists: bool,
    /// Catalogued and incoming paths resolve to the same file.
    pub same_target: bool,
    /// The catalogue entry was indexed after the file was last modified.
    pub index_up_to_date: bool,
}

/// Decide the action for a file that matched exactly one data file.
///
/// Rules are tried in order; `None` means the combination is not covered.
pub fn classify(flags: &MatchFlags) -> Option<FileAction> {
    let MatchFlags {
        id_match: id,
        hash_match: hash,
        filename_match: name,
        old_path_exists: old_exists,
        same_target,
        index_up_to_date: up_to_date,
    } = *flags;

    if id && hash && name && up_to_date {
        Some(FileAction::Unchanged)
    } else if id && !name && old_exists && same_target {
        Some(FileAction::Symlink)
    } else if id && hash && !name && old_exists && !same_target {
        Some(FileAction::Copy)
    } else if id && hash && !name && !old_exists && up_to_date {
        Some(FileAction::Moved)
    } else if !id && hash && name {
        Some(FileAction::DifferentUniqueId)
    } else if id && !hash && name {
        Some(FileAction::ContentChanged)
    } else if id && name && !up_to_date {
        Some(FileAction::Stale)
    } else if id && !hash && !name && !old_exists {
        Some(FileAction::MovedAndChanged)
    } else if id && !name && !old_exists && !up_to_date {
        Some(FileAction::MovedAndChanged)
    } else {
        None
    }
}

fn same_target(a: &str, b: &str) -> bool {
    match (Path::new(a).canonicalize(), Path::new(b).canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

fn match_flags(matches: &DataFileMatches, existing: &DataFile, file: &DescribedFile) -> MatchFlags {
    MatchFlags {
        id_match: matches.id_match.is_some(),
        hash_match: matches.hash_match.is_some(),
        filename_match: matches.filename_match.is_some(),
        old_path_exists: Path::new(&existing.filename).exists(),
        same_target: same_target(&existing.filename, &file.path),
        index_up_to_date: existing.index_time > file.modification_time,
    }
}

/// Insert a new data file and all of its variables.
pub async fn index_cf_file(
    conn: &mut SqliteConnection,
    cache: &GeometryCache,
    file: &DescribedFile,
) -> Result<DataFile> {
    let missing = file.missing_fields();
    if !missing.is_empty() {
        return Err(CatalogError::MissingMetadata {
            path: file.path.clone(),
            fields: missing.into_iter().map(String::from).collect(),
        });
    }

    let data_file = insert_data_file(&mut *conn, file).await?;
    let variables =
        find_or_insert_data_file_variables(&mut *conn, cache, file, data_file.data_file_id).await?;

    info!(
        data_file_id = data_file.data_file_id,
        path = %file.path,
        variables = variables.len(),
        "Indexed file"
    );
    Ok(data_file)
}

/// Delete an existing data file (variables and ensemble links included)
/// and index the file again from scratch.
pub async fn reindex_cf_file(
    conn: &mut SqliteConnection,
    cache: &GeometryCache,
    existing: &DataFile,
    file: &DescribedFile,
) -> Result<DataFile> {
    delete_data_file(&mut *conn, existing.data_file_id).await?;
    index_cf_file(conn, cache, file).await
}

/// Find, update, or insert the catalogue entry for a described file.
///
/// All writes go through `conn`; the caller owns the transaction and rolls
/// it back on error.
pub async fn find_update_or_insert_cf_file(
    conn: &mut SqliteConnection,
    cache: &GeometryCache,
    file: &DescribedFile,
) -> Result<IndexedFile> {
    let matches = find_data_file_by_id_hash_filename(&mut *conn, file).await?;

    if matches.is_empty() {
        info!(path = %file.path, unique_id = %file.unique_id, "New file");
        let data_file = index_cf_file(conn, cache, file).await?;
        return Ok(IndexedFile { data_file, action: FileAction::Inserted });
    }

    let existing = match matches.single() {
        Some(existing) => existing.clone(),
        None => {
            let data_file_ids = matches.distinct_ids();
            error!(
                path = %file.path,
                id_match = ?matches.id_match.as_ref().map(|df| df.data_file_id),
                hash_match = ?matches.hash_match.as_ref().map(|df| df.data_file_id),
                filename_match = ?matches.filename_match.as_ref().map(|df| df.data_file_id),
                "Split brain: file is catalogued under more than one data file"
            );
            return Err(CatalogError::SplitBrain { path: file.path.clone(), data_file_ids });
        }
    };

    let flags = match_flags(&matches, &existing, file);
    let Some(action) = classify(&flags) else {
        error!(path = %file.path, ?flags, "Unanticipated case while reconciling file");
        let id_of = |m: &Option<DataFile>| m.as_ref().map(|df| df.data_file_id);
        return Err(CatalogError::UnanticipatedCase {
            path: file.path.clone(),
            id_match: id_of(&matches.id_match),
            hash_match: id_of(&matches.hash_match),
            filename_match: id_of(&matches.filename_match),
            old_path_exists: flags.old_path_exists,
            same_target: flags.same_target,
            index_up_to_date: flags.index_up_to_date,
        });
    };

    let data_file = match action {
        FileAction::Unchanged => {
            info!(path = %file.path, data_file_id = existing.data_file_id, "File unchanged, touching index time");
            touch_index_time(&mut *conn, existing.data_file_id).await?
        }
        FileAction::Symlink => {
            info!(
                path = %file.path,
                target = %existing.filename,
                "File is a symlink to an indexed file, skipping"
            );
            existing
        }
        FileAction::Copy => {
            warn!(
                path = %file.path,
                original = %existing.filename,
                "File is a copy of an indexed file, skipping"
            );
            existing
        }
        FileAction::Moved => {
            info!(from = %existing.filename, to = %file.path, "File moved, updating filename");
            update_filename(&mut *conn, existing.data_file_id, &file.path).await?
        }
        FileAction::DifferentUniqueId => {
            warn!(
                path = %file.path,
                unique_id = %file.unique_id,
                indexed_unique_id = %existing.unique_id,
                "File content is indexed under a different unique id, skipping"
            );
            existing
        }
        // ContentChanged, Stale or MovedAndChanged
        _ => {
            info!(
                path = %file.path,
                data_file_id = existing.data_file_id,
                reason = action.as_str(),
                "Reindexing file"
            );
            reindex_cf_file(conn, cache, &existing, file).await?
        }
    };

    Ok(IndexedFile { data_file, action })
}
