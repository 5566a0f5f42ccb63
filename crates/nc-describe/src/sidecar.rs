//! Reading descriptions from JSON documents stored beside data files.

use std::fs::File;
use std::io::Read;
use std::path::{Component, Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::described::{AxisDimNames, DescribedFile, Provenance, TimeAxis, VariableDescription};
use crate::error::{DescribeError, DescribeResult};

/// Number of leading bytes covered by the content hash.
pub const CONTENT_HASH_BYTES: u64 = 1024 * 1024;

/// Produces a [`DescribedFile`] for a path on disk.
pub trait FileDescriber: Send + Sync {
    fn describe(&self, path: &Path) -> DescribeResult<DescribedFile>;
}

/// Metadata part of a description, as stored in a sidecar document.
#[derive(Debug, Deserialize)]
struct SidecarDocument {
    unique_id: String,
    provenance: Provenance,
    #[serde(default)]
    dim_names: AxisDimNames,
    #[serde(default)]
    time: Option<TimeAxis>,
    variables: Vec<VariableDescription>,
}

/// Describes `foo.nc` from `foo.nc.json`.
///
/// File identity (absolute path, content hash, modification time) always
/// comes from the data file itself, never from the document. Symlinks in
/// the path are kept as given.
#[derive(Debug, Clone)]
pub struct SidecarDescriber {
    extension: String,
}

impl Default for SidecarDescriber {
    fn default() -> Self {
        Self {
            extension: "json".to_string(),
        }
    }
}

impl SidecarDescriber {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_extension(extension: impl Into<String>) -> Self {
        Self {
            extension: extension.into(),
        }
    }

    pub fn sidecar_path(&self, path: &Path) -> PathBuf {
        let mut name = path.as_os_str().to_owned();
        name.push(".");
        name.push(&self.extension);
        PathBuf::from(name)
    }
}

impl FileDescriber for SidecarDescriber {
    fn describe(&self, path: &Path) -> DescribeResult<DescribedFile> {
        let absolute = absolute_path(path)?;
        let modification_time = modification_time(&absolute)?;
        let content_hash = hash_first_mib(&absolute)?;

        let sidecar = self.sidecar_path(path);
        let text = std::fs::read_to_string(&sidecar).map_err(|e| DescribeError::io(e, &sidecar))?;
        let doc: SidecarDocument = serde_json::from_str(&text).map_err(|source| DescribeError::Json {
            path: sidecar.clone(),
            source,
        })?;

        debug!(
            path = %absolute.display(),
            sidecar = %sidecar.display(),
            variables = doc.variables.len(),
            "Described file"
        );

        Ok(DescribedFile {
            path: absolute.to_string_lossy().into_owned(),
            unique_id: doc.unique_id,
            content_hash,
            modification_time,
            provenance: doc.provenance,
            dim_names: doc.dim_names,
            time: doc.time,
            variables: doc.variables,
        })
    }
}

/// `path` joined onto the working directory when relative, with `.` and
/// `..` components folded lexically. Unlike `canonicalize`, symlinks are
/// not resolved.
pub fn absolute_path(path: &Path) -> DescribeResult<PathBuf> {
    if path.is_absolute() {
        return Ok(normalize_lexically(path));
    }
    let cwd = std::env::current_dir().map_err(|e| DescribeError::io(e, path))?;
    Ok(normalize_lexically(&cwd.join(path)))
}

fn normalize_lexically(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            // `..` at the root stays at the root
            Component::ParentDir => {
                normalized.pop();
            }
            other => normalized.push(other.as_os_str()),
        }
    }
    normalized
}

/// SHA-256 (lowercase hex) of the first MiB of a file.
pub fn hash_first_mib(path: impl AsRef<Path>) -> DescribeResult<String> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| DescribeError::io(e, path))?;

    let mut buffer = Vec::with_capacity(CONTENT_HASH_BYTES as usize);
    file.take(CONTENT_HASH_BYTES)
        .read_to_end(&mut buffer)
        .map_err(|e| DescribeError::io(e, path))?;

    let mut hasher = Sha256::new();
    hasher.update(&buffer);
    Ok(hex::encode(hasher.finalize()))
}

/// Last modification time of a file.
pub fn modification_time(path: impl AsRef<Path>) -> DescribeResult<DateTime<Utc>> {
    let path = path.as_ref();
    let modified = std::fs::metadata(path)
        .and_then(|m| m.modified())
        .map_err(|e| DescribeError::io(e, path))?;
    Ok(DateTime::<Utc>::from(modified))
}
