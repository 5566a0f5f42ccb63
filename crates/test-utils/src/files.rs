//! Real files on disk for tests that depend on the filesystem.

use std::path::{Path, PathBuf};

use nc_describe::DescribedFile;

/// Creates a temporary directory, removed when the returned `TempDir` drops.
pub fn temp_test_dir() -> tempfile::TempDir {
    tempfile::Builder::new()
        .prefix("modelmeta_test_")
        .tempdir()
        .expect("Failed to create temporary test directory")
}

/// Sidecar document holding the metadata part of `file`.
pub fn sidecar_json(file: &DescribedFile) -> String {
    let doc = serde_json::json!({
        "unique_id": file.unique_id,
        "provenance": file.provenance,
        "dim_names": file.dim_names,
        "time": file.time,
        "variables": file.variables,
    });
    serde_json::to_string_pretty(&doc).expect("Failed to serialize sidecar")
}

/// Write a data file with `contents` plus its `.json` sidecar describing
/// `file`, and return the data file's path.
///
/// The identity fields of `file` are ignored; a describer derives them from
/// the written file.
pub fn write_data_file(dir: &Path, name: &str, contents: &[u8], file: &DescribedFile) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, contents).expect("Failed to write data file");
    write_sidecar(&path, file);
    path
}

/// Write the `.json` sidecar for an existing data file path.
pub fn write_sidecar(path: &Path, file: &DescribedFile) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".json");
    let sidecar = PathBuf::from(name);
    std::fs::write(&sidecar, sidecar_json(file)).expect("Failed to write sidecar");
    sidecar
}
