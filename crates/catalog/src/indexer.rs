//! Batch indexing of data files into the catalogue.

use std::path::Path;
use std::sync::Arc;

use tracing::{error, info, warn};

use nc_describe::{DescribedFile, FileDescriber};

use crate::catalog::Catalog;
use crate::error::Result;
use crate::geometry_cache::GeometryCache;
use crate::reconcile::{find_update_or_insert_cf_file, IndexedFile};

/// Indexes files into a catalogue, one transaction per file.
pub struct Indexer {
    catalog: Catalog,
    describer: Arc<dyn FileDescriber>,
    cache: GeometryCache,
}

impl Indexer {
    pub fn new(catalog: Catalog, describer: Arc<dyn FileDescriber>) -> Self {
        Self {
            catalog,
            describer,
            cache: GeometryCache::default(),
        }
    }

    /// Use a geometry cache with a specific capacity and grid tolerance.
    pub fn with_cache(mut self, cache: GeometryCache) -> Self {
        self.cache = cache;
        self
    }

    /// Index several files.
    ///
    /// Failures are logged and reported as `None` at the file's position;
    /// they never stop the remaining files.
    pub async fn index_files<P: AsRef<Path>>(&self, paths: &[P]) -> Vec<Option<IndexedFile>> {
        let mut results = Vec::with_capacity(paths.len());
        let mut failed = 0usize;

        for path in paths {
            let path = path.as_ref();
            match self.index_file(path).await {
                Ok(indexed) => results.push(Some(indexed)),
                Err(e) => {
                    error!(path = %path.display(), error = %e, "Failed to index file");
                    failed += 1;
                    results.push(None);
                }
            }
        }

        info!(files = paths.len(), failed, "Indexing complete");
        results
    }

    /// Describe a file on disk and index it.
    pub async fn index_file(&self, path: &Path) -> Result<IndexedFile> {
        info!(path = %path.display(), "Processing file");
        let file = self.describer.describe(path)?;
        self.index_described(&file).await
    }

    /// Index an already described file in its own transaction.
    ///
    /// A uniqueness violation means another writer catalogued the same file
    /// concurrently; the file is classified again once before giving up.
    pub async fn index_described(&self, file: &DescribedFile) -> Result<IndexedFile> {
        match self.reconcile(file).await {
            Err(e) if e.is_unique_violation() => {
                warn!(path = %file.path, error = %e, "Concurrent insert detected, classifying again");
                self.reconcile(file).await
            }
            result => result,
        }
    }

    async fn reconcile(&self, file: &DescribedFile) -> Result<IndexedFile> {
        let mut tx = self.catalog.begin().await?;
        match find_update_or_insert_cf_file(&mut *tx, &self.cache, file).await {
            Ok(indexed) => {
                tx.commit().await?;
                Ok(indexed)
            }
            Err(e) => {
                if let Err(rollback) = tx.rollback().await {
                    warn!(path = %file.path, error = %rollback, "Failed to roll back");
                }
                Err(e)
            }
        }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn cache(&self) -> &GeometryCache {
        &self.cache
    }
}
