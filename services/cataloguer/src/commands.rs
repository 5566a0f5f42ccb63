//! Subcommand implementations. Results go to stdout, logs to stderr.

use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use tracing::info;

use catalog::{
    associate_ensemble_to_filepaths, find_or_insert_ensemble, report, Catalog, FileFilter,
    GeometryCache, Indexer,
};
use nc_describe::SidecarDescriber;

use crate::config::CataloguerConfig;

/// Open the configured catalogue and bring its schema up to date.
pub async fn open_catalog(config: &CataloguerConfig) -> Result<Catalog> {
    let path = Path::new(&config.database_url);
    let catalog = Catalog::open(path)
        .await
        .with_context(|| format!("Failed to open catalogue {}", path.display()))?;
    catalog.migrate().await?;
    Ok(catalog)
}

/// Index files and print one `action<TAB>path` line per file.
pub async fn index(catalog: Catalog, config: &CataloguerConfig, files: &[PathBuf]) -> Result<()> {
    let cache = GeometryCache::new(config.geometry_cache_size, config.grid_tolerance);
    let indexer = Indexer::new(catalog, Arc::new(SidecarDescriber::new())).with_cache(cache);

    let results = indexer.index_files(files).await;

    let mut out = io::stdout().lock();
    let mut failed = 0usize;
    for (path, result) in files.iter().zip(&results) {
        match result {
            Some(indexed) => writeln!(out, "{}\t{}", indexed.action, indexed.data_file.filename)?,
            None => {
                failed += 1;
                writeln!(out, "failed\t{}", path.display())?;
            }
        }
    }

    let stats = indexer.cache().stats().await;
    info!(
        hits = stats.hits,
        misses = stats.misses,
        hit_rate = stats.hit_rate(),
        "Geometry cache"
    );

    if failed > 0 {
        bail!("{failed} of {} files could not be indexed", files.len());
    }
    Ok(())
}

pub async fn create_ensemble(
    catalog: &Catalog,
    name: &str,
    version: f64,
    description: Option<&str>,
    changes: &str,
) -> Result<()> {
    let mut tx = catalog.begin().await?;
    let ensemble = find_or_insert_ensemble(&mut tx, name, version, description, changes).await?;
    tx.commit().await?;

    println!("{}\t{}\t{}", ensemble.ensemble_id, ensemble.ensemble_name, ensemble.version);
    Ok(())
}

/// Associate and print one `path<TAB>variable count` line per matched file.
pub async fn associate(
    catalog: &Catalog,
    name: &str,
    version: f64,
    paths: &[String],
    is_regex: bool,
    variables: &[String],
) -> Result<()> {
    let results = associate_ensemble_to_filepaths(catalog, name, version, paths, is_regex, variables).await?;

    let mut out = io::stdout().lock();
    let mut failed = 0usize;
    for (pattern, result) in paths.iter().zip(&results) {
        match result {
            Some(outcomes) => {
                for outcome in outcomes {
                    match &outcome.variables {
                        Some(variables) => {
                            writeln!(out, "{}\t{}", outcome.data_file.filename, variables.len())?
                        }
                        None => {
                            failed += 1;
                            writeln!(out, "failed\t{}", outcome.data_file.filename)?;
                        }
                    }
                }
            }
            None => {
                failed += 1;
                writeln!(out, "failed\t{pattern}")?;
            }
        }
    }

    if failed > 0 {
        bail!("{failed} paths or files could not be associated");
    }
    Ok(())
}

/// What `list` prints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListMode {
    Files,
    WithEnsembles,
    Count { by_ensemble: bool },
    Dirs { depth: usize },
}

pub async fn list(catalog: &Catalog, filter: &FileFilter, mode: ListMode) -> Result<()> {
    let mut conn = catalog.pool().acquire().await?;
    let mut out = io::stdout().lock();

    match mode {
        ListMode::Files => {
            for filename in report::list_filepaths(&mut conn, filter).await? {
                writeln!(out, "{filename}")?;
            }
        }
        ListMode::WithEnsembles => {
            for row in report::list_filepaths_with_ensembles(&mut conn, filter).await? {
                writeln!(out, "{}\t{}", row.filename, row.ensemble_names)?;
            }
        }
        ListMode::Count { by_ensemble: false } => {
            writeln!(out, "{}", report::count_filepaths(&mut conn, filter).await?)?;
        }
        ListMode::Count { by_ensemble: true } => {
            for row in report::count_by_ensemble(&mut conn, filter).await? {
                writeln!(out, "{}\t{}", row.ensemble_name, row.number)?;
            }
        }
        ListMode::Dirs { depth } => {
            for row in report::list_dirpaths(&mut conn, filter, depth).await? {
                writeln!(out, "{}\t{}", row.dir_path, row.number)?;
            }
        }
    }
    Ok(())
}

pub async fn manifest(catalog: &Catalog, ensembles: &[String], since: NaiveDate) -> Result<()> {
    let mut conn = catalog.pool().acquire().await?;
    let mut out = io::stdout().lock();
    for filename in report::manifest(&mut conn, ensembles, since).await? {
        writeln!(out, "{filename}")?;
    }
    Ok(())
}

pub async fn export_csv(catalog: &Catalog, output: Option<&Path>) -> Result<()> {
    let writer: Box<dyn Write> = match output {
        Some(path) => Box::new(
            File::create(path).with_context(|| format!("Failed to create {}", path.display()))?,
        ),
        None => Box::new(io::stdout()),
    };

    let mut conn = catalog.pool().acquire().await?;
    let rows = report::export_csv(&mut conn, writer).await?;
    info!(rows, "Exported catalogue");
    Ok(())
}
