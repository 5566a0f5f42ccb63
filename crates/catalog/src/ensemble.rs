//! Ensembles and their association to data file variables.

use regex::Regex;
use serde::Serialize;
use sqlx::SqliteConnection;
use tracing::{debug, error, info, warn};

use crate::catalog::Catalog;
use crate::error::{CatalogError, Result};
use crate::models::{DataFile, DataFileVariable, Ensemble, EnsembleDataFileVariable};
use crate::resolve::load_data_file_variables;

const ENSEMBLE_COLUMNS: &str = "ensemble_id, ensemble_name, version, ensemble_description, changes";

/// Variables of one data file associated to an ensemble.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileAssociation {
    pub data_file: DataFile,
    pub variables: Vec<DataFileVariable>,
}

pub async fn find_ensemble(conn: &mut SqliteConnection, name: &str, version: f64) -> Result<Option<Ensemble>> {
    let ensemble = sqlx::query_as::<_, Ensemble>(&format!(
        "SELECT {ENSEMBLE_COLUMNS} FROM ensembles WHERE ensemble_name = ? AND version = ?"
    ))
    .bind(name)
    .bind(version)
    .fetch_optional(conn)
    .await?;
    Ok(ensemble)
}

pub async fn insert_ensemble(
    conn: &mut SqliteConnection,
    name: &str,
    version: f64,
    description: Option<&str>,
    changes: &str,
) -> Result<Ensemble> {
    let ensemble = sqlx::query_as::<_, Ensemble>(&format!(
        "INSERT INTO ensembles (ensemble_name, version, ensemble_description, changes) \
         VALUES (?, ?, ?, ?) RETURNING {ENSEMBLE_COLUMNS}"
    ))
    .bind(name)
    .bind(version)
    .bind(description)
    .bind(changes)
    .fetch_one(conn)
    .await?;

    info!(ensemble = name, version, ensemble_id = ensemble.ensemble_id, "Created ensemble");
    Ok(ensemble)
}

/// Existing ensemble with this name and version, else a new one.
/// Description and changes only apply when inserting.
pub async fn find_or_insert_ensemble(
    conn: &mut SqliteConnection,
    name: &str,
    version: f64,
    description: Option<&str>,
    changes: &str,
) -> Result<Ensemble> {
    if let Some(ensemble) = find_ensemble(&mut *conn, name, version).await? {
        return Ok(ensemble);
    }
    insert_ensemble(conn, name, version, description, changes).await
}

/// Associate one variable; a no-op if the association already exists.
pub async fn associate_to_variable(
    conn: &mut SqliteConnection,
    ensemble: &Ensemble,
    variable: &DataFileVariable,
) -> Result<EnsembleDataFileVariable> {
    let inserted = sqlx::query(
        "INSERT OR IGNORE INTO ensemble_data_file_variables (ensemble_id, data_file_variable_id) \
         VALUES (?, ?)",
    )
    .bind(ensemble.ensemble_id)
    .bind(variable.data_file_variable_id)
    .execute(&mut *conn)
    .await?
    .rows_affected();

    if inserted == 0 {
        debug!(
            ensemble_id = ensemble.ensemble_id,
            data_file_variable_id = variable.data_file_variable_id,
            "Association already exists"
        );
    } else {
        debug!(
            ensemble_id = ensemble.ensemble_id,
            data_file_variable_id = variable.data_file_variable_id,
            "Associated variable to ensemble"
        );
    }

    let association = sqlx::query_as::<_, EnsembleDataFileVariable>(
        "SELECT ensemble_id, data_file_variable_id FROM ensemble_data_file_variables \
         WHERE ensemble_id = ? AND data_file_variable_id = ?",
    )
    .bind(ensemble.ensemble_id)
    .bind(variable.data_file_variable_id)
    .fetch_one(conn)
    .await?;
    Ok(association)
}

/// Associate the variables of a data file whose names are in
/// `variable_names`, or all of them when `variable_names` is empty.
/// Returns the variables associated.
pub async fn associate_to_data_file(
    conn: &mut SqliteConnection,
    ensemble: &Ensemble,
    data_file: &DataFile,
    variable_names: &[String],
) -> Result<Vec<DataFileVariable>> {
    let variables = load_data_file_variables(&mut *conn, data_file.data_file_id).await?;

    let mut associated = Vec::new();
    for variable in variables {
        if !variable_names.is_empty() && !variable_names.contains(&variable.netcdf_variable_name) {
            continue;
        }
        associate_to_variable(&mut *conn, ensemble, &variable).await?;
        associated.push(variable);
    }
    Ok(associated)
}

async fn data_files_matching(
    conn: &mut SqliteConnection,
    filepath: &str,
    is_regex: bool,
) -> Result<Vec<DataFile>> {
    const SELECT: &str = "SELECT data_file_id, filename, first_1mib_hash, unique_id, \
                          x_dim_name, y_dim_name, z_dim_name, t_dim_name, \
                          index_time, run_id, time_set_id FROM data_files";

    if !is_regex {
        let data_files = sqlx::query_as::<_, DataFile>(&format!(
            "{SELECT} WHERE filename = ? ORDER BY data_file_id"
        ))
        .bind(filepath)
        .fetch_all(conn)
        .await?;
        return Ok(data_files);
    }

    let pattern = Regex::new(filepath)?;
    let data_files = sqlx::query_as::<_, DataFile>(&format!("{SELECT} ORDER BY data_file_id"))
        .fetch_all(conn)
        .await?;
    Ok(data_files
        .into_iter()
        .filter(|df| pattern.is_match(&df.filename))
        .collect())
}

/// Associate an existing ensemble to every data file whose filename equals
/// `filepath`, or matches it as a regular expression when `is_regex`.
pub async fn associate_to_filepath(
    conn: &mut SqliteConnection,
    ensemble_name: &str,
    ensemble_version: f64,
    filepath: &str,
    is_regex: bool,
    variable_names: &[String],
) -> Result<Vec<FileAssociation>> {
    let ensemble = find_ensemble(&mut *conn, ensemble_name, ensemble_version)
        .await?
        .ok_or_else(|| CatalogError::EnsembleNotFound {
            name: ensemble_name.to_string(),
            version: ensemble_version,
        })?;

    let data_files = data_files_matching(&mut *conn, filepath, is_regex).await?;
    if data_files.is_empty() {
        warn!(filepath, is_regex, "No indexed files match");
        return Ok(Vec::new());
    }

    let mut results = Vec::with_capacity(data_files.len());
    for data_file in data_files {
        let variables = associate_to_data_file(&mut *conn, &ensemble, &data_file, variable_names).await?;
        info!(
            ensemble = ensemble_name,
            version = ensemble_version,
            path = %data_file.filename,
            variables = variables.len(),
            "Associated file to ensemble"
        );
        results.push(FileAssociation { data_file, variables });
    }
    Ok(results)
}

/// Outcome for one data file of a batch association. `variables` is
/// `None` when the file's transaction failed and was rolled back.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AssociationOutcome {
    pub data_file: DataFile,
    pub variables: Option<Vec<DataFileVariable>>,
}

/// Associate an ensemble to several filepaths or patterns, one transaction
/// per matched data file.
///
/// A pattern that cannot be matched (an invalid regex, say) shows up as
/// `None`. A storage failure on one file is logged and rolled back and
/// leaves the other files of the pattern associated. A missing ensemble
/// aborts the whole batch.
pub async fn associate_ensemble_to_filepaths(
    catalog: &Catalog,
    ensemble_name: &str,
    ensemble_version: f64,
    filepaths: &[String],
    is_regex: bool,
    variable_names: &[String],
) -> Result<Vec<Option<Vec<AssociationOutcome>>>> {
    let ensemble = {
        let mut conn = catalog.pool().acquire().await?;
        find_ensemble(&mut conn, ensemble_name, ensemble_version)
            .await?
            .ok_or_else(|| CatalogError::EnsembleNotFound {
                name: ensemble_name.to_string(),
                version: ensemble_version,
            })?
    };

    let mut results = Vec::with_capacity(filepaths.len());
    for filepath in filepaths {
        let matched = {
            let mut conn = catalog.pool().acquire().await?;
            data_files_matching(&mut conn, filepath, is_regex).await
        };
        let data_files = match matched {
            Ok(data_files) => data_files,
            Err(e) => {
                error!(filepath = %filepath, error = %e, "Failed to match filepath");
                results.push(None);
                continue;
            }
        };
        if data_files.is_empty() {
            warn!(filepath = %filepath, is_regex, "No indexed files match");
        }

        let mut outcomes = Vec::with_capacity(data_files.len());
        for data_file in data_files {
            let variables = match associate_in_transaction(catalog, &ensemble, &data_file, variable_names).await {
                Ok(variables) => {
                    info!(
                        ensemble = ensemble_name,
                        version = ensemble_version,
                        path = %data_file.filename,
                        variables = variables.len(),
                        "Associated file to ensemble"
                    );
                    Some(variables)
                }
                Err(e) => {
                    error!(path = %data_file.filename, error = %e, "Failed to associate ensemble");
                    None
                }
            };
            outcomes.push(AssociationOutcome { data_file, variables });
        }
        results.push(Some(outcomes));
    }

    Ok(results)
}

async fn associate_in_transaction(
    catalog: &Catalog,
    ensemble: &Ensemble,
    data_file: &DataFile,
    variable_names: &[String],
) -> Result<Vec<DataFileVariable>> {
    let mut tx = catalog.begin().await?;
    match associate_to_data_file(&mut *tx, ensemble, data_file, variable_names).await {
        Ok(variables) => {
            tx.commit().await?;
            Ok(variables)
        }
        Err(e) => {
            if let Err(rollback) = tx.rollback().await {
                warn!(path = %data_file.filename, error = %rollback, "Failed to roll back");
            }
            Err(e)
        }
    }
}
