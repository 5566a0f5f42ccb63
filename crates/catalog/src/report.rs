//! Read-only listings and exports of the catalogue.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Component, Path};

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde::Serialize;
use sqlx::{FromRow, QueryBuilder, Sqlite, SqliteConnection};

use crate::error::Result;

/// Number of time steps of concatenated multi-year-mean files (seasons and
/// months, with or without the annual mean).
const MYM_CONCATENATED_NUM_TIMES: [i64; 4] = [5, 13, 16, 17];
const MYM_SINGLE_NUM_TIMES: [i64; 3] = [1, 4, 12];

/// Ensemble name that `manifest` substitutes for `all`.
pub const ALL_FILES_ENSEMBLE: &str = "all_files";

/// Selection criteria for data file listings. `None` means no constraint.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileFilter {
    /// Only files with a variable in this ensemble.
    pub ensemble: Option<String>,
    /// More than one variable (`true`) or exactly one (`false`).
    pub multi_variable: Option<bool>,
    pub multi_year_mean: Option<bool>,
    /// Multi-year-mean files whose time axis is a concatenation of several
    /// climatologies (`true`) or a single one (`false`).
    pub mym_concatenated: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize)]
pub struct FileEnsembles {
    pub filename: String,
    pub ensemble_names: String,
}

#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize)]
pub struct EnsembleCount {
    pub ensemble_name: String,
    pub number: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DirCount {
    pub dir_path: String,
    pub number: i64,
}

fn push_in_list(qb: &mut QueryBuilder<'_, Sqlite>, values: &[i64]) {
    let mut separated = qb.separated(", ");
    for value in values {
        separated.push_bind(*value);
    }
    separated.push_unseparated(")");
}

/// Append the WHERE clause for `filter` to a query over `data_files df`
/// left-joined with `time_sets ts`.
fn push_filter<'a>(qb: &mut QueryBuilder<'a, Sqlite>, filter: &'a FileFilter) {
    qb.push(" WHERE 1 = 1");

    if let Some(ensemble) = &filter.ensemble {
        qb.push(
            " AND EXISTS (SELECT 1 FROM data_file_variables fv \
             JOIN ensemble_data_file_variables fedv \
             ON fedv.data_file_variable_id = fv.data_file_variable_id \
             JOIN ensembles fe ON fe.ensemble_id = fedv.ensemble_id \
             WHERE fv.data_file_id = df.data_file_id AND fe.ensemble_name = ",
        );
        qb.push_bind(ensemble.as_str());
        qb.push(")");
    }

    if let Some(multi_variable) = filter.multi_variable {
        qb.push(
            " AND (SELECT COUNT(*) FROM data_file_variables cv \
             WHERE cv.data_file_id = df.data_file_id)",
        );
        qb.push(if multi_variable { " > 1" } else { " = 1" });
    }

    if let Some(multi_year_mean) = filter.multi_year_mean {
        qb.push(" AND ts.multi_year_mean = ");
        qb.push_bind(multi_year_mean);
    }

    if let Some(concatenated) = filter.mym_concatenated {
        qb.push(" AND ts.multi_year_mean = 1 AND ts.num_times IN (");
        if concatenated {
            push_in_list(qb, &MYM_CONCATENATED_NUM_TIMES);
        } else {
            push_in_list(qb, &MYM_SINGLE_NUM_TIMES);
        }
    }
}

const FILES_FROM: &str =
    " FROM data_files df LEFT JOIN time_sets ts ON ts.time_set_id = df.time_set_id";

/// Filenames of the data files selected by `filter`, sorted.
pub async fn list_filepaths(conn: &mut SqliteConnection, filter: &FileFilter) -> Result<Vec<String>> {
    let mut qb = QueryBuilder::<Sqlite>::new("SELECT df.filename");
    qb.push(FILES_FROM);
    push_filter(&mut qb, filter);
    qb.push(" ORDER BY df.filename");

    let rows: Vec<(String,)> = qb.build_query_as().fetch_all(conn).await?;
    Ok(rows.into_iter().map(|(filename,)| filename).collect())
}

pub async fn count_filepaths(conn: &mut SqliteConnection, filter: &FileFilter) -> Result<i64> {
    let mut qb = QueryBuilder::<Sqlite>::new("SELECT COUNT(*)");
    qb.push(FILES_FROM);
    push_filter(&mut qb, filter);

    let (count,): (i64,) = qb.build_query_as().fetch_one(conn).await?;
    Ok(count)
}

/// Selected files that belong to at least one ensemble, each with its
/// comma-joined ensemble names.
pub async fn list_filepaths_with_ensembles(
    conn: &mut SqliteConnection,
    filter: &FileFilter,
) -> Result<Vec<FileEnsembles>> {
    let mut qb = QueryBuilder::<Sqlite>::new(
        "SELECT df.filename AS filename, group_concat(DISTINCT e.ensemble_name) AS ensemble_names",
    );
    qb.push(FILES_FROM);
    qb.push(
        " JOIN data_file_variables v ON v.data_file_id = df.data_file_id \
         JOIN ensemble_data_file_variables edv ON edv.data_file_variable_id = v.data_file_variable_id \
         JOIN ensembles e ON e.ensemble_id = edv.ensemble_id",
    );
    push_filter(&mut qb, filter);
    qb.push(" GROUP BY df.data_file_id ORDER BY df.filename");

    Ok(qb.build_query_as().fetch_all(conn).await?)
}

/// Number of selected files in each ensemble.
pub async fn count_by_ensemble(
    conn: &mut SqliteConnection,
    filter: &FileFilter,
) -> Result<Vec<EnsembleCount>> {
    let mut qb = QueryBuilder::<Sqlite>::new(
        "SELECT e.ensemble_name AS ensemble_name, COUNT(DISTINCT df.data_file_id) AS number",
    );
    qb.push(FILES_FROM);
    qb.push(
        " JOIN data_file_variables v ON v.data_file_id = df.data_file_id \
         JOIN ensemble_data_file_variables edv ON edv.data_file_variable_id = v.data_file_variable_id \
         JOIN ensembles e ON e.ensemble_id = edv.ensemble_id",
    );
    push_filter(&mut qb, filter);
    qb.push(" GROUP BY e.ensemble_name ORDER BY e.ensemble_name");

    Ok(qb.build_query_as().fetch_all(conn).await?)
}

/// Leading directory of an absolute filename, at most `depth` directories
/// deep, with a trailing slash. Other filenames are returned unchanged.
fn dir_prefix(filename: &str, depth: usize) -> String {
    let path = Path::new(filename);
    if !path.is_absolute() {
        return filename.to_string();
    }

    let dirs: Vec<String> = path
        .parent()
        .map(|parent| {
            parent
                .components()
                .filter_map(|c| match c {
                    Component::Normal(name) => Some(name.to_string_lossy().into_owned()),
                    _ => None,
                })
                .collect()
        })
        .unwrap_or_default();

    if dirs.is_empty() || depth == 0 {
        return filename.to_string();
    }

    let kept = &dirs[..dirs.len().min(depth)];
    format!("/{}/", kept.join("/"))
}

/// Directories of the selected files, truncated to `depth` levels, with the
/// number of files under each.
pub async fn list_dirpaths(
    conn: &mut SqliteConnection,
    filter: &FileFilter,
    depth: usize,
) -> Result<Vec<DirCount>> {
    let mut counts: BTreeMap<String, i64> = BTreeMap::new();
    for filename in list_filepaths(conn, filter).await? {
        *counts.entry(dir_prefix(&filename, depth)).or_default() += 1;
    }

    Ok(counts
        .into_iter()
        .map(|(dir_path, number)| DirCount { dir_path, number })
        .collect())
}

/// Filenames of files in any of `ensembles`, indexed on or after `since`.
pub async fn manifest(
    conn: &mut SqliteConnection,
    ensembles: &[String],
    since: NaiveDate,
) -> Result<Vec<String>> {
    if ensembles.is_empty() {
        return Ok(Vec::new());
    }
    let names: Vec<&str> = if ensembles.len() == 1 && ensembles[0] == "all" {
        vec![ALL_FILES_ENSEMBLE]
    } else {
        ensembles.iter().map(String::as_str).collect()
    };
    let since: DateTime<Utc> = since.and_time(NaiveTime::MIN).and_utc();

    let mut qb = QueryBuilder::<Sqlite>::new(
        "SELECT DISTINCT df.filename FROM data_files df \
         JOIN data_file_variables v ON v.data_file_id = df.data_file_id \
         JOIN ensemble_data_file_variables edv ON edv.data_file_variable_id = v.data_file_variable_id \
         JOIN ensembles e ON e.ensemble_id = edv.ensemble_id \
         WHERE e.ensemble_name IN (",
    );
    let mut separated = qb.separated(", ");
    for name in names {
        separated.push_bind(name);
    }
    separated.push_unseparated(")");
    qb.push(" AND df.index_time >= ");
    qb.push_bind(since);
    qb.push(" ORDER BY df.filename");

    let rows: Vec<(String,)> = qb.build_query_as().fetch_all(conn).await?;
    Ok(rows.into_iter().map(|(filename,)| filename).collect())
}

#[derive(Debug, FromRow)]
struct CsvRow {
    data_file_id: i64,
    filepath: String,
    unique_id: String,
    index_time: DateTime<Utc>,
    run: String,
    model: String,
    emission: String,
    start_date: Option<NaiveDateTime>,
    end_date: Option<NaiveDateTime>,
    multi_year_mean: Option<bool>,
    time_resolution: Option<String>,
    num_times: Option<i64>,
}

/// One line of the CSV export.
#[derive(Debug, Serialize)]
pub struct CsvRecord {
    pub data_file_id: i64,
    pub filepath: String,
    pub unique_id: String,
    pub index_time: DateTime<Utc>,
    pub run: String,
    pub model: String,
    pub emission: String,
    pub variable_names: String,
    pub start_date: Option<NaiveDateTime>,
    pub end_date: Option<NaiveDateTime>,
    pub multi_year_mean: Option<bool>,
    pub time_resolution: Option<String>,
    pub num_times: Option<i64>,
}

/// Write one CSV row per data file, with a header. Returns the row count.
pub async fn export_csv<W: Write>(conn: &mut SqliteConnection, writer: W) -> Result<usize> {
    let rows = sqlx::query_as::<_, CsvRow>(
        "SELECT df.data_file_id, df.filename AS filepath, df.unique_id, df.index_time, \
         r.run_name AS run, m.model_short_name AS model, e.emission_short_name AS emission, \
         ts.start_date, ts.end_date, ts.multi_year_mean, ts.time_resolution, ts.num_times \
         FROM data_files df \
         JOIN runs r ON r.run_id = df.run_id \
         JOIN models m ON m.model_id = r.model_id \
         JOIN emissions e ON e.emission_id = r.emission_id \
         LEFT JOIN time_sets ts ON ts.time_set_id = df.time_set_id \
         ORDER BY df.data_file_id",
    )
    .fetch_all(&mut *conn)
    .await?;

    let mut csv = csv::Writer::from_writer(writer);
    let count = rows.len();

    for row in rows {
        let names: Vec<(String,)> = sqlx::query_as(
            "SELECT netcdf_variable_name FROM data_file_variables \
             WHERE data_file_id = ? ORDER BY data_file_variable_id",
        )
        .bind(row.data_file_id)
        .fetch_all(&mut *conn)
        .await?;
        let variable_names = names.into_iter().map(|(n,)| n).collect::<Vec<_>>().join(", ");

        csv.serialize(CsvRecord {
            data_file_id: row.data_file_id,
            filepath: row.filepath,
            unique_id: row.unique_id,
            index_time: row.index_time,
            run: row.run,
            model: row.model,
            emission: row.emission,
            variable_names,
            start_date: row.start_date,
            end_date: row.end_date,
            multi_year_mean: row.multi_year_mean,
            time_resolution: row.time_resolution,
            num_times: row.num_times,
        })?;
    }

    csv.flush()?;
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dir_prefix_depth() {
        assert_eq!(dir_prefix("/storage/data/climate/f.nc", 2), "/storage/data/");
        assert_eq!(dir_prefix("/storage/data/climate/f.nc", 999), "/storage/data/climate/");
        assert_eq!(dir_prefix("/storage/data/climate/f.nc", 1), "/storage/");
    }

    #[test]
    fn test_dir_prefix_unrooted() {
        assert_eq!(dir_prefix("relative/f.nc", 2), "relative/f.nc");
        assert_eq!(dir_prefix("/f.nc", 2), "/f.nc");
    }
}
