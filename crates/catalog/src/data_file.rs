//! DataFile rows.

use chrono::Utc;
use sqlx::SqliteConnection;
use tracing::info;

use nc_describe::DescribedFile;

use crate::error::Result;
use crate::models::DataFile;
use crate::resolve::{find_or_insert_run, find_or_insert_time_set};

const DATA_FILE_COLUMNS: &str = "data_file_id, filename, first_1mib_hash, unique_id, \
                                 x_dim_name, y_dim_name, z_dim_name, t_dim_name, \
                                 index_time, run_id, time_set_id";

/// Existing data files matching a description by unique id, content hash
/// and filename, each looked up independently.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DataFileMatches {
    pub id_match: Option<DataFile>,
    pub hash_match: Option<DataFile>,
    pub filename_match: Option<DataFile>,
}

impl DataFileMatches {
    pub fn is_empty(&self) -> bool {
        self.id_match.is_none() && self.hash_match.is_none() && self.filename_match.is_none()
    }

    /// Distinct data file ids among the matches, ascending.
    pub fn distinct_ids(&self) -> Vec<i64> {
        let mut ids: Vec<i64> = [&self.id_match, &self.hash_match, &self.filename_match]
            .into_iter()
            .flatten()
            .map(|df| df.data_file_id)
            .collect();
        ids.sort_unstable();
        ids.dedup();
        ids
    }

    /// The single matched data file, if exactly one distinct row matched.
    pub fn single(&self) -> Option<&DataFile> {
        if self.distinct_ids().len() != 1 {
            return None;
        }
        self.id_match
            .as_ref()
            .or(self.hash_match.as_ref())
            .or(self.filename_match.as_ref())
    }
}

async fn find_by_column(conn: &mut SqliteConnection, column: &str, value: &str) -> Result<Option<DataFile>> {
    let data_file = sqlx::query_as::<_, DataFile>(&format!(
        "SELECT {DATA_FILE_COLUMNS} FROM data_files WHERE {column} = ? ORDER BY data_file_id LIMIT 1"
    ))
    .bind(value)
    .fetch_optional(conn)
    .await?;
    Ok(data_file)
}

pub async fn find_by_unique_id(conn: &mut SqliteConnection, unique_id: &str) -> Result<Option<DataFile>> {
    find_by_column(conn, "unique_id", unique_id).await
}

pub async fn find_by_hash(conn: &mut SqliteConnection, content_hash: &str) -> Result<Option<DataFile>> {
    find_by_column(conn, "first_1mib_hash", content_hash).await
}

pub async fn find_by_filename(conn: &mut SqliteConnection, filename: &str) -> Result<Option<DataFile>> {
    find_by_column(conn, "filename", filename).await
}

pub async fn find_data_file_by_id_hash_filename(
    conn: &mut SqliteConnection,
    file: &DescribedFile,
) -> Result<DataFileMatches> {
    Ok(DataFileMatches {
        id_match: find_by_unique_id(&mut *conn, &file.unique_id).await?,
        hash_match: find_by_hash(&mut *conn, &file.content_hash).await?,
        filename_match: find_by_filename(&mut *conn, &file.path).await?,
    })
}

pub async fn get_data_file(conn: &mut SqliteConnection, data_file_id: i64) -> Result<Option<DataFile>> {
    let data_file = sqlx::query_as::<_, DataFile>(&format!(
        "SELECT {DATA_FILE_COLUMNS} FROM data_files WHERE data_file_id = ?"
    ))
    .bind(data_file_id)
    .fetch_optional(conn)
    .await?;
    Ok(data_file)
}

/// Insert a DataFile row (no variables) after resolving its TimeSet and Run.
pub async fn insert_data_file(conn: &mut SqliteConnection, file: &DescribedFile) -> Result<DataFile> {
    let time_set = find_or_insert_time_set(&mut *conn, file).await?;
    let run = find_or_insert_run(&mut *conn, &file.provenance).await?;

    info!(unique_id = %file.unique_id, path = %file.path, "Creating new data file");

    let data_file = sqlx::query_as::<_, DataFile>(&format!(
        "INSERT INTO data_files (filename, first_1mib_hash, unique_id, \
         x_dim_name, y_dim_name, z_dim_name, t_dim_name, index_time, run_id, time_set_id) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?) RETURNING {DATA_FILE_COLUMNS}"
    ))
    .bind(&file.path)
    .bind(&file.content_hash)
    .bind(&file.unique_id)
    .bind(&file.dim_names.x)
    .bind(&file.dim_names.y)
    .bind(&file.dim_names.z)
    .bind(&file.dim_names.t)
    .bind(Utc::now())
    .bind(run.run_id)
    .bind(time_set.map(|ts| ts.time_set_id))
    .fetch_one(conn)
    .await?;

    Ok(data_file)
}

/// Delete a DataFile. Its variables, their ensemble associations and
/// station links go with it; shared reference data stays.
pub async fn delete_data_file(conn: &mut SqliteConnection, data_file_id: i64) -> Result<()> {
    sqlx::query("DELETE FROM data_files WHERE data_file_id = ?")
        .bind(data_file_id)
        .execute(conn)
        .await?;
    Ok(())
}

/// Set `index_time` to now.
pub async fn touch_index_time(conn: &mut SqliteConnection, data_file_id: i64) -> Result<DataFile> {
    let data_file = sqlx::query_as::<_, DataFile>(&format!(
        "UPDATE data_files SET index_time = ? WHERE data_file_id = ? RETURNING {DATA_FILE_COLUMNS}"
    ))
    .bind(Utc::now())
    .bind(data_file_id)
    .fetch_one(conn)
    .await?;
    Ok(data_file)
}

pub async fn update_filename(
    conn: &mut SqliteConnection,
    data_file_id: i64,
    filename: &str,
) -> Result<DataFile> {
    let data_file = sqlx::query_as::<_, DataFile>(&format!(
        "UPDATE data_files SET filename = ? WHERE data_file_id = ? RETURNING {DATA_FILE_COLUMNS}"
    ))
    .bind(filename)
    .bind(data_file_id)
    .fetch_one(conn)
    .await?;
    Ok(data_file)
}
