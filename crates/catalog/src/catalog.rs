//! Catalogue database handle and schema.

use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::{Sqlite, Transaction};
use tracing::info;

use meta_common::{proj4_to_wkt, DEFAULT_PROJ4, WGS84_SRID};

use crate::error::Result;

/// How long a writer waits for another connection's write lock.
const BUSY_TIMEOUT: Duration = Duration::from_secs(30);

/// Connection pool for a modelmeta database.
#[derive(Debug, Clone)]
pub struct Catalog {
    pool: SqlitePool,
}

impl Catalog {
    /// Open or create the catalogue database at the given path.
    pub async fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .foreign_keys(true)
            .busy_timeout(BUSY_TIMEOUT);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        info!(path = %path.display(), "Opened catalogue");
        Ok(Self { pool })
    }

    /// Open a private in-memory catalogue.
    ///
    /// Every connection to `:memory:` is a separate database, so the pool
    /// holds exactly one connection and never recycles it.
    pub async fn open_memory() -> Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Start a transaction for one unit of work.
    ///
    /// The write lock is taken up front, so concurrent writers queue on the
    /// busy timeout rather than deadlocking on a read-to-write upgrade.
    pub async fn begin(&self) -> Result<Transaction<'static, Sqlite>> {
        Ok(self.pool.begin_with("BEGIN IMMEDIATE").await?)
    }

    /// Create all tables and seed the well-known spatial reference systems.
    pub async fn migrate(&self) -> Result<()> {
        for statement in SCHEMA_SQL.split(';') {
            let trimmed = statement.trim();
            if !trimmed.is_empty() {
                sqlx::query(trimmed).execute(&self.pool).await?;
            }
        }

        let wkt = proj4_to_wkt(Some(DEFAULT_PROJ4))?;
        sqlx::query(
            "INSERT OR IGNORE INTO spatial_ref_sys (srid, auth_name, auth_srid, srtext, proj4text) \
             VALUES (?, 'EPSG', ?, ?, ?)",
        )
        .bind(WGS84_SRID)
        .bind(WGS84_SRID)
        .bind(wkt)
        .bind(DEFAULT_PROJ4)
        .execute(&self.pool)
        .await?;

        info!("Catalogue schema is up to date");
        Ok(())
    }
}

const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS models (
    model_id INTEGER PRIMARY KEY,
    model_short_name TEXT NOT NULL UNIQUE,
    model_long_name TEXT,
    model_organization TEXT,
    type TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS emissions (
    emission_id INTEGER PRIMARY KEY,
    emission_short_name TEXT NOT NULL UNIQUE,
    emission_long_name TEXT
);

CREATE TABLE IF NOT EXISTS runs (
    run_id INTEGER PRIMARY KEY,
    run_name TEXT NOT NULL,
    project TEXT,
    model_id INTEGER NOT NULL REFERENCES models(model_id),
    emission_id INTEGER NOT NULL REFERENCES emissions(emission_id),
    driving_run_id INTEGER REFERENCES runs(run_id) ON DELETE SET NULL,
    initialized_from_id INTEGER REFERENCES runs(run_id) ON DELETE SET NULL,
    UNIQUE (run_name, model_id, emission_id)
);

CREATE TABLE IF NOT EXISTS time_sets (
    time_set_id INTEGER PRIMARY KEY,
    calendar TEXT NOT NULL,
    start_date TEXT NOT NULL,
    end_date TEXT NOT NULL,
    multi_year_mean BOOLEAN NOT NULL,
    num_times INTEGER NOT NULL,
    time_resolution TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS times (
    time_set_id INTEGER NOT NULL REFERENCES time_sets(time_set_id) ON DELETE CASCADE,
    time_idx INTEGER NOT NULL,
    timestep TEXT NOT NULL,
    PRIMARY KEY (time_set_id, time_idx)
);

CREATE TABLE IF NOT EXISTS climatological_times (
    time_set_id INTEGER NOT NULL REFERENCES time_sets(time_set_id) ON DELETE CASCADE,
    time_idx INTEGER NOT NULL,
    time_start TEXT NOT NULL,
    time_end TEXT NOT NULL,
    PRIMARY KEY (time_set_id, time_idx)
);

CREATE TABLE IF NOT EXISTS data_files (
    data_file_id INTEGER PRIMARY KEY,
    filename TEXT NOT NULL,
    first_1mib_hash TEXT NOT NULL,
    unique_id TEXT NOT NULL UNIQUE,
    x_dim_name TEXT,
    y_dim_name TEXT,
    z_dim_name TEXT,
    t_dim_name TEXT,
    index_time TEXT NOT NULL,
    run_id INTEGER NOT NULL REFERENCES runs(run_id),
    time_set_id INTEGER REFERENCES time_sets(time_set_id)
);

CREATE INDEX IF NOT EXISTS idx_data_files_filename ON data_files(filename);

CREATE INDEX IF NOT EXISTS idx_data_files_hash ON data_files(first_1mib_hash);

CREATE TABLE IF NOT EXISTS variable_aliases (
    variable_alias_id INTEGER PRIMARY KEY,
    variable_long_name TEXT NOT NULL,
    variable_standard_name TEXT,
    variable_units TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS level_sets (
    level_set_id INTEGER PRIMARY KEY,
    level_units TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS levels (
    level_set_id INTEGER NOT NULL REFERENCES level_sets(level_set_id) ON DELETE CASCADE,
    level_idx INTEGER NOT NULL,
    vertical_level REAL NOT NULL,
    level_start REAL,
    level_end REAL,
    PRIMARY KEY (level_set_id, level_idx)
);

CREATE TABLE IF NOT EXISTS spatial_ref_sys (
    srid INTEGER PRIMARY KEY,
    auth_name TEXT,
    auth_srid INTEGER,
    srtext TEXT,
    proj4text TEXT
);

CREATE INDEX IF NOT EXISTS idx_spatial_ref_sys_srtext ON spatial_ref_sys(srtext);

CREATE TABLE IF NOT EXISTS grids (
    grid_id INTEGER PRIMARY KEY,
    grid_name TEXT,
    cell_avg_area_sq_km REAL,
    evenly_spaced_y BOOLEAN NOT NULL,
    xc_count INTEGER NOT NULL,
    xc_grid_step REAL NOT NULL,
    xc_origin REAL NOT NULL,
    xc_units TEXT NOT NULL,
    yc_count INTEGER NOT NULL,
    yc_grid_step REAL NOT NULL,
    yc_origin REAL NOT NULL,
    yc_units TEXT NOT NULL,
    srid INTEGER NOT NULL REFERENCES spatial_ref_sys(srid)
);

CREATE TABLE IF NOT EXISTS y_cell_bounds (
    grid_id INTEGER NOT NULL REFERENCES grids(grid_id) ON DELETE CASCADE,
    y_center REAL NOT NULL,
    bottom_bnd REAL,
    top_bnd REAL,
    PRIMARY KEY (grid_id, y_center)
);

CREATE TABLE IF NOT EXISTS stations (
    station_id INTEGER PRIMARY KEY,
    name TEXT,
    long_name TEXT,
    x REAL NOT NULL,
    x_units TEXT NOT NULL,
    y REAL NOT NULL,
    y_units TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS data_file_variables (
    data_file_variable_id INTEGER PRIMARY KEY,
    data_file_id INTEGER NOT NULL REFERENCES data_files(data_file_id) ON DELETE CASCADE,
    variable_alias_id INTEGER NOT NULL REFERENCES variable_aliases(variable_alias_id),
    geometry_type TEXT NOT NULL,
    derivation_method TEXT,
    variable_cell_methods TEXT,
    netcdf_variable_name TEXT NOT NULL,
    disabled BOOLEAN NOT NULL DEFAULT 0,
    range_min REAL NOT NULL,
    range_max REAL NOT NULL,
    UNIQUE (data_file_id, netcdf_variable_name)
);

CREATE TABLE IF NOT EXISTS data_file_variables_gridded (
    data_file_variable_gridded_id INTEGER PRIMARY KEY
        REFERENCES data_file_variables(data_file_variable_id) ON DELETE CASCADE,
    level_set_id INTEGER REFERENCES level_sets(level_set_id),
    grid_id INTEGER NOT NULL REFERENCES grids(grid_id)
);

CREATE TABLE IF NOT EXISTS data_file_variables_dsg_time_series (
    data_file_variable_dsg_ts_id INTEGER PRIMARY KEY
        REFERENCES data_file_variables(data_file_variable_id) ON DELETE CASCADE
);

CREATE TABLE IF NOT EXISTS data_file_variables_dsg_time_series_x_stations (
    data_file_variable_dsg_ts_id INTEGER NOT NULL
        REFERENCES data_file_variables_dsg_time_series(data_file_variable_dsg_ts_id) ON DELETE CASCADE,
    station_id INTEGER NOT NULL REFERENCES stations(station_id),
    PRIMARY KEY (data_file_variable_dsg_ts_id, station_id)
);

CREATE TABLE IF NOT EXISTS ensembles (
    ensemble_id INTEGER PRIMARY KEY,
    ensemble_name TEXT NOT NULL,
    version REAL NOT NULL,
    ensemble_description TEXT,
    changes TEXT NOT NULL,
    UNIQUE (ensemble_name, version)
);

CREATE TABLE IF NOT EXISTS ensemble_data_file_variables (
    ensemble_id INTEGER NOT NULL REFERENCES ensembles(ensemble_id) ON DELETE CASCADE,
    data_file_variable_id INTEGER NOT NULL
        REFERENCES data_file_variables(data_file_variable_id) ON DELETE CASCADE,
    PRIMARY KEY (ensemble_id, data_file_variable_id)
);
"#;
