//! DataFileVariable, one per (data file, NetCDF variable name).
//!
//! The row's geometry follows the variable's sampling geometry: gridded
//! variables reference a Grid and optionally a LevelSet, DSG time series
//! reference the Stations they were sampled at.

use async_trait::async_trait;
use sqlx::SqliteConnection;
use tracing::debug;

use nc_describe::{DescribedFile, SamplingGeometry, VariableDescription};

use super::level_set::find_or_insert_level_set;
use super::spatial::find_or_insert_grid;
use super::station::find_or_insert_station;
use super::variable_alias::find_or_insert_variable_alias;
use super::Resolver;
use crate::error::{CatalogError, Result};
use crate::geometry_cache::GeometryCache;
use crate::models::{DataFileVariable, DataFileVariableRow, VariableGeometry};

const VARIABLE_SELECT: &str = "SELECT v.data_file_variable_id, v.data_file_id, v.variable_alias_id, \
     v.geometry_type, v.derivation_method, v.variable_cell_methods, v.netcdf_variable_name, \
     v.disabled, v.range_min, v.range_max, g.grid_id, g.level_set_id \
     FROM data_file_variables v \
     LEFT JOIN data_file_variables_gridded g \
     ON g.data_file_variable_gridded_id = v.data_file_variable_id";

pub struct DataFileVariableResolver<'a> {
    pub cache: &'a GeometryCache,
    pub file: &'a DescribedFile,
    pub variable: &'a VariableDescription,
    pub data_file_id: i64,
}

#[async_trait]
impl<'a> Resolver for DataFileVariableResolver<'a> {
    type Output = DataFileVariable;
    const ENTITY: &'static str = "data_file_variable";

    async fn find(&self, conn: &mut SqliteConnection) -> Result<Option<DataFileVariable>> {
        let row = sqlx::query_as::<_, DataFileVariableRow>(&format!(
            "{VARIABLE_SELECT} WHERE v.data_file_id = ? AND v.netcdf_variable_name = ? LIMIT 1"
        ))
        .bind(self.data_file_id)
        .bind(&self.variable.name)
        .fetch_optional(&mut *conn)
        .await?;

        match row {
            Some(row) => Ok(Some(with_stations(conn, row).await?)),
            None => Ok(None),
        }
    }

    async fn insert(&self, conn: &mut SqliteConnection) -> Result<DataFileVariable> {
        let variable = self.variable;
        let alias = find_or_insert_variable_alias(&mut *conn, variable).await?;

        let (data_file_variable_id, geometry) = match &variable.geometry {
            SamplingGeometry::Gridded { .. } => {
                let level_set =
                    find_or_insert_level_set(&mut *conn, self.cache, self.file, &variable.name).await?;
                let grid = find_or_insert_grid(&mut *conn, self.cache, self.file, &variable.name).await?;
                let level_set_id = level_set.map(|ls| ls.level_set_id);

                let id = self
                    .insert_base(&mut *conn, alias.variable_alias_id, VariableGeometry::GRIDDED)
                    .await?;
                sqlx::query(
                    "INSERT INTO data_file_variables_gridded \
                     (data_file_variable_gridded_id, level_set_id, grid_id) VALUES (?, ?, ?)",
                )
                .bind(id)
                .bind(level_set_id)
                .bind(grid.grid_id)
                .execute(&mut *conn)
                .await?;

                (id, VariableGeometry::Gridded { grid_id: grid.grid_id, level_set_id })
            }
            SamplingGeometry::DsgTimeSeries { stations } => {
                let id = self
                    .insert_base(&mut *conn, alias.variable_alias_id, VariableGeometry::DSG_TIME_SERIES)
                    .await?;
                sqlx::query(
                    "INSERT INTO data_file_variables_dsg_time_series (data_file_variable_dsg_ts_id) \
                     VALUES (?)",
                )
                .bind(id)
                .execute(&mut *conn)
                .await?;

                let mut station_ids = Vec::with_capacity(stations.len());
                for description in stations {
                    let station = find_or_insert_station(&mut *conn, description).await?;
                    sqlx::query(
                        "INSERT OR IGNORE INTO data_file_variables_dsg_time_series_x_stations \
                         (data_file_variable_dsg_ts_id, station_id) VALUES (?, ?)",
                    )
                    .bind(id)
                    .bind(station.station_id)
                    .execute(&mut *conn)
                    .await?;
                    if !station_ids.contains(&station.station_id) {
                        station_ids.push(station.station_id);
                    }
                }

                (id, VariableGeometry::DsgTimeSeries { station_ids })
            }
        };

        debug!(
            data_file_id = self.data_file_id,
            variable = %variable.name,
            geometry = geometry.discriminator(),
            "Inserted data file variable"
        );

        Ok(DataFileVariable {
            data_file_variable_id,
            data_file_id: self.data_file_id,
            variable_alias_id: alias.variable_alias_id,
            derivation_method: None,
            variable_cell_methods: variable.cell_methods.clone(),
            netcdf_variable_name: variable.name.clone(),
            disabled: false,
            range_min: variable.range_min,
            range_max: variable.range_max,
            geometry,
        })
    }
}

impl DataFileVariableResolver<'_> {
    async fn insert_base(
        &self,
        conn: &mut SqliteConnection,
        variable_alias_id: i64,
        geometry_type: &str,
    ) -> Result<i64> {
        let variable = self.variable;
        let id = sqlx::query(
            "INSERT INTO data_file_variables (data_file_id, variable_alias_id, geometry_type, \
             variable_cell_methods, netcdf_variable_name, disabled, range_min, range_max) \
             VALUES (?, ?, ?, ?, ?, 0, ?, ?)",
        )
        .bind(self.data_file_id)
        .bind(variable_alias_id)
        .bind(geometry_type)
        .bind(&variable.cell_methods)
        .bind(&variable.name)
        .bind(variable.range_min)
        .bind(variable.range_max)
        .execute(conn)
        .await?
        .last_insert_rowid();
        Ok(id)
    }
}

async fn with_stations(conn: &mut SqliteConnection, row: DataFileVariableRow) -> Result<DataFileVariable> {
    let station_ids = if row.geometry_type == VariableGeometry::DSG_TIME_SERIES {
        let ids: Vec<(i64,)> = sqlx::query_as(
            "SELECT station_id FROM data_file_variables_dsg_time_series_x_stations \
             WHERE data_file_variable_dsg_ts_id = ? ORDER BY station_id",
        )
        .bind(row.data_file_variable_id)
        .fetch_all(conn)
        .await?;
        ids.into_iter().map(|(id,)| id).collect()
    } else {
        Vec::new()
    };
    row.into_variable(station_ids)
}

fn described_variable<'a>(file: &'a DescribedFile, var_name: &str) -> Result<&'a VariableDescription> {
    file.variable(var_name).ok_or_else(|| CatalogError::UnknownVariable {
        path: file.path.clone(),
        variable: var_name.to_string(),
    })
}

pub async fn find_data_file_variable(
    conn: &mut SqliteConnection,
    cache: &GeometryCache,
    file: &DescribedFile,
    var_name: &str,
    data_file_id: i64,
) -> Result<Option<DataFileVariable>> {
    let variable = described_variable(file, var_name)?;
    DataFileVariableResolver { cache, file, variable, data_file_id }
        .find(conn)
        .await
}

pub async fn insert_data_file_variable(
    conn: &mut SqliteConnection,
    cache: &GeometryCache,
    file: &DescribedFile,
    var_name: &str,
    data_file_id: i64,
) -> Result<DataFileVariable> {
    let variable = described_variable(file, var_name)?;
    DataFileVariableResolver { cache, file, variable, data_file_id }
        .insert(conn)
        .await
}

pub async fn find_or_insert_data_file_variable(
    conn: &mut SqliteConnection,
    cache: &GeometryCache,
    file: &DescribedFile,
    var_name: &str,
    data_file_id: i64,
) -> Result<DataFileVariable> {
    let variable = described_variable(file, var_name)?;
    DataFileVariableResolver { cache, file, variable, data_file_id }
        .find_or_insert(conn)
        .await
}

/// Find or insert a variable row for every dependent variable, in file order.
pub async fn find_or_insert_data_file_variables(
    conn: &mut SqliteConnection,
    cache: &GeometryCache,
    file: &DescribedFile,
    data_file_id: i64,
) -> Result<Vec<DataFileVariable>> {
    let mut variables = Vec::with_capacity(file.variables.len());
    for variable in &file.variables {
        let resolved = DataFileVariableResolver { cache, file, variable, data_file_id }
            .find_or_insert(&mut *conn)
            .await?;
        variables.push(resolved);
    }
    Ok(variables)
}

/// All variable rows of a data file, ordered by id.
pub async fn load_data_file_variables(
    conn: &mut SqliteConnection,
    data_file_id: i64,
) -> Result<Vec<DataFileVariable>> {
    let rows = sqlx::query_as::<_, DataFileVariableRow>(&format!(
        "{VARIABLE_SELECT} WHERE v.data_file_id = ? ORDER BY v.data_file_variable_id"
    ))
    .bind(data_file_id)
    .fetch_all(&mut *conn)
    .await?;

    let mut variables = Vec::with_capacity(rows.len());
    for row in rows {
        variables.push(with_stations(&mut *conn, row).await?);
    }
    Ok(variables)
}
