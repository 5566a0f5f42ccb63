//! Catalogue rows.
//!
//! Field names follow the column names of the modelmeta schema so the
//! structs can be loaded with `sqlx::query_as` directly.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;

use crate::error::{CatalogError, Result};

#[derive(Debug, Clone, PartialEq, FromRow, Serialize)]
pub struct DataFile {
    pub data_file_id: i64,
    pub filename: String,
    pub first_1mib_hash: String,
    pub unique_id: String,
    pub x_dim_name: Option<String>,
    pub y_dim_name: Option<String>,
    pub z_dim_name: Option<String>,
    pub t_dim_name: Option<String>,
    pub index_time: DateTime<Utc>,
    pub run_id: i64,
    pub time_set_id: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, FromRow, Serialize)]
pub struct Model {
    pub model_id: i64,
    pub model_short_name: String,
    pub model_long_name: Option<String>,
    pub model_organization: Option<String>,
    #[sqlx(rename = "type")]
    pub model_type: String,
}

#[derive(Debug, Clone, PartialEq, FromRow, Serialize)]
pub struct Emission {
    pub emission_id: i64,
    pub emission_short_name: String,
    pub emission_long_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, FromRow, Serialize)]
pub struct Run {
    pub run_id: i64,
    pub run_name: String,
    pub project: Option<String>,
    pub model_id: i64,
    pub emission_id: i64,
    pub driving_run_id: Option<i64>,
    pub initialized_from_id: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, FromRow, Serialize)]
pub struct VariableAlias {
    pub variable_alias_id: i64,
    pub variable_long_name: String,
    pub variable_standard_name: Option<String>,
    pub variable_units: String,
}

#[derive(Debug, Clone, PartialEq, FromRow, Serialize)]
pub struct LevelSet {
    pub level_set_id: i64,
    pub level_units: String,
}

#[derive(Debug, Clone, PartialEq, FromRow, Serialize)]
pub struct Level {
    pub level_set_id: i64,
    pub level_idx: i64,
    pub vertical_level: f64,
    pub level_start: Option<f64>,
    pub level_end: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, FromRow, Serialize)]
pub struct SpatialRefSys {
    pub srid: i64,
    pub auth_name: Option<String>,
    pub auth_srid: Option<i64>,
    pub srtext: Option<String>,
    pub proj4text: Option<String>,
}

#[derive(Debug, Clone, PartialEq, FromRow, Serialize)]
pub struct Grid {
    pub grid_id: i64,
    pub grid_name: Option<String>,
    pub cell_avg_area_sq_km: Option<f64>,
    pub evenly_spaced_y: bool,
    pub xc_count: i64,
    pub xc_grid_step: f64,
    pub xc_origin: f64,
    pub xc_units: String,
    pub yc_count: i64,
    pub yc_grid_step: f64,
    pub yc_origin: f64,
    pub yc_units: String,
    pub srid: i64,
}

#[derive(Debug, Clone, PartialEq, FromRow, Serialize)]
pub struct YCellBound {
    pub grid_id: i64,
    pub y_center: f64,
    pub bottom_bnd: Option<f64>,
    pub top_bnd: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, FromRow, Serialize)]
pub struct TimeSet {
    pub time_set_id: i64,
    pub calendar: String,
    pub start_date: NaiveDateTime,
    pub end_date: NaiveDateTime,
    pub multi_year_mean: bool,
    pub num_times: i64,
    pub time_resolution: String,
}

#[derive(Debug, Clone, PartialEq, FromRow, Serialize)]
pub struct Station {
    pub station_id: i64,
    pub name: Option<String>,
    pub long_name: Option<String>,
    pub x: f64,
    pub x_units: String,
    pub y: f64,
    pub y_units: String,
}

#[derive(Debug, Clone, PartialEq, FromRow, Serialize)]
pub struct Ensemble {
    pub ensemble_id: i64,
    pub ensemble_name: String,
    pub version: f64,
    pub ensemble_description: Option<String>,
    pub changes: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, FromRow, Serialize)]
pub struct EnsembleDataFileVariable {
    pub ensemble_id: i64,
    pub data_file_variable_id: i64,
}

/// Geometry-specific part of a [`DataFileVariable`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "geometry_type", rename_all = "snake_case")]
pub enum VariableGeometry {
    Gridded {
        grid_id: i64,
        level_set_id: Option<i64>,
    },
    DsgTimeSeries {
        station_ids: Vec<i64>,
    },
}

impl VariableGeometry {
    pub const GRIDDED: &'static str = "gridded";
    pub const DSG_TIME_SERIES: &'static str = "dsg_time_series";

    pub fn discriminator(&self) -> &'static str {
        match self {
            Self::Gridded { .. } => Self::GRIDDED,
            Self::DsgTimeSeries { .. } => Self::DSG_TIME_SERIES,
        }
    }
}

/// One catalogued variable of a data file.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DataFileVariable {
    pub data_file_variable_id: i64,
    pub data_file_id: i64,
    pub variable_alias_id: i64,
    pub derivation_method: Option<String>,
    pub variable_cell_methods: Option<String>,
    pub netcdf_variable_name: String,
    pub disabled: bool,
    pub range_min: f64,
    pub range_max: f64,
    pub geometry: VariableGeometry,
}

/// Flat row of the base table joined with the gridded subtype.
#[derive(Debug, Clone, FromRow)]
pub(crate) struct DataFileVariableRow {
    pub data_file_variable_id: i64,
    pub data_file_id: i64,
    pub variable_alias_id: i64,
    pub geometry_type: String,
    pub derivation_method: Option<String>,
    pub variable_cell_methods: Option<String>,
    pub netcdf_variable_name: String,
    pub disabled: bool,
    pub range_min: f64,
    pub range_max: f64,
    pub grid_id: Option<i64>,
    pub level_set_id: Option<i64>,
}

impl DataFileVariableRow {
    /// Attach the geometry payload. Station ids are only used for DSG rows.
    ///
    /// An unknown discriminator, or a gridded row without its subtype row,
    /// is a corrupt catalogue entry.
    pub(crate) fn into_variable(self, station_ids: Vec<i64>) -> Result<DataFileVariable> {
        let geometry = match (self.geometry_type.as_str(), self.grid_id) {
            (VariableGeometry::GRIDDED, Some(grid_id)) => VariableGeometry::Gridded {
                grid_id,
                level_set_id: self.level_set_id,
            },
            (VariableGeometry::DSG_TIME_SERIES, _) => VariableGeometry::DsgTimeSeries { station_ids },
            (geometry_type, _) => {
                return Err(CatalogError::CorruptVariable {
                    data_file_variable_id: self.data_file_variable_id,
                    geometry_type: geometry_type.to_string(),
                })
            }
        };
        Ok(DataFileVariable {
            data_file_variable_id: self.data_file_variable_id,
            data_file_id: self.data_file_id,
            variable_alias_id: self.variable_alias_id,
            derivation_method: self.derivation_method,
            variable_cell_methods: self.variable_cell_methods,
            netcdf_variable_name: self.netcdf_variable_name,
            disabled: self.disabled,
            range_min: self.range_min,
            range_max: self.range_max,
            geometry,
        })
    }
}
