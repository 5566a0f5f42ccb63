//! The description of a data file as seen by the catalogue.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use meta_common::{bounds_from_values, ModelType, TimeResolution};

/// Everything the catalogue needs to know about one data file.
///
/// Identity fields (`path`, `content_hash`, `modification_time`) describe
/// the file on disk; the rest comes from the file's metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DescribedFile {
    /// Absolute filesystem path, symlinks unresolved.
    pub path: String,
    /// Globally unique identifier recorded in the file (e.g. a tracking id).
    pub unique_id: String,
    /// Fingerprint of the leading bytes of the file.
    pub content_hash: String,
    pub modification_time: DateTime<Utc>,
    pub provenance: Provenance,
    #[serde(default)]
    pub dim_names: AxisDimNames,
    /// Time axis, absent for time-invariant files.
    #[serde(default)]
    pub time: Option<TimeAxis>,
    /// Dependent variables in file-declared order.
    pub variables: Vec<VariableDescription>,
}

/// Where a file came from.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Provenance {
    pub model_short_name: String,
    #[serde(default)]
    pub model_long_name: Option<String>,
    #[serde(default)]
    pub organization: Option<String>,
    #[serde(default)]
    pub model_type: ModelType,
    pub emission_short_name: String,
    pub run_name: String,
    pub project: String,
    #[serde(default)]
    pub driving_run: Option<RunRef>,
    #[serde(default)]
    pub initialized_from: Option<RunRef>,
}

/// Natural key of a run referenced by another run.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunRef {
    pub run_name: String,
    pub model_short_name: String,
    pub emission_short_name: String,
}

/// Dimension names of the X/Y/Z/T axes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AxisDimNames {
    pub x: Option<String>,
    pub y: Option<String>,
    pub z: Option<String>,
    pub t: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeAxis {
    pub calendar: String,
    pub resolution: TimeResolution,
    pub steps: Vec<NaiveDateTime>,
    #[serde(default)]
    pub multi_year_mean: bool,
    /// Climatological period bounds, one pair per step of a multi-year mean.
    #[serde(default)]
    pub climatology_bounds: Vec<(NaiveDateTime, NaiveDateTime)>,
}

impl TimeAxis {
    /// Earliest and latest time step.
    pub fn range(&self) -> Option<(NaiveDateTime, NaiveDateTime)> {
        let start = self.steps.iter().min()?;
        let end = self.steps.iter().max()?;
        Some((*start, *end))
    }

    pub fn num_times(&self) -> i64 {
        self.steps.len() as i64
    }
}

/// One dependent (non-axis, non-bounds) variable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariableDescription {
    /// NetCDF variable name.
    pub name: String,
    #[serde(default)]
    pub long_name: String,
    #[serde(default)]
    pub standard_name: Option<String>,
    #[serde(default)]
    pub units: String,
    #[serde(default)]
    pub cell_methods: Option<String>,
    /// Minimum over all non-fill values.
    pub range_min: f64,
    /// Maximum over all non-fill values.
    pub range_max: f64,
    pub geometry: SamplingGeometry,
}

/// How a variable is sampled in space.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SamplingGeometry {
    /// Regular or curvilinear grid, optionally with a vertical axis.
    Gridded {
        grid: GridAxes,
        #[serde(default)]
        levels: Option<CoordinateAxis>,
    },
    /// Discrete sampling geometry time series at fixed stations.
    DsgTimeSeries {
        #[serde(default)]
        stations: Vec<StationDescription>,
    },
}

impl SamplingGeometry {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Gridded { .. } => "gridded",
            Self::DsgTimeSeries { .. } => "dsg_time_series",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridAxes {
    pub x: CoordinateAxis,
    pub y: CoordinateAxis,
    /// PROJ4 definition of the grid's CRS; geographic WGS84 when absent.
    #[serde(default)]
    pub proj4: Option<String>,
}

/// Values of a 1-D coordinate axis with optional explicit cell bounds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoordinateAxis {
    pub values: Vec<f64>,
    pub units: String,
    #[serde(default)]
    pub bounds: Option<Vec<(f64, f64)>>,
}

impl CoordinateAxis {
    pub fn new(values: Vec<f64>, units: impl Into<String>) -> Self {
        Self {
            values,
            units: units.into(),
            bounds: None,
        }
    }

    /// `(start, value, end)` per cell.
    ///
    /// Uses the explicit bounds when they cover every value, otherwise
    /// synthesizes them from the cell centres.
    pub fn bounds_and_values(&self) -> Vec<(f64, f64, f64)> {
        let bounds = match &self.bounds {
            Some(bounds) if bounds.len() == self.values.len() => bounds.clone(),
            _ => bounds_from_values(&self.values),
        };
        bounds
            .into_iter()
            .zip(&self.values)
            .map(|((start, end), value)| (start, *value, end))
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StationDescription {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub long_name: Option<String>,
    pub x: f64,
    pub x_units: String,
    pub y: f64,
    pub y_units: String,
}

impl DescribedFile {
    pub fn dependent_variable_names(&self) -> impl Iterator<Item = &str> {
        self.variables.iter().map(|v| v.name.as_str())
    }

    pub fn variable(&self, name: &str) -> Option<&VariableDescription> {
        self.variables.iter().find(|v| v.name == name)
    }

    /// Names of required fields that are empty.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        let required = [
            ("unique_id", &self.unique_id),
            ("content_hash", &self.content_hash),
            ("model", &self.provenance.model_short_name),
            ("emissions", &self.provenance.emission_short_name),
            ("run", &self.provenance.run_name),
            ("project", &self.provenance.project),
        ];
        for (field, value) in required {
            if value.trim().is_empty() {
                missing.push(field);
            }
        }
        if let Some(time) = &self.time {
            if time.steps.is_empty() {
                missing.push("time.steps");
            }
            if time.calendar.trim().is_empty() {
                missing.push("time.calendar");
            }
        }
        missing
    }
}
