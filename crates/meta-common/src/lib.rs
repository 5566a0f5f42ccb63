//! Common types and utilities shared across the modelmeta crates.

pub mod crs;
pub mod error;
pub mod grid;
pub mod model_type;
pub mod time;

pub use crs::{proj4_to_wkt, Proj4, DEFAULT_PROJ4, WGS84_SRID};
pub use error::{MetaError, MetaResult};
pub use grid::{
    approx_eq, bounds_from_values, cell_avg_area_sq_km, is_regular_series, mean_step,
    DEFAULT_RELATIVE_TOLERANCE, EARTH_RADIUS_KM,
};
pub use model_type::ModelType;
pub use time::TimeResolution;
