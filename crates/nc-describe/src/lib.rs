//! Descriptions of climate data files.
//!
//! A [`DescribedFile`] carries the identity of a file on disk (absolute path,
//! content hash, modification time) together with the metadata the catalogue
//! indexes: provenance, axes, and per-variable sampling geometry.
//!
//! [`SidecarDescriber`] reads the metadata from a JSON document stored next to
//! the data file, e.g. `tasmax_day.nc.json` for `tasmax_day.nc`.

pub mod described;
pub mod error;
pub mod sidecar;

pub use described::{
    AxisDimNames, CoordinateAxis, DescribedFile, GridAxes, Provenance, RunRef, SamplingGeometry,
    StationDescription, TimeAxis, VariableDescription,
};
pub use error::{DescribeError, DescribeResult};
pub use sidecar::{absolute_path, hash_first_mib, modification_time, FileDescriber, SidecarDescriber, CONTENT_HASH_BYTES};
