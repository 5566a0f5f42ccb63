//! Test support for the modelmeta workspace.
//!
//! - [`fixtures`]: described files for gridded, leveled, climatological and
//!   station data, with fixed provenance and modification times
//! - [`files`]: real data files plus JSON sidecars in temporary directories

pub mod files;
pub mod fixtures;

pub use files::*;

/// Assert that two numbers differ by no more than `tolerance`.
///
/// ```ignore
/// test_utils::assert_approx_eq!(grid.cell_avg_area_sq_km.unwrap(), 2500.0, 1e-6);
/// ```
#[macro_export]
macro_rules! assert_approx_eq {
    ($actual:expr, $expected:expr, $tolerance:expr) => {{
        let (actual, expected, tolerance) = ($actual as f64, $expected as f64, $tolerance as f64);
        let diff = (actual - expected).abs();
        assert!(
            diff <= tolerance,
            "assertion failed: {actual} is not within {tolerance} of {expected} (diff {diff})"
        );
    }};
}
