//! Numeric helpers for describing and matching spatial grids and axes.
//!
//! The tolerance test and the cell-area estimate are deliberately simple:
//! changing either one changes which files are treated as sharing a grid.

/// Default relative tolerance used when comparing grid origins and steps.
pub const DEFAULT_RELATIVE_TOLERANCE: f64 = 1e-6;

/// Earth's mean radius in kilometres.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Mean of the differences between successive values.
///
/// Returns 0.0 for axes with fewer than two values.
pub fn mean_step(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let diffs: f64 = values.windows(2).map(|w| w[1] - w[0]).sum();
    diffs / (values.len() - 1) as f64
}

/// True when successive differences are all equal within `relative_tolerance`.
///
/// Axes with fewer than three values are trivially regular.
pub fn is_regular_series(values: &[f64], relative_tolerance: f64) -> bool {
    let diffs: Vec<f64> = values.windows(2).map(|w| w[1] - w[0]).collect();
    if diffs.len() < 2 {
        return true;
    }
    let max = diffs.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let min = diffs.iter().cloned().fold(f64::INFINITY, f64::min);
    if min == 0.0 {
        return max == 0.0;
    }
    (max / min - 1.0).abs() < relative_tolerance
}

/// Relative-tolerance equality between a stored value and a candidate.
///
/// The difference is scaled by the stored value. A candidate of exactly zero
/// only matches a stored zero, and a stored zero never matches a non-zero
/// candidate.
pub fn approx_eq(stored: f64, value: f64, relative_tolerance: f64) -> bool {
    if value == 0.0 {
        return stored == 0.0;
    }
    if stored == 0.0 {
        return false;
    }
    ((stored - value) / stored).abs() < relative_tolerance
}

fn is_metres(units: &str) -> bool {
    matches!(units, "m" | "metre" | "metres" | "meter" | "meters")
}

/// Estimate of the average area of one grid cell, in square kilometres.
///
/// Planar grids (both axes in metres) use `|step_x * step_y| / 1e6`.
/// Anything else is treated as longitude/latitude in degrees: the X spacing
/// of the first two columns times the cosine-weighted mean latitude spacing,
/// scaled by the square of the Earth's radius.
///
/// Returns `None` when an axis is too short to have a spacing.
pub fn cell_avg_area_sq_km(
    x_values: &[f64],
    x_units: &str,
    y_values: &[f64],
    y_units: &str,
) -> Option<f64> {
    if x_values.len() < 2 || y_values.len() < 2 {
        return None;
    }

    if is_metres(x_units) && is_metres(y_units) {
        return Some((mean_step(x_values) * mean_step(y_values)).abs() / 1e6);
    }

    let dx = (x_values[1] - x_values[0]).abs().to_radians();
    let y_rad: Vec<f64> = y_values.iter().map(|y| y.to_radians()).collect();
    let weighted: Vec<f64> = y_rad.windows(2).map(|w| (w[1] - w[0]) * w[0].cos()).collect();
    let mean_dy = weighted.iter().sum::<f64>() / weighted.len() as f64;

    Some(dx * mean_dy * EARTH_RADIUS_KM * EARTH_RADIUS_KM)
}

/// Cell bounds synthesized from cell centres.
///
/// Interior bounds are midpoints between consecutive values; the outer
/// bounds extend half a step beyond the first and last values. A single
/// value yields a degenerate `(v, v)` cell.
pub fn bounds_from_values(values: &[f64]) -> Vec<(f64, f64)> {
    match values.len() {
        0 => Vec::new(),
        1 => vec![(values[0], values[0])],
        n => {
            let mids: Vec<f64> = values.windows(2).map(|w| (w[0] + w[1]) / 2.0).collect();
            let first = values[0] - (values[1] - values[0]) / 2.0;
            let last = values[n - 1] + (values[n - 1] - values[n - 2]) / 2.0;

            let mut bounds = Vec::with_capacity(n);
            bounds.push((first, mids[0]));
            for i in 1..n - 1 {
                bounds.push((mids[i - 1], mids[i]));
            }
            bounds.push((mids[n - 2], last));
            bounds
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mean_step() {
        assert_eq!(mean_step(&[0.0, 1.0, 2.0, 3.0]), 1.0);
        assert_eq!(mean_step(&[10.0, 7.0, 4.0]), -3.0);
        assert_eq!(mean_step(&[5.0]), 0.0);
    }

    #[test]
    fn test_regular_series() {
        assert!(is_regular_series(&[0.0, 0.5, 1.0, 1.5], DEFAULT_RELATIVE_TOLERANCE));
        assert!(!is_regular_series(&[0.0, 0.5, 1.5, 1.7], DEFAULT_RELATIVE_TOLERANCE));
        assert!(is_regular_series(&[1.0, 2.0], DEFAULT_RELATIVE_TOLERANCE));
    }

    #[test]
    fn test_approx_eq_within_tolerance() {
        assert!(approx_eq(100.0, 100.0 * (1.0 + 1e-7), 1e-6));
        assert!(!approx_eq(100.0, 100.0 * (1.0 + 1e-5), 1e-6));
    }

    #[test]
    fn test_approx_eq_zero_is_exact() {
        assert!(approx_eq(0.0, 0.0, 1e-6));
        assert!(!approx_eq(1e-12, 0.0, 1e-6));
        assert!(!approx_eq(0.0, 1e-12, 1e-6));
    }

    #[test]
    fn test_planar_cell_area() {
        let x = [0.0, 1000.0, 2000.0];
        let y = [0.0, 2000.0, 4000.0];
        let area = cell_avg_area_sq_km(&x, "m", &y, "m").unwrap();
        assert!((area - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_geographic_cell_area_at_equator() {
        let x = [0.0, 1.0, 2.0];
        let y = [0.0, 1.0];
        let area = cell_avg_area_sq_km(&x, "degrees_east", &y, "degrees_north").unwrap();
        let expected = 1f64.to_radians() * 1f64.to_radians() * EARTH_RADIUS_KM * EARTH_RADIUS_KM;
        assert!((area - expected).abs() < 1e-6);
    }

    #[test]
    fn test_cell_area_needs_two_values() {
        assert!(cell_avg_area_sq_km(&[0.0], "m", &[0.0, 1.0], "m").is_none());
    }

    #[test]
    fn test_bounds_from_values() {
        let bounds = bounds_from_values(&[1000.0, 850.0, 500.0]);
        assert_eq!(
            bounds,
            vec![(1075.0, 925.0), (925.0, 675.0), (675.0, 325.0)]
        );
        assert_eq!(bounds_from_values(&[3.0]), vec![(3.0, 3.0)]);
        assert!(bounds_from_values(&[]).is_empty());
    }
}
