//! Pre-built descriptions of small climate data files.
//!
//! Every fixture has a modification time well in the past, so a catalogue
//! entry created during a test is always up to date with respect to it.

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, TimeZone, Utc};

use meta_common::{ModelType, TimeResolution};
use nc_describe::{
    AxisDimNames, CoordinateAxis, DescribedFile, GridAxes, Provenance, SamplingGeometry,
    StationDescription, TimeAxis, VariableDescription,
};

/// Modification time of every fixture (2020-01-01T00:00:00Z).
pub fn modified() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap()
}

fn noon(year: i32, month: u32, day: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(year, month, day)
        .and_then(|d| d.and_hms_opt(12, 0, 0))
        .unwrap()
}

/// A CMIP5 global model run.
pub fn gcm_provenance() -> Provenance {
    Provenance {
        model_short_name: "CanESM2".to_string(),
        model_long_name: Some("CCCma Canadian Earth System Model 2".to_string()),
        organization: Some("CCCma".to_string()),
        model_type: ModelType::Gcm,
        emission_short_name: "historical,rcp85".to_string(),
        run_name: "r1i1p1".to_string(),
        project: "CMIP5".to_string(),
        driving_run: None,
        initialized_from: None,
    }
}

/// A hydrologic model run producing station time series.
pub fn hydro_provenance() -> Provenance {
    Provenance {
        model_short_name: "VICGL".to_string(),
        model_long_name: None,
        organization: Some("PCIC".to_string()),
        model_type: ModelType::Hydrologic,
        emission_short_name: "historical,rcp45".to_string(),
        run_name: "r1i1p1".to_string(),
        project: "other".to_string(),
        driving_run: None,
        initialized_from: None,
    }
}

/// `count` consecutive days at noon starting 2000-01-01.
pub fn daily_time_axis(count: usize) -> TimeAxis {
    let start = noon(2000, 1, 1);
    TimeAxis {
        calendar: "365_day".to_string(),
        resolution: TimeResolution::Daily,
        steps: (0..count).map(|i| start + Duration::days(i as i64)).collect(),
        multi_year_mean: false,
        climatology_bounds: Vec::new(),
    }
}

/// Multi-year mean over 1961-1990 with `count` monthly/seasonal/annual steps.
pub fn climatology_time_axis(count: usize) -> TimeAxis {
    let steps: Vec<NaiveDateTime> = (0..count)
        .map(|i| noon(1975, (i % 12) as u32 + 1, 15))
        .collect();
    let climatology_bounds = steps
        .iter()
        .map(|_| (noon(1961, 1, 1), noon(1990, 12, 31)))
        .collect();
    TimeAxis {
        calendar: "gregorian".to_string(),
        resolution: TimeResolution::Monthly,
        steps,
        multi_year_mean: true,
        climatology_bounds,
    }
}

/// Evenly spaced values `start, start + step, ...`.
pub fn regular_axis(start: f64, step: f64, count: usize, units: &str) -> CoordinateAxis {
    CoordinateAxis::new((0..count).map(|i| start + step * i as f64).collect(), units)
}

/// 5 x 4 one-degree geographic grid.
pub fn geographic_grid() -> GridAxes {
    geographic_grid_at(-123.0, 48.0)
}

/// 5 x 4 one-degree geographic grid with the given origin.
pub fn geographic_grid_at(lon0: f64, lat0: f64) -> GridAxes {
    GridAxes {
        x: regular_axis(lon0, 1.0, 5, "degrees_east"),
        y: regular_axis(lat0, 1.0, 4, "degrees_north"),
        proj4: None,
    }
}

/// Geographic grid whose latitude spacing is not uniform.
pub fn irregular_grid() -> GridAxes {
    GridAxes {
        x: regular_axis(-123.0, 1.0, 5, "degrees_east"),
        y: CoordinateAxis::new(vec![48.0, 49.0, 50.5, 52.5], "degrees_north"),
        proj4: None,
    }
}

/// 4 x 3 grid on a polar stereographic projection with metre axes.
pub fn projected_grid(proj4: &str) -> GridAxes {
    GridAxes {
        x: regular_axis(-4000000.0, 50000.0, 4, "m"),
        y: regular_axis(-3000000.0, 50000.0, 3, "m"),
        proj4: Some(proj4.to_string()),
    }
}

pub fn gridded_variable(name: &str, grid: GridAxes, levels: Option<CoordinateAxis>) -> VariableDescription {
    VariableDescription {
        name: name.to_string(),
        long_name: format!("{name} long name"),
        standard_name: Some("air_temperature".to_string()),
        units: "K".to_string(),
        cell_methods: Some("time: maximum".to_string()),
        range_min: 250.0,
        range_max: 310.0,
        geometry: SamplingGeometry::Gridded { grid, levels },
    }
}

/// Gridded daily GCM file with a single `tasmax` variable.
pub fn gridded_file(unique_id: &str, content_hash: &str, path: &str) -> DescribedFile {
    gridded_file_with_grid(unique_id, content_hash, path, geographic_grid())
}

pub fn gridded_file_with_grid(
    unique_id: &str,
    content_hash: &str,
    path: &str,
    grid: GridAxes,
) -> DescribedFile {
    DescribedFile {
        path: path.to_string(),
        unique_id: unique_id.to_string(),
        content_hash: content_hash.to_string(),
        modification_time: modified(),
        provenance: gcm_provenance(),
        dim_names: AxisDimNames {
            x: Some("lon".to_string()),
            y: Some("lat".to_string()),
            z: None,
            t: Some("time".to_string()),
        },
        time: Some(daily_time_axis(3)),
        variables: vec![gridded_variable("tasmax", grid, None)],
    }
}

/// Gridded file with `tasmax` and `tasmin`.
pub fn multi_variable_file(unique_id: &str, content_hash: &str, path: &str) -> DescribedFile {
    let mut file = gridded_file(unique_id, content_hash, path);
    let mut tasmin = gridded_variable("tasmin", geographic_grid(), None);
    tasmin.cell_methods = Some("time: minimum".to_string());
    file.variables.push(tasmin);
    file
}

/// Gridded file with pressure levels on its `ta` variable.
pub fn leveled_file(unique_id: &str, content_hash: &str, path: &str, levels: &[f64]) -> DescribedFile {
    let mut file = gridded_file(unique_id, content_hash, path);
    file.dim_names.z = Some("plev".to_string());
    file.variables = vec![gridded_variable(
        "ta",
        geographic_grid(),
        Some(CoordinateAxis::new(levels.to_vec(), "Pa")),
    )];
    file
}

/// Multi-year-mean file with `count` time steps.
pub fn climatology_file(unique_id: &str, content_hash: &str, path: &str, count: usize) -> DescribedFile {
    let mut file = gridded_file(unique_id, content_hash, path);
    file.time = Some(climatology_time_axis(count));
    file
}

/// Gridded file without a time axis.
pub fn time_invariant_file(unique_id: &str, content_hash: &str, path: &str) -> DescribedFile {
    let mut file = gridded_file(unique_id, content_hash, path);
    file.dim_names.t = None;
    file.time = None;
    file
}

/// `count` streamflow stations spaced along a line of longitude.
pub fn stations(count: usize) -> Vec<StationDescription> {
    (0..count)
        .map(|i| StationDescription {
            name: Some(format!("STN{i:02}")),
            long_name: Some(format!("Station {i}")),
            x: -120.0 - i as f64 * 0.5,
            x_units: "degrees_east".to_string(),
            y: 50.0,
            y_units: "degrees_north".to_string(),
        })
        .collect()
}

/// Discrete-sampling-geometry streamflow file with `station_count` stations.
pub fn dsg_file(unique_id: &str, content_hash: &str, path: &str, station_count: usize) -> DescribedFile {
    DescribedFile {
        path: path.to_string(),
        unique_id: unique_id.to_string(),
        content_hash: content_hash.to_string(),
        modification_time: modified(),
        provenance: hydro_provenance(),
        dim_names: AxisDimNames {
            x: None,
            y: None,
            z: None,
            t: Some("time".to_string()),
        },
        time: Some(daily_time_axis(10)),
        variables: vec![VariableDescription {
            name: "streamflow".to_string(),
            long_name: "Simulated streamflow".to_string(),
            standard_name: Some("water_volume_transport_in_river_channel".to_string()),
            units: "m3 s-1".to_string(),
            cell_methods: Some("time: mean".to_string()),
            range_min: 0.0,
            range_max: 1250.0,
            geometry: SamplingGeometry::DsgTimeSeries {
                stations: stations(station_count),
            },
        }],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gridded_file_is_complete() {
        let file = gridded_file("U1", "H1", "/a/f.nc");
        assert!(file.missing_fields().is_empty());
        assert_eq!(file.dependent_variable_names().collect::<Vec<_>>(), vec!["tasmax"]);
        assert_eq!(file.time.as_ref().map(|t| t.num_times()), Some(3));
    }

    #[test]
    fn test_dsg_file_station_count() {
        let file = dsg_file("S1", "HS1", "/a/s.nc", 7);
        let SamplingGeometry::DsgTimeSeries { stations } = &file.variables[0].geometry else {
            panic!("expected a DSG variable");
        };
        assert_eq!(stations.len(), 7);
    }

    #[test]
    fn test_climatology_bounds_cover_every_step() {
        let axis = climatology_time_axis(17);
        assert_eq!(axis.steps.len(), axis.climatology_bounds.len());
        assert!(axis.multi_year_mean);
    }
}
