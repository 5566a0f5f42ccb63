//! Integration tests for the reference-data and variable resolvers.

mod common;

use catalog::resolve::{
    find_grid, find_level_set, find_or_insert_data_file_variables, find_or_insert_grid,
    find_or_insert_level_set, find_or_insert_run, find_or_insert_spatial_ref_sys,
    find_or_insert_time_set, find_or_insert_variable_alias, find_run, find_spatial_ref_sys,
    load_data_file_variables, CUSTOM_SRID_BASE,
};
use catalog::{CatalogError, GeometryCache, VariableGeometry};
use meta_common::WGS84_SRID;
use nc_describe::RunRef;
use common::{count, index, test_catalog};
use test_utils::fixtures;

const STEREO: &str =
    "+proj=stere +lat_0=90 +lat_ts=60 +lon_0=-110 +x_0=0 +y_0=0 +ellps=WGS84 +units=m +no_defs";
const LCC: &str = "+proj=lcc +lat_1=50 +lat_2=70 +lat_0=40 +lon_0=-96 +x_0=0 +y_0=0 \
                   +ellps=WGS84 +units=m +no_defs";

// ============================================================================
// Grids and spatial reference systems
// ============================================================================

#[tokio::test]
async fn test_grids_within_tolerance_are_shared() {
    let catalog = test_catalog().await;
    let cache = GeometryCache::new(4, 1e-6);
    let mut tx = catalog.begin().await.unwrap();

    let base = fixtures::gridded_file_with_grid("U1", "H1", "/a/1.nc", fixtures::geographic_grid_at(-123.0, 48.0));
    let near = fixtures::gridded_file_with_grid(
        "U2",
        "H2",
        "/a/2.nc",
        fixtures::geographic_grid_at(-123.0 * (1.0 + 1e-7), 48.0 * (1.0 + 1e-7)),
    );
    let far = fixtures::gridded_file_with_grid(
        "U3",
        "H3",
        "/a/3.nc",
        fixtures::geographic_grid_at(-123.0 * (1.0 + 1e-5), 48.0),
    );

    let g1 = find_or_insert_grid(&mut tx, &cache, &base, "tasmax").await.unwrap();
    let g2 = find_or_insert_grid(&mut tx, &cache, &near, "tasmax").await.unwrap();
    let g3 = find_or_insert_grid(&mut tx, &cache, &far, "tasmax").await.unwrap();

    assert_eq!(g1.grid_id, g2.grid_id);
    assert_ne!(g1.grid_id, g3.grid_id);
    assert_eq!(g1.srid, WGS84_SRID);
    assert!(g1.evenly_spaced_y);
    assert_eq!((g1.xc_count, g1.yc_count), (5, 4));
    assert_eq!(count(&mut tx, "grids").await, 2);
    assert_eq!(count(&mut tx, "y_cell_bounds").await, 0);

    tx.commit().await.unwrap();
}

#[tokio::test]
async fn test_grid_find_does_not_write() {
    let catalog = test_catalog().await;
    let cache = GeometryCache::default();
    let mut conn = catalog.pool().acquire().await.unwrap();

    let file = fixtures::gridded_file_with_grid("U1", "H1", "/a/p.nc", fixtures::projected_grid(STEREO));
    let found = find_grid(&mut conn, &cache, &file, "tasmax").await.unwrap();

    assert!(found.is_none());
    assert_eq!(count(&mut conn, "spatial_ref_sys").await, 1);
    assert_eq!(count(&mut conn, "grids").await, 0);
}

#[tokio::test]
async fn test_custom_srids_are_allocated_in_sequence() {
    let catalog = test_catalog().await;
    let mut conn = catalog.pool().acquire().await.unwrap();

    assert!(find_spatial_ref_sys(&mut conn, Some(STEREO)).await.unwrap().is_none());

    let first = find_or_insert_spatial_ref_sys(&mut conn, Some(STEREO)).await.unwrap();
    let second = find_or_insert_spatial_ref_sys(&mut conn, Some(LCC)).await.unwrap();
    let again = find_or_insert_spatial_ref_sys(&mut conn, Some(STEREO)).await.unwrap();

    assert_eq!(first.srid, CUSTOM_SRID_BASE + 1);
    assert_eq!(second.srid, CUSTOM_SRID_BASE + 2);
    assert_eq!(again.srid, first.srid);
    assert!(first.srtext.as_deref().unwrap().starts_with("PROJCS"));
    assert_eq!(first.proj4text.as_deref(), Some(STEREO));

    let wgs84 = find_or_insert_spatial_ref_sys(&mut conn, None).await.unwrap();
    assert_eq!(wgs84.srid, WGS84_SRID);
}

#[tokio::test]
async fn test_projected_grids_reference_their_srs() {
    let catalog = test_catalog().await;
    let cache = GeometryCache::default();
    let mut conn = catalog.pool().acquire().await.unwrap();

    let stereo = fixtures::gridded_file_with_grid("U1", "H1", "/a/s.nc", fixtures::projected_grid(STEREO));
    let lcc = fixtures::gridded_file_with_grid("U2", "H2", "/a/l.nc", fixtures::projected_grid(LCC));

    let g1 = find_or_insert_grid(&mut conn, &cache, &stereo, "tasmax").await.unwrap();
    let g2 = find_or_insert_grid(&mut conn, &cache, &lcc, "tasmax").await.unwrap();

    assert_ne!(g1.grid_id, g2.grid_id);
    assert_eq!(g1.srid, CUSTOM_SRID_BASE + 1);
    assert_eq!(g2.srid, CUSTOM_SRID_BASE + 2);
    test_utils::assert_approx_eq!(g1.cell_avg_area_sq_km.unwrap(), 2500.0, 1e-6);
}

#[tokio::test]
async fn test_irregular_grid_stores_y_cell_bounds() {
    let catalog = test_catalog().await;
    let cache = GeometryCache::default();
    let mut conn = catalog.pool().acquire().await.unwrap();

    let file = fixtures::gridded_file_with_grid("U1", "H1", "/a/i.nc", fixtures::irregular_grid());
    let grid = find_or_insert_grid(&mut conn, &cache, &file, "tasmax").await.unwrap();

    assert!(!grid.evenly_spaced_y);
    assert_eq!(count(&mut conn, "y_cell_bounds").await, 4);

    let (bottom, top): (f64, f64) = sqlx::query_as(
        "SELECT bottom_bnd, top_bnd FROM y_cell_bounds WHERE grid_id = ? AND y_center = ?",
    )
    .bind(grid.grid_id)
    .bind(50.5)
    .fetch_one(&mut *conn)
    .await
    .unwrap();
    assert_eq!((bottom, top), (49.75, 51.5));
}

#[tokio::test]
async fn test_grid_of_station_variable_is_an_error() {
    let catalog = test_catalog().await;
    let cache = GeometryCache::default();
    let mut conn = catalog.pool().acquire().await.unwrap();

    let file = fixtures::dsg_file("S1", "HS1", "/a/s.nc", 3);
    let err = find_grid(&mut conn, &cache, &file, "streamflow").await.unwrap_err();
    assert!(matches!(err, CatalogError::NotGridded { .. }));
}

// ============================================================================
// Level sets, aliases and time sets
// ============================================================================

#[tokio::test]
async fn test_level_sets_match_on_values() {
    let catalog = test_catalog().await;
    let cache = GeometryCache::default();
    let mut conn = catalog.pool().acquire().await.unwrap();

    let a = fixtures::leveled_file("U1", "H1", "/a/1.nc", &[100000.0, 85000.0, 50000.0]);
    let b = fixtures::leveled_file("U2", "H2", "/a/2.nc", &[100000.0, 85000.0, 50000.0]);
    let c = fixtures::leveled_file("U3", "H3", "/a/3.nc", &[100000.0, 70000.0, 50000.0]);

    assert!(find_level_set(&mut conn, &cache, &a, "ta").await.unwrap().is_none());

    let la = find_or_insert_level_set(&mut conn, &cache, &a, "ta").await.unwrap().unwrap();
    let lb = find_or_insert_level_set(&mut conn, &cache, &b, "ta").await.unwrap().unwrap();
    let lc = find_or_insert_level_set(&mut conn, &cache, &c, "ta").await.unwrap().unwrap();

    assert_eq!(la.level_set_id, lb.level_set_id);
    assert_ne!(la.level_set_id, lc.level_set_id);
    assert_eq!(la.level_units, "Pa");
    assert_eq!(count(&mut conn, "levels").await, 6);

    let flat = fixtures::gridded_file("U4", "H4", "/a/4.nc");
    assert!(find_or_insert_level_set(&mut conn, &cache, &flat, "tasmax").await.unwrap().is_none());
}

#[tokio::test]
async fn test_leveled_variable_references_level_set() {
    let catalog = test_catalog().await;
    let cache = GeometryCache::default();
    let mut conn = catalog.pool().acquire().await.unwrap();

    let file = fixtures::leveled_file("U1", "H1", "/a/ta.nc", &[100000.0, 50000.0]);
    let indexed = index(&mut conn, &cache, &file).await;

    let variables = load_data_file_variables(&mut conn, indexed.data_file.data_file_id)
        .await
        .unwrap();
    match &variables[0].geometry {
        VariableGeometry::Gridded { level_set_id, .. } => assert!(level_set_id.is_some()),
        other => panic!("expected a gridded variable, got {other:?}"),
    }
    assert_eq!(indexed.data_file.z_dim_name.as_deref(), Some("plev"));
}

#[tokio::test]
async fn test_variable_alias_is_shared() {
    let catalog = test_catalog().await;
    let mut conn = catalog.pool().acquire().await.unwrap();

    let file = fixtures::gridded_file("U1", "H1", "/a/f.nc");
    let first = find_or_insert_variable_alias(&mut conn, &file.variables[0]).await.unwrap();
    let second = find_or_insert_variable_alias(&mut conn, &file.variables[0]).await.unwrap();

    let mut renamed = file.variables[0].clone();
    renamed.standard_name = None;
    let third = find_or_insert_variable_alias(&mut conn, &renamed).await.unwrap();

    assert_eq!(first.variable_alias_id, second.variable_alias_id);
    assert_ne!(first.variable_alias_id, third.variable_alias_id);
    assert_eq!(third.variable_standard_name, None);
}

#[tokio::test]
async fn test_climatology_time_set() {
    let catalog = test_catalog().await;
    let mut conn = catalog.pool().acquire().await.unwrap();

    let file = fixtures::climatology_file("U1", "H1", "/a/clim.nc", 17);
    let time_set = find_or_insert_time_set(&mut conn, &file).await.unwrap().unwrap();
    let again = find_or_insert_time_set(&mut conn, &file).await.unwrap().unwrap();

    assert_eq!(time_set.time_set_id, again.time_set_id);
    assert!(time_set.multi_year_mean);
    assert_eq!(time_set.num_times, 17);
    assert_eq!(time_set.time_resolution, "monthly");
    assert_eq!(count(&mut conn, "times").await, 17);
    assert_eq!(count(&mut conn, "climatological_times").await, 17);
}

// ============================================================================
// Provenance
// ============================================================================

#[tokio::test]
async fn test_files_from_one_run_share_provenance_rows() {
    let catalog = test_catalog().await;
    let cache = GeometryCache::default();
    let mut conn = catalog.pool().acquire().await.unwrap();

    index(&mut conn, &cache, &fixtures::gridded_file("U1", "H1", "/a/1.nc")).await;
    index(&mut conn, &cache, &fixtures::multi_variable_file("U2", "H2", "/a/2.nc")).await;

    assert_eq!(count(&mut conn, "models").await, 1);
    assert_eq!(count(&mut conn, "emissions").await, 1);
    assert_eq!(count(&mut conn, "runs").await, 1);
    assert_eq!(count(&mut conn, "grids").await, 1);
    assert_eq!(count(&mut conn, "variable_aliases").await, 2);
}

#[tokio::test]
async fn test_run_links_to_catalogued_driving_run() {
    let catalog = test_catalog().await;
    let mut conn = catalog.pool().acquire().await.unwrap();

    let gcm = fixtures::gcm_provenance();
    let driving = find_or_insert_run(&mut conn, &gcm).await.unwrap();

    let mut rcm = fixtures::gcm_provenance();
    rcm.model_short_name = "CRCM5".to_string();
    rcm.model_type = meta_common::ModelType::Rcm;
    rcm.driving_run = Some(RunRef {
        run_name: gcm.run_name.clone(),
        model_short_name: gcm.model_short_name.clone(),
        emission_short_name: gcm.emission_short_name.clone(),
    });
    rcm.initialized_from = Some(RunRef {
        run_name: "r9i9p9".to_string(),
        model_short_name: "NoSuchModel".to_string(),
        emission_short_name: "historical".to_string(),
    });

    assert!(find_run(&mut conn, &rcm).await.unwrap().is_none());
    let run = find_or_insert_run(&mut conn, &rcm).await.unwrap();

    assert_eq!(run.driving_run_id, Some(driving.run_id));
    assert_eq!(run.initialized_from_id, None);
    assert_eq!(count(&mut conn, "models").await, 2);
    assert_eq!(count(&mut conn, "emissions").await, 1);

    let (model_type,): (String,) = sqlx::query_as("SELECT type FROM models WHERE model_short_name = 'CRCM5'")
        .fetch_one(&mut *conn)
        .await
        .unwrap();
    assert_eq!(model_type, "RCM");
}

// ============================================================================
// Discrete sampling geometry
// ============================================================================

#[tokio::test]
async fn test_station_variable_links_every_station_once() {
    let catalog = test_catalog().await;
    let cache = GeometryCache::default();
    let mut conn = catalog.pool().acquire().await.unwrap();

    let file = fixtures::dsg_file("S1", "HS1", "/a/flow.nc", 5);
    let indexed = index(&mut conn, &cache, &file).await;

    assert_eq!(count(&mut conn, "stations").await, 5);
    assert_eq!(count(&mut conn, "data_file_variables_dsg_time_series").await, 1);
    assert_eq!(count(&mut conn, "data_file_variables_dsg_time_series_x_stations").await, 5);
    assert_eq!(count(&mut conn, "grids").await, 0);

    let variables = load_data_file_variables(&mut conn, indexed.data_file.data_file_id)
        .await
        .unwrap();
    match &variables[0].geometry {
        VariableGeometry::DsgTimeSeries { station_ids } => assert_eq!(station_ids.len(), 5),
        other => panic!("expected a DSG variable, got {other:?}"),
    }

    // Unchanged file, and the same variables resolved again directly.
    index(&mut conn, &cache, &file).await;
    find_or_insert_data_file_variables(&mut conn, &cache, &file, indexed.data_file.data_file_id)
        .await
        .unwrap();
    assert_eq!(count(&mut conn, "data_file_variables").await, 1);
    assert_eq!(count(&mut conn, "data_file_variables_dsg_time_series_x_stations").await, 5);
}

#[tokio::test]
async fn test_stations_are_shared_between_files() {
    let catalog = test_catalog().await;
    let cache = GeometryCache::default();
    let mut conn = catalog.pool().acquire().await.unwrap();

    index(&mut conn, &cache, &fixtures::dsg_file("S1", "HS1", "/a/1.nc", 4)).await;
    index(&mut conn, &cache, &fixtures::dsg_file("S2", "HS2", "/a/2.nc", 4)).await;

    assert_eq!(count(&mut conn, "stations").await, 4);
    assert_eq!(count(&mut conn, "data_file_variables_dsg_time_series_x_stations").await, 8);
}

#[tokio::test]
async fn test_station_variable_without_stations() {
    let catalog = test_catalog().await;
    let cache = GeometryCache::default();
    let mut conn = catalog.pool().acquire().await.unwrap();

    let indexed = index(&mut conn, &cache, &fixtures::dsg_file("S0", "HS0", "/a/empty.nc", 0)).await;
    let variables = load_data_file_variables(&mut conn, indexed.data_file.data_file_id)
        .await
        .unwrap();

    assert_eq!(variables.len(), 1);
    assert_eq!(
        variables[0].geometry,
        VariableGeometry::DsgTimeSeries { station_ids: vec![] }
    );
}
