//! Integration tests for ensemble association.

mod common;

use catalog::{
    associate_ensemble_to_filepaths, associate_to_data_file, associate_to_filepath,
    find_ensemble, find_or_insert_ensemble, insert_ensemble, Catalog, CatalogError, GeometryCache,
};
use common::{count, index, test_catalog};
use test_utils::fixtures;

/// Catalogue holding three files under two directories.
async fn populated_catalog() -> Catalog {
    let catalog = test_catalog().await;
    let cache = GeometryCache::default();
    let mut conn = catalog.pool().acquire().await.unwrap();

    index(&mut conn, &cache, &fixtures::gridded_file("U1", "H1", "/data/gcm/tasmax_day.nc")).await;
    index(&mut conn, &cache, &fixtures::multi_variable_file("U2", "H2", "/data/gcm/tas_day.nc")).await;
    index(&mut conn, &cache, &fixtures::dsg_file("S1", "HS1", "/data/hydro/flow.nc", 3)).await;
    insert_ensemble(&mut conn, "demo", 1.0, Some("Demo files"), "initial").await.unwrap();

    catalog
}

fn names(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

// ============================================================================
// Ensembles
// ============================================================================

#[tokio::test]
async fn test_ensemble_is_keyed_by_name_and_version() {
    let catalog = test_catalog().await;
    let mut conn = catalog.pool().acquire().await.unwrap();

    assert!(find_ensemble(&mut conn, "demo", 1.0).await.unwrap().is_none());

    let v1 = find_or_insert_ensemble(&mut conn, "demo", 1.0, None, "initial").await.unwrap();
    let again = find_or_insert_ensemble(&mut conn, "demo", 1.0, Some("ignored"), "ignored")
        .await
        .unwrap();
    let v2 = find_or_insert_ensemble(&mut conn, "demo", 2.0, None, "more files").await.unwrap();

    assert_eq!(v1, again);
    assert_ne!(v1.ensemble_id, v2.ensemble_id);
    assert_eq!(again.changes, "initial");
    assert_eq!(count(&mut conn, "ensembles").await, 2);
}

// ============================================================================
// Association
// ============================================================================

#[tokio::test]
async fn test_associate_exact_filepath() {
    let catalog = populated_catalog().await;
    let mut conn = catalog.pool().acquire().await.unwrap();

    let associations = associate_to_filepath(&mut conn, "demo", 1.0, "/data/gcm/tas_day.nc", false, &[])
        .await
        .unwrap();

    assert_eq!(associations.len(), 1);
    assert_eq!(associations[0].data_file.unique_id, "U2");
    assert_eq!(associations[0].variables.len(), 2);
    assert_eq!(count(&mut conn, "ensemble_data_file_variables").await, 2);
}

#[tokio::test]
async fn test_association_is_idempotent() {
    let catalog = populated_catalog().await;
    let mut conn = catalog.pool().acquire().await.unwrap();

    for _ in 0..3 {
        associate_to_filepath(&mut conn, "demo", 1.0, "/data/gcm/tasmax_day.nc", false, &[])
            .await
            .unwrap();
    }

    assert_eq!(count(&mut conn, "ensemble_data_file_variables").await, 1);
}

#[tokio::test]
async fn test_associate_regex_filepath() {
    let catalog = populated_catalog().await;
    let mut conn = catalog.pool().acquire().await.unwrap();

    let associations = associate_to_filepath(&mut conn, "demo", 1.0, r"^/data/gcm/.*_day\.nc$", true, &[])
        .await
        .unwrap();

    let mut ids: Vec<&str> = associations.iter().map(|a| a.data_file.unique_id.as_str()).collect();
    ids.sort();
    assert_eq!(ids, vec!["U1", "U2"]);
    assert_eq!(count(&mut conn, "ensemble_data_file_variables").await, 3);
}

#[tokio::test]
async fn test_variable_filter() {
    let catalog = populated_catalog().await;
    let mut conn = catalog.pool().acquire().await.unwrap();

    let tasmin = associate_to_filepath(&mut conn, "demo", 1.0, "/data/gcm/tas_day.nc", false, &names(&["tasmin"]))
        .await
        .unwrap();
    assert_eq!(tasmin[0].variables.len(), 1);
    assert_eq!(tasmin[0].variables[0].netcdf_variable_name, "tasmin");

    let nothing = associate_to_filepath(&mut conn, "demo", 1.0, "/data/hydro/flow.nc", false, &names(&["pr"]))
        .await
        .unwrap();
    assert_eq!(nothing.len(), 1);
    assert!(nothing[0].variables.is_empty());
    assert_eq!(count(&mut conn, "ensemble_data_file_variables").await, 1);
}

#[tokio::test]
async fn test_unmatched_filepath_associates_nothing() {
    let catalog = populated_catalog().await;
    let mut conn = catalog.pool().acquire().await.unwrap();

    let associations = associate_to_filepath(&mut conn, "demo", 1.0, "/data/none.nc", false, &[])
        .await
        .unwrap();
    assert!(associations.is_empty());
}

#[tokio::test]
async fn test_missing_ensemble_is_an_error() {
    let catalog = populated_catalog().await;
    let mut conn = catalog.pool().acquire().await.unwrap();

    let err = associate_to_filepath(&mut conn, "demo", 9.0, "/data/gcm/tas_day.nc", false, &[])
        .await
        .unwrap_err();
    assert!(matches!(err, CatalogError::EnsembleNotFound { ref name, version } if name == "demo" && version == 9.0));
    assert_eq!(count(&mut conn, "ensemble_data_file_variables").await, 0);
}

#[tokio::test]
async fn test_associate_data_file_directly() {
    let catalog = populated_catalog().await;
    let mut conn = catalog.pool().acquire().await.unwrap();

    let ensemble = find_ensemble(&mut conn, "demo", 1.0).await.unwrap().unwrap();
    let data_file = catalog::get_data_file(&mut conn, 3).await.unwrap().unwrap();

    let variables = associate_to_data_file(&mut conn, &ensemble, &data_file, &[]).await.unwrap();
    assert_eq!(variables.len(), 1);
    assert_eq!(variables[0].netcdf_variable_name, "streamflow");
}

// ============================================================================
// Batch association
// ============================================================================

#[tokio::test]
async fn test_batch_isolates_failing_patterns() {
    let catalog = populated_catalog().await;

    let filepaths = names(&["/data/gcm/tasmax_day.nc", "([", "^/data/hydro/"]);
    let results = associate_ensemble_to_filepaths(&catalog, "demo", 1.0, &filepaths, true, &[])
        .await
        .unwrap();

    assert_eq!(results.len(), 3);
    assert_eq!(results[0].as_ref().map(Vec::len), Some(1));
    assert!(results[1].is_none());
    assert_eq!(results[2].as_ref().map(Vec::len), Some(1));

    let mut conn = catalog.pool().acquire().await.unwrap();
    assert_eq!(count(&mut conn, "ensemble_data_file_variables").await, 2);
}

#[tokio::test]
async fn test_batch_isolates_failures_within_a_pattern() {
    let catalog = populated_catalog().await;
    {
        let mut conn = catalog.pool().acquire().await.unwrap();
        sqlx::query(
            "CREATE TRIGGER reject_tas_day BEFORE INSERT ON ensemble_data_file_variables \
             WHEN NEW.data_file_variable_id IN ( \
                 SELECT dfv.data_file_variable_id FROM data_file_variables dfv \
                 JOIN data_files df ON df.data_file_id = dfv.data_file_id \
                 WHERE df.filename = '/data/gcm/tas_day.nc') \
             BEGIN SELECT RAISE(ABORT, 'rejected'); END",
        )
        .execute(&mut *conn)
        .await
        .unwrap();
    }

    let results = associate_ensemble_to_filepaths(&catalog, "demo", 1.0, &names(&["^/data/gcm/"]), true, &[])
        .await
        .unwrap();

    let outcomes = results[0].as_ref().unwrap();
    assert_eq!(outcomes.len(), 2);
    assert_eq!(outcomes[0].data_file.filename, "/data/gcm/tasmax_day.nc");
    assert_eq!(outcomes[0].variables.as_ref().map(Vec::len), Some(1));
    assert_eq!(outcomes[1].data_file.filename, "/data/gcm/tas_day.nc");
    assert!(outcomes[1].variables.is_none());

    let mut conn = catalog.pool().acquire().await.unwrap();
    assert_eq!(count(&mut conn, "ensemble_data_file_variables").await, 1);
}

#[tokio::test]
async fn test_batch_aborts_on_missing_ensemble() {
    let catalog = populated_catalog().await;

    let filepaths = names(&["/data/gcm/tasmax_day.nc"]);
    let err = associate_ensemble_to_filepaths(&catalog, "nope", 1.0, &filepaths, false, &[])
        .await
        .unwrap_err();
    assert!(matches!(err, CatalogError::EnsembleNotFound { .. }));
}
