//! Common helpers for catalogue integration tests.
#![allow(dead_code)]

use catalog::{find_update_or_insert_cf_file, Catalog, GeometryCache, IndexedFile};
use nc_describe::DescribedFile;
use sqlx::SqliteConnection;

/// Migrated in-memory catalogue.
pub async fn test_catalog() -> Catalog {
    let catalog = Catalog::open_memory().await.expect("Failed to open catalogue");
    catalog.migrate().await.expect("Failed to migrate catalogue");
    catalog
}

/// Row count of a table.
pub async fn count(conn: &mut SqliteConnection, table: &str) -> i64 {
    let (n,): (i64,) = sqlx::query_as(&format!("SELECT COUNT(*) FROM {table}"))
        .fetch_one(conn)
        .await
        .expect("Failed to count rows");
    n
}

/// Reconcile a file, panicking on error.
pub async fn index(conn: &mut SqliteConnection, cache: &GeometryCache, file: &DescribedFile) -> IndexedFile {
    find_update_or_insert_cf_file(conn, cache, file)
        .await
        .unwrap_or_else(|e| panic!("Failed to index {}: {e}", file.path))
}
