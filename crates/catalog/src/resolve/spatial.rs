//! SpatialRefSys, Grid and YCellBound.

use async_trait::async_trait;
use sqlx::SqliteConnection;
use tracing::info;

use meta_common::approx_eq;
use nc_describe::DescribedFile;

use super::Resolver;
use crate::error::{CatalogError, Result};
use crate::geometry_cache::{GeometryCache, GridInfo};
use crate::models::{Grid, SpatialRefSys};

/// Custom spatial reference systems are numbered above this value.
pub const CUSTOM_SRID_BASE: i64 = 990000;

const GRID_COLUMNS: &str = "grid_id, grid_name, cell_avg_area_sq_km, evenly_spaced_y, \
                            xc_count, xc_grid_step, xc_origin, xc_units, \
                            yc_count, yc_grid_step, yc_origin, yc_units, srid";

/// Keyed by the exact WKT text of a PROJ4 definition.
pub struct SpatialRefSysResolver<'a> {
    pub srtext: &'a str,
    pub proj4: &'a str,
}

#[async_trait]
impl<'a> Resolver for SpatialRefSysResolver<'a> {
    type Output = SpatialRefSys;
    const ENTITY: &'static str = "spatial_ref_sys";

    async fn find(&self, conn: &mut SqliteConnection) -> Result<Option<SpatialRefSys>> {
        let srs = sqlx::query_as::<_, SpatialRefSys>(
            "SELECT srid, auth_name, auth_srid, srtext, proj4text FROM spatial_ref_sys \
             WHERE srtext = ? ORDER BY srid LIMIT 1",
        )
        .bind(self.srtext)
        .fetch_optional(conn)
        .await?;
        Ok(srs)
    }

    /// The next custom srid is computed and used in a single statement, so
    /// concurrent writers serialize on the insert itself.
    async fn insert(&self, conn: &mut SqliteConnection) -> Result<SpatialRefSys> {
        let srs = sqlx::query_as::<_, SpatialRefSys>(
            "INSERT INTO spatial_ref_sys (srid, auth_name, auth_srid, srtext, proj4text) \
             SELECT n, 'modelmeta', n, ?, ? FROM \
             (SELECT COALESCE(MAX(srid), ?) + 1 AS n FROM spatial_ref_sys WHERE srid >= ?) \
             RETURNING srid, auth_name, auth_srid, srtext, proj4text",
        )
        .bind(self.srtext)
        .bind(self.proj4)
        .bind(CUSTOM_SRID_BASE)
        .bind(CUSTOM_SRID_BASE)
        .fetch_one(conn)
        .await?;

        info!(srid = srs.srid, proj4 = %self.proj4, "Allocated custom spatial reference system");
        Ok(srs)
    }
}

/// Matches counts, the evenly-spaced flag and the CRS exactly, and origins
/// and steps within the relative tolerance.
///
/// Inserting a grid resolves its SpatialRefSys first.
pub struct GridResolver<'a> {
    pub info: &'a GridInfo,
    pub relative_tolerance: f64,
}

impl GridResolver<'_> {
    fn matches(&self, grid: &Grid) -> bool {
        let tol = self.relative_tolerance;
        approx_eq(grid.xc_origin, self.info.xc_origin, tol)
            && approx_eq(grid.yc_origin, self.info.yc_origin, tol)
            && approx_eq(grid.xc_grid_step, self.info.xc_grid_step, tol)
            && approx_eq(grid.yc_grid_step, self.info.yc_grid_step, tol)
    }

    fn srs_resolver(&self) -> SpatialRefSysResolver<'_> {
        SpatialRefSysResolver {
            srtext: &self.info.srtext,
            proj4: &self.info.proj4,
        }
    }
}

#[async_trait]
impl<'a> Resolver for GridResolver<'a> {
    type Output = Grid;
    const ENTITY: &'static str = "grid";

    async fn find(&self, conn: &mut SqliteConnection) -> Result<Option<Grid>> {
        let Some(srs) = self.srs_resolver().find(&mut *conn).await? else {
            return Ok(None);
        };

        let candidates = sqlx::query_as::<_, Grid>(&format!(
            "SELECT {GRID_COLUMNS} FROM grids \
             WHERE xc_count = ? AND yc_count = ? AND evenly_spaced_y = ? AND srid = ? \
             ORDER BY grid_id"
        ))
        .bind(self.info.xc_count)
        .bind(self.info.yc_count)
        .bind(self.info.evenly_spaced_y)
        .bind(srs.srid)
        .fetch_all(conn)
        .await?;

        Ok(candidates.into_iter().find(|grid| self.matches(grid)))
    }

    async fn insert(&self, conn: &mut SqliteConnection) -> Result<Grid> {
        let srs = self.srs_resolver().find_or_insert(&mut *conn).await?;
        let info = self.info;

        let grid = sqlx::query_as::<_, Grid>(&format!(
            "INSERT INTO grids (cell_avg_area_sq_km, evenly_spaced_y, \
             xc_count, xc_grid_step, xc_origin, xc_units, \
             yc_count, yc_grid_step, yc_origin, yc_units, srid) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?) RETURNING {GRID_COLUMNS}"
        ))
        .bind(info.cell_avg_area_sq_km)
        .bind(info.evenly_spaced_y)
        .bind(info.xc_count)
        .bind(info.xc_grid_step)
        .bind(info.xc_origin)
        .bind(&info.xc_units)
        .bind(info.yc_count)
        .bind(info.yc_grid_step)
        .bind(info.yc_origin)
        .bind(&info.yc_units)
        .bind(srs.srid)
        .fetch_one(&mut *conn)
        .await?;

        if !info.evenly_spaced_y {
            for (bottom, centre, top) in &info.y_bounds {
                sqlx::query(
                    "INSERT INTO y_cell_bounds (grid_id, y_center, bottom_bnd, top_bnd) \
                     VALUES (?, ?, ?, ?)",
                )
                .bind(grid.grid_id)
                .bind(centre)
                .bind(bottom)
                .bind(top)
                .execute(&mut *conn)
                .await?;
            }
        }

        Ok(grid)
    }
}

pub async fn find_spatial_ref_sys(
    conn: &mut SqliteConnection,
    proj4: Option<&str>,
) -> Result<Option<SpatialRefSys>> {
    let (proj4, srtext) = proj4_and_wkt(proj4)?;
    SpatialRefSysResolver { srtext: &srtext, proj4: &proj4 }.find(conn).await
}

pub async fn insert_spatial_ref_sys(
    conn: &mut SqliteConnection,
    proj4: Option<&str>,
) -> Result<SpatialRefSys> {
    let (proj4, srtext) = proj4_and_wkt(proj4)?;
    SpatialRefSysResolver { srtext: &srtext, proj4: &proj4 }.insert(conn).await
}

pub async fn find_or_insert_spatial_ref_sys(
    conn: &mut SqliteConnection,
    proj4: Option<&str>,
) -> Result<SpatialRefSys> {
    let (proj4, srtext) = proj4_and_wkt(proj4)?;
    SpatialRefSysResolver { srtext: &srtext, proj4: &proj4 }
        .find_or_insert(conn)
        .await
}

fn proj4_and_wkt(proj4: Option<&str>) -> Result<(String, String)> {
    let proj4 = proj4.unwrap_or(meta_common::DEFAULT_PROJ4).to_string();
    let srtext = meta_common::proj4_to_wkt(Some(&proj4))?;
    Ok((proj4, srtext))
}

async fn grid_info(cache: &GeometryCache, file: &DescribedFile, var_name: &str) -> Result<GridInfo> {
    let geometry = cache.get(file, var_name).await?;
    geometry.grid.clone().ok_or_else(|| CatalogError::NotGridded {
        path: file.path.clone(),
        variable: var_name.to_string(),
    })
}

pub async fn find_grid(
    conn: &mut SqliteConnection,
    cache: &GeometryCache,
    file: &DescribedFile,
    var_name: &str,
) -> Result<Option<Grid>> {
    let info = grid_info(cache, file, var_name).await?;
    GridResolver { info: &info, relative_tolerance: cache.relative_tolerance() }
        .find(conn)
        .await
}

pub async fn insert_grid(
    conn: &mut SqliteConnection,
    cache: &GeometryCache,
    file: &DescribedFile,
    var_name: &str,
) -> Result<Grid> {
    let info = grid_info(cache, file, var_name).await?;
    GridResolver { info: &info, relative_tolerance: cache.relative_tolerance() }
        .insert(conn)
        .await
}

pub async fn find_or_insert_grid(
    conn: &mut SqliteConnection,
    cache: &GeometryCache,
    file: &DescribedFile,
    var_name: &str,
) -> Result<Grid> {
    let info = grid_info(cache, file, var_name).await?;
    GridResolver { info: &info, relative_tolerance: cache.relative_tolerance() }
        .find_or_insert(conn)
        .await
}
