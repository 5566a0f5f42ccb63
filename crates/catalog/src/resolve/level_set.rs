//! LevelSet and Level.
//!
//! A level set matches when it has the same units, the same number of levels,
//! and every stored level value occurs among the file's level values.

use async_trait::async_trait;
use sqlx::SqliteConnection;

use nc_describe::DescribedFile;

use super::Resolver;
use crate::error::Result;
use crate::geometry_cache::{GeometryCache, LevelSetInfo};
use crate::models::LevelSet;

pub struct LevelSetResolver<'a> {
    pub info: &'a LevelSetInfo,
}

#[async_trait]
impl<'a> Resolver for LevelSetResolver<'a> {
    type Output = LevelSet;
    const ENTITY: &'static str = "level_set";

    async fn find(&self, conn: &mut SqliteConnection) -> Result<Option<LevelSet>> {
        let candidates = sqlx::query_as::<_, LevelSet>(
            "SELECT ls.level_set_id, ls.level_units FROM level_sets ls \
             WHERE ls.level_units = ? \
             AND (SELECT COUNT(*) FROM levels l WHERE l.level_set_id = ls.level_set_id) = ? \
             ORDER BY ls.level_set_id",
        )
        .bind(&self.info.units)
        .bind(self.info.levels.len() as i64)
        .fetch_all(&mut *conn)
        .await?;

        for candidate in candidates {
            let stored: Vec<(f64,)> = sqlx::query_as(
                "SELECT vertical_level FROM levels WHERE level_set_id = ? ORDER BY level_idx",
            )
            .bind(candidate.level_set_id)
            .fetch_all(&mut *conn)
            .await?;

            let contained = stored
                .iter()
                .all(|(level,)| self.info.values().any(|v| v == *level));
            if contained {
                return Ok(Some(candidate));
            }
        }
        Ok(None)
    }

    async fn insert(&self, conn: &mut SqliteConnection) -> Result<LevelSet> {
        let level_set_id = sqlx::query("INSERT INTO level_sets (level_units) VALUES (?)")
            .bind(&self.info.units)
            .execute(&mut *conn)
            .await?
            .last_insert_rowid();

        for (level_idx, (start, level, end)) in self.info.levels.iter().enumerate() {
            sqlx::query(
                "INSERT INTO levels (level_set_id, level_idx, vertical_level, level_start, level_end) \
                 VALUES (?, ?, ?, ?, ?)",
            )
            .bind(level_set_id)
            .bind(level_idx as i64)
            .bind(level)
            .bind(start)
            .bind(end)
            .execute(&mut *conn)
            .await?;
        }

        Ok(LevelSet {
            level_set_id,
            level_units: self.info.units.clone(),
        })
    }
}

/// Level set of `var_name`, or `None` when the variable has no vertical axis.
pub async fn find_level_set(
    conn: &mut SqliteConnection,
    cache: &GeometryCache,
    file: &DescribedFile,
    var_name: &str,
) -> Result<Option<LevelSet>> {
    let geometry = cache.get(file, var_name).await?;
    match &geometry.levels {
        Some(info) => LevelSetResolver { info }.find(conn).await,
        None => Ok(None),
    }
}

pub async fn insert_level_set(
    conn: &mut SqliteConnection,
    cache: &GeometryCache,
    file: &DescribedFile,
    var_name: &str,
) -> Result<Option<LevelSet>> {
    let geometry = cache.get(file, var_name).await?;
    match &geometry.levels {
        Some(info) => LevelSetResolver { info }.insert(conn).await.map(Some),
        None => Ok(None),
    }
}

pub async fn find_or_insert_level_set(
    conn: &mut SqliteConnection,
    cache: &GeometryCache,
    file: &DescribedFile,
    var_name: &str,
) -> Result<Option<LevelSet>> {
    let geometry = cache.get(file, var_name).await?;
    match &geometry.levels {
        Some(info) => LevelSetResolver { info }.find_or_insert(conn).await.map(Some),
        None => Ok(None),
    }
}
