//! TimeSet, Time and ClimatologicalTime.

use async_trait::async_trait;
use chrono::NaiveDateTime;
use sqlx::SqliteConnection;

use meta_common::MetaError;
use nc_describe::{DescribedFile, TimeAxis};

use super::Resolver;
use crate::error::Result;
use crate::models::TimeSet;

const TIME_SET_COLUMNS: &str =
    "time_set_id, calendar, start_date, end_date, multi_year_mean, num_times, time_resolution";

/// Keyed by (start, end, multi-year-mean flag, resolution, count, calendar).
pub struct TimeSetResolver<'a> {
    axis: &'a TimeAxis,
    start: NaiveDateTime,
    end: NaiveDateTime,
}

impl<'a> TimeSetResolver<'a> {
    pub fn new(axis: &'a TimeAxis) -> Result<Self> {
        let (start, end) = axis
            .range()
            .ok_or_else(|| MetaError::EmptyAxis("time".to_string()))?;
        Ok(Self { axis, start, end })
    }
}

#[async_trait]
impl<'a> Resolver for TimeSetResolver<'a> {
    type Output = TimeSet;
    const ENTITY: &'static str = "time_set";

    async fn find(&self, conn: &mut SqliteConnection) -> Result<Option<TimeSet>> {
        let time_set = sqlx::query_as::<_, TimeSet>(&format!(
            "SELECT {TIME_SET_COLUMNS} FROM time_sets \
             WHERE start_date = ? AND end_date = ? AND multi_year_mean = ? \
             AND time_resolution = ? AND num_times = ? AND calendar = ? \
             ORDER BY time_set_id LIMIT 1"
        ))
        .bind(self.start)
        .bind(self.end)
        .bind(self.axis.multi_year_mean)
        .bind(self.axis.resolution.as_str())
        .bind(self.axis.num_times())
        .bind(&self.axis.calendar)
        .fetch_optional(conn)
        .await?;
        Ok(time_set)
    }

    async fn insert(&self, conn: &mut SqliteConnection) -> Result<TimeSet> {
        let axis = self.axis;
        let time_set = sqlx::query_as::<_, TimeSet>(&format!(
            "INSERT INTO time_sets (calendar, start_date, end_date, multi_year_mean, num_times, time_resolution) \
             VALUES (?, ?, ?, ?, ?, ?) RETURNING {TIME_SET_COLUMNS}"
        ))
        .bind(&axis.calendar)
        .bind(self.start)
        .bind(self.end)
        .bind(axis.multi_year_mean)
        .bind(axis.num_times())
        .bind(axis.resolution.as_str())
        .fetch_one(&mut *conn)
        .await?;

        for (time_idx, timestep) in axis.steps.iter().enumerate() {
            sqlx::query("INSERT INTO times (time_set_id, time_idx, timestep) VALUES (?, ?, ?)")
                .bind(time_set.time_set_id)
                .bind(time_idx as i64)
                .bind(timestep)
                .execute(&mut *conn)
                .await?;
        }

        if axis.multi_year_mean {
            for (time_idx, (time_start, time_end)) in axis.climatology_bounds.iter().enumerate() {
                sqlx::query(
                    "INSERT INTO climatological_times (time_set_id, time_idx, time_start, time_end) \
                     VALUES (?, ?, ?, ?)",
                )
                .bind(time_set.time_set_id)
                .bind(time_idx as i64)
                .bind(time_start)
                .bind(time_end)
                .execute(&mut *conn)
                .await?;
            }
        }

        Ok(time_set)
    }
}

/// Time set of the file, or `None` for a time-invariant file.
pub async fn find_time_set(conn: &mut SqliteConnection, file: &DescribedFile) -> Result<Option<TimeSet>> {
    match &file.time {
        Some(axis) => TimeSetResolver::new(axis)?.find(conn).await,
        None => Ok(None),
    }
}

pub async fn insert_time_set(conn: &mut SqliteConnection, file: &DescribedFile) -> Result<Option<TimeSet>> {
    match &file.time {
        Some(axis) => TimeSetResolver::new(axis)?.insert(conn).await.map(Some),
        None => Ok(None),
    }
}

pub async fn find_or_insert_time_set(
    conn: &mut SqliteConnection,
    file: &DescribedFile,
) -> Result<Option<TimeSet>> {
    match &file.time {
        Some(axis) => TimeSetResolver::new(axis)?.find_or_insert(conn).await.map(Some),
        None => Ok(None),
    }
}
