//! Station, keyed by (name, x, x units, y, y units).

use async_trait::async_trait;
use sqlx::SqliteConnection;

use nc_describe::StationDescription;

use super::Resolver;
use crate::error::Result;
use crate::models::Station;

pub struct StationResolver<'a> {
    pub station: &'a StationDescription,
}

#[async_trait]
impl<'a> Resolver for StationResolver<'a> {
    type Output = Station;
    const ENTITY: &'static str = "station";

    async fn find(&self, conn: &mut SqliteConnection) -> Result<Option<Station>> {
        let s = self.station;
        let station = sqlx::query_as::<_, Station>(
            "SELECT station_id, name, long_name, x, x_units, y, y_units FROM stations \
             WHERE name IS ? AND x = ? AND x_units = ? AND y = ? AND y_units = ? \
             ORDER BY station_id LIMIT 1",
        )
        .bind(&s.name)
        .bind(s.x)
        .bind(&s.x_units)
        .bind(s.y)
        .bind(&s.y_units)
        .fetch_optional(conn)
        .await?;
        Ok(station)
    }

    async fn insert(&self, conn: &mut SqliteConnection) -> Result<Station> {
        let s = self.station;
        let station_id = sqlx::query(
            "INSERT INTO stations (name, long_name, x, x_units, y, y_units) VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&s.name)
        .bind(&s.long_name)
        .bind(s.x)
        .bind(&s.x_units)
        .bind(s.y)
        .bind(&s.y_units)
        .execute(conn)
        .await?
        .last_insert_rowid();

        Ok(Station {
            station_id,
            name: s.name.clone(),
            long_name: s.long_name.clone(),
            x: s.x,
            x_units: s.x_units.clone(),
            y: s.y,
            y_units: s.y_units.clone(),
        })
    }
}

pub async fn find_station(conn: &mut SqliteConnection, station: &StationDescription) -> Result<Option<Station>> {
    StationResolver { station }.find(conn).await
}

pub async fn insert_station(conn: &mut SqliteConnection, station: &StationDescription) -> Result<Station> {
    StationResolver { station }.insert(conn).await
}

pub async fn find_or_insert_station(
    conn: &mut SqliteConnection,
    station: &StationDescription,
) -> Result<Station> {
    StationResolver { station }.find_or_insert(conn).await
}
