//! Reference-data resolvers.
//!
//! Every catalogued entity derived from a file is resolved through the same
//! find / insert / find-or-insert contract: `find` looks the entity up by its
//! natural key without writing, `insert` stages a new row without checking
//! for duplicates, and `find_or_insert` combines the two.
//!
//! Resolvers run on the caller's connection (normally an open transaction)
//! and propagate storage errors unchanged.

use async_trait::async_trait;
use sqlx::SqliteConnection;
use tracing::debug;

use crate::error::Result;

pub mod data_file_variable;
pub mod level_set;
pub mod provenance;
pub mod spatial;
pub mod station;
pub mod time_set;
pub mod variable_alias;

pub use data_file_variable::{
    find_data_file_variable, find_or_insert_data_file_variable,
    find_or_insert_data_file_variables, insert_data_file_variable, load_data_file_variables,
};
pub use level_set::{find_level_set, find_or_insert_level_set, insert_level_set};
pub use provenance::{
    find_emission, find_model, find_or_insert_emission, find_or_insert_model, find_or_insert_run,
    find_run, insert_emission, insert_model, insert_run,
};
pub use spatial::{
    find_grid, find_or_insert_grid, find_or_insert_spatial_ref_sys, find_spatial_ref_sys,
    insert_grid, insert_spatial_ref_sys, CUSTOM_SRID_BASE,
};
pub use station::{find_or_insert_station, find_station, insert_station};
pub use time_set::{find_or_insert_time_set, find_time_set, insert_time_set};
pub use variable_alias::{find_or_insert_variable_alias, find_variable_alias, insert_variable_alias};

/// Natural-key lookup plus constructor for one catalogue entity.
#[async_trait]
pub trait Resolver: Sync {
    type Output: Send;

    /// Entity name used in log records.
    const ENTITY: &'static str;

    async fn find(&self, conn: &mut SqliteConnection) -> Result<Option<Self::Output>>;

    async fn insert(&self, conn: &mut SqliteConnection) -> Result<Self::Output>;

    async fn find_or_insert(&self, conn: &mut SqliteConnection) -> Result<Self::Output> {
        if let Some(found) = self.find(&mut *conn).await? {
            debug!(entity = Self::ENTITY, "Found existing");
            return Ok(found);
        }
        let inserted = self.insert(conn).await?;
        debug!(entity = Self::ENTITY, "Inserted new");
        Ok(inserted)
    }
}
