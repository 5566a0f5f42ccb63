//! VariableAlias, keyed by (long name, standard name, units).

use async_trait::async_trait;
use sqlx::SqliteConnection;

use nc_describe::VariableDescription;

use super::Resolver;
use crate::error::Result;
use crate::models::VariableAlias;

pub struct VariableAliasResolver<'a> {
    pub variable: &'a VariableDescription,
}

#[async_trait]
impl<'a> Resolver for VariableAliasResolver<'a> {
    type Output = VariableAlias;
    const ENTITY: &'static str = "variable_alias";

    async fn find(&self, conn: &mut SqliteConnection) -> Result<Option<VariableAlias>> {
        let v = self.variable;
        let alias = sqlx::query_as::<_, VariableAlias>(
            "SELECT variable_alias_id, variable_long_name, variable_standard_name, variable_units \
             FROM variable_aliases \
             WHERE variable_long_name = ? AND variable_standard_name IS ? AND variable_units = ? \
             ORDER BY variable_alias_id LIMIT 1",
        )
        .bind(&v.long_name)
        .bind(&v.standard_name)
        .bind(&v.units)
        .fetch_optional(conn)
        .await?;
        Ok(alias)
    }

    async fn insert(&self, conn: &mut SqliteConnection) -> Result<VariableAlias> {
        let v = self.variable;
        let variable_alias_id = sqlx::query(
            "INSERT INTO variable_aliases (variable_long_name, variable_standard_name, variable_units) \
             VALUES (?, ?, ?)",
        )
        .bind(&v.long_name)
        .bind(&v.standard_name)
        .bind(&v.units)
        .execute(conn)
        .await?
        .last_insert_rowid();

        Ok(VariableAlias {
            variable_alias_id,
            variable_long_name: v.long_name.clone(),
            variable_standard_name: v.standard_name.clone(),
            variable_units: v.units.clone(),
        })
    }
}

pub async fn find_variable_alias(
    conn: &mut SqliteConnection,
    variable: &VariableDescription,
) -> Result<Option<VariableAlias>> {
    VariableAliasResolver { variable }.find(conn).await
}

pub async fn insert_variable_alias(
    conn: &mut SqliteConnection,
    variable: &VariableDescription,
) -> Result<VariableAlias> {
    VariableAliasResolver { variable }.insert(conn).await
}

pub async fn find_or_insert_variable_alias(
    conn: &mut SqliteConnection,
    variable: &VariableDescription,
) -> Result<VariableAlias> {
    VariableAliasResolver { variable }.find_or_insert(conn).await
}
