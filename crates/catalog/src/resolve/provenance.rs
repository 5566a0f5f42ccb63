//! Model, Emission and Run.

use async_trait::async_trait;
use sqlx::SqliteConnection;
use tracing::debug;

use nc_describe::{Provenance, RunRef};

use super::Resolver;
use crate::error::Result;
use crate::models::{Emission, Model, Run};

const MODEL_COLUMNS: &str =
    "model_id, model_short_name, model_long_name, model_organization, type";

const RUN_COLUMNS: &str = "r.run_id, r.run_name, r.project, r.model_id, r.emission_id, \
                           r.driving_run_id, r.initialized_from_id";

pub struct ModelResolver<'a> {
    pub provenance: &'a Provenance,
}

#[async_trait]
impl<'a> Resolver for ModelResolver<'a> {
    type Output = Model;
    const ENTITY: &'static str = "model";

    async fn find(&self, conn: &mut SqliteConnection) -> Result<Option<Model>> {
        let model = sqlx::query_as::<_, Model>(&format!(
            "SELECT {MODEL_COLUMNS} FROM models WHERE model_short_name = ? LIMIT 1"
        ))
        .bind(&self.provenance.model_short_name)
        .fetch_optional(conn)
        .await?;
        Ok(model)
    }

    async fn insert(&self, conn: &mut SqliteConnection) -> Result<Model> {
        let p = self.provenance;
        let model_id = sqlx::query(
            "INSERT INTO models (model_short_name, model_long_name, model_organization, type) \
             VALUES (?, ?, ?, ?)",
        )
        .bind(&p.model_short_name)
        .bind(&p.model_long_name)
        .bind(&p.organization)
        .bind(p.model_type.as_str())
        .execute(conn)
        .await?
        .last_insert_rowid();

        Ok(Model {
            model_id,
            model_short_name: p.model_short_name.clone(),
            model_long_name: p.model_long_name.clone(),
            model_organization: p.organization.clone(),
            model_type: p.model_type.as_str().to_string(),
        })
    }
}

pub struct EmissionResolver<'a> {
    pub provenance: &'a Provenance,
}

#[async_trait]
impl<'a> Resolver for EmissionResolver<'a> {
    type Output = Emission;
    const ENTITY: &'static str = "emission";

    async fn find(&self, conn: &mut SqliteConnection) -> Result<Option<Emission>> {
        let emission = sqlx::query_as::<_, Emission>(
            "SELECT emission_id, emission_short_name, emission_long_name \
             FROM emissions WHERE emission_short_name = ? LIMIT 1",
        )
        .bind(&self.provenance.emission_short_name)
        .fetch_optional(conn)
        .await?;
        Ok(emission)
    }

    async fn insert(&self, conn: &mut SqliteConnection) -> Result<Emission> {
        let emission_id = sqlx::query("INSERT INTO emissions (emission_short_name) VALUES (?)")
            .bind(&self.provenance.emission_short_name)
            .execute(conn)
            .await?
            .last_insert_rowid();

        Ok(Emission {
            emission_id,
            emission_short_name: self.provenance.emission_short_name.clone(),
            emission_long_name: None,
        })
    }
}

pub struct RunResolver<'a> {
    pub provenance: &'a Provenance,
}

#[async_trait]
impl<'a> Resolver for RunResolver<'a> {
    type Output = Run;
    const ENTITY: &'static str = "run";

    async fn find(&self, conn: &mut SqliteConnection) -> Result<Option<Run>> {
        let p = self.provenance;
        find_run_by_key(conn, &p.run_name, &p.model_short_name, &p.emission_short_name).await
    }

    /// Resolves the run's Model and Emission first, then links the driving
    /// and initialized-from runs when they are already catalogued.
    async fn insert(&self, conn: &mut SqliteConnection) -> Result<Run> {
        let p = self.provenance;
        let model = ModelResolver { provenance: p }.find_or_insert(&mut *conn).await?;
        let emission = EmissionResolver { provenance: p }.find_or_insert(&mut *conn).await?;

        let driving_run_id = linked_run_id(&mut *conn, p.driving_run.as_ref(), "driving_run").await?;
        let initialized_from_id =
            linked_run_id(&mut *conn, p.initialized_from.as_ref(), "initialized_from").await?;

        let run_id = sqlx::query(
            "INSERT INTO runs (run_name, project, model_id, emission_id, driving_run_id, initialized_from_id) \
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&p.run_name)
        .bind(&p.project)
        .bind(model.model_id)
        .bind(emission.emission_id)
        .bind(driving_run_id)
        .bind(initialized_from_id)
        .execute(conn)
        .await?
        .last_insert_rowid();

        Ok(Run {
            run_id,
            run_name: p.run_name.clone(),
            project: Some(p.project.clone()),
            model_id: model.model_id,
            emission_id: emission.emission_id,
            driving_run_id,
            initialized_from_id,
        })
    }
}

async fn find_run_by_key(
    conn: &mut SqliteConnection,
    run_name: &str,
    model_short_name: &str,
    emission_short_name: &str,
) -> Result<Option<Run>> {
    let run = sqlx::query_as::<_, Run>(&format!(
        "SELECT {RUN_COLUMNS} FROM runs r \
         JOIN models m ON m.model_id = r.model_id \
         JOIN emissions e ON e.emission_id = r.emission_id \
         WHERE m.model_short_name = ? AND e.emission_short_name = ? AND r.run_name = ? \
         ORDER BY r.run_id LIMIT 1"
    ))
    .bind(model_short_name)
    .bind(emission_short_name)
    .bind(run_name)
    .fetch_optional(conn)
    .await?;
    Ok(run)
}

async fn linked_run_id(
    conn: &mut SqliteConnection,
    reference: Option<&RunRef>,
    link: &'static str,
) -> Result<Option<i64>> {
    let Some(reference) = reference else {
        return Ok(None);
    };
    let run = find_run_by_key(
        conn,
        &reference.run_name,
        &reference.model_short_name,
        &reference.emission_short_name,
    )
    .await?;
    if run.is_none() {
        debug!(
            link,
            run = %reference.run_name,
            model = %reference.model_short_name,
            emission = %reference.emission_short_name,
            "Referenced run is not catalogued; leaving link empty"
        );
    }
    Ok(run.map(|r| r.run_id))
}

pub async fn find_model(conn: &mut SqliteConnection, provenance: &Provenance) -> Result<Option<Model>> {
    ModelResolver { provenance }.find(conn).await
}

pub async fn insert_model(conn: &mut SqliteConnection, provenance: &Provenance) -> Result<Model> {
    ModelResolver { provenance }.insert(conn).await
}

pub async fn find_or_insert_model(conn: &mut SqliteConnection, provenance: &Provenance) -> Result<Model> {
    ModelResolver { provenance }.find_or_insert(conn).await
}

pub async fn find_emission(conn: &mut SqliteConnection, provenance: &Provenance) -> Result<Option<Emission>> {
    EmissionResolver { provenance }.find(conn).await
}

pub async fn insert_emission(conn: &mut SqliteConnection, provenance: &Provenance) -> Result<Emission> {
    EmissionResolver { provenance }.insert(conn).await
}

pub async fn find_or_insert_emission(
    conn: &mut SqliteConnection,
    provenance: &Provenance,
) -> Result<Emission> {
    EmissionResolver { provenance }.find_or_insert(conn).await
}

pub async fn find_run(conn: &mut SqliteConnection, provenance: &Provenance) -> Result<Option<Run>> {
    RunResolver { provenance }.find(conn).await
}

pub async fn insert_run(conn: &mut SqliteConnection, provenance: &Provenance) -> Result<Run> {
    RunResolver { provenance }.insert(conn).await
}

pub async fn find_or_insert_run(conn: &mut SqliteConnection, provenance: &Provenance) -> Result<Run> {
    RunResolver { provenance }.find_or_insert(conn).await
}
