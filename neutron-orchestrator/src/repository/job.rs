//! Job Repository
//!
//! Launched jobs and their harvested outcomes.

use neutron_core::domain::harvest::JobOutcome;
use sqlx::PgPool;
use sqlx::types::Json;

/// Record a job created in the cluster
pub async fn create(pool: &PgPool, name: &str, project_id: &str) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO jobs (name, project_id)
        VALUES ($1, $2)
        ON CONFLICT (name) DO NOTHING
        "#,
    )
    .bind(name)
    .bind(project_id)
    .execute(pool)
    .await?;

    Ok(())
}

/// Store the outcome of a job, keyed by name. Jobs launched outside this
/// service get a row without a project.
pub async fn upsert_outcome(
    pool: &PgPool,
    name: &str,
    outcome: &JobOutcome,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO jobs (name, outcome)
        VALUES ($1, $2)
        ON CONFLICT (name) DO UPDATE SET outcome = EXCLUDED.outcome
        "#,
    )
    .bind(name)
    .bind(Json(outcome))
    .execute(pool)
    .await?;

    Ok(())
}

/// Find the persisted outcome of a job, if it has been harvested
pub async fn find_outcome(pool: &PgPool, name: &str) -> Result<Option<JobOutcome>, sqlx::Error> {
    let row: Option<(Option<Json<JobOutcome>>,)> =
        sqlx::query_as("SELECT outcome FROM jobs WHERE name = $1")
            .bind(name)
            .fetch_optional(pool)
            .await?;

    Ok(row.and_then(|(outcome,)| outcome).map(|Json(outcome)| outcome))
}
