use sqlx::{PgPool, postgres::PgPoolOptions};
use std::time::Duration;

pub async fn create_pool(database_url: &str) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .acquire_timeout(Duration::from_secs(5))
        .connect(database_url)
        .await
}

pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::Error> {
    // Registered projects allowed to deliver webhooks
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS projects (
            id VARCHAR(255) PRIMARY KEY,
            webhook_type VARCHAR(50) NOT NULL,
            repo_url TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // One row per launched cluster job; outcome is filled in by the harvester
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS jobs (
            id BIGSERIAL PRIMARY KEY,
            name VARCHAR(63) NOT NULL UNIQUE,
            project_id VARCHAR(255),
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            outcome JSONB
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Harvested pod logs
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS pod_logs (
            id BIGSERIAL PRIMARY KEY,
            job_name VARCHAR(63) NOT NULL,
            pod_name VARCHAR(253) NOT NULL,
            phase VARCHAR(20) NOT NULL,
            content TEXT NOT NULL DEFAULT '',
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            UNIQUE (job_name, pod_name)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_jobs_project_id ON jobs(project_id)")
        .execute(pool)
        .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_pod_logs_pod_name ON pod_logs(pod_name)")
        .execute(pool)
        .await?;

    tracing::info!("Database migrations completed successfully");
    Ok(())
}
