//! Log Repository
//!
//! Harvested pod logs. Content is appended chunk by chunk while the log is
//! streamed from the cluster, so rows grow in place instead of being written
//! in one piece.

use neutron_core::domain::harvest::{PodPhase, PodSummary};
use sqlx::PgPool;

/// Create (or reset) the log row of a pod before streaming into it
pub async fn open(
    pool: &PgPool,
    job_name: &str,
    pod_name: &str,
    phase: PodPhase,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO pod_logs (job_name, pod_name, phase, content)
        VALUES ($1, $2, $3, '')
        ON CONFLICT (job_name, pod_name) DO UPDATE
        SET phase = EXCLUDED.phase, content = '', created_at = NOW()
        "#,
    )
    .bind(job_name)
    .bind(pod_name)
    .bind(phase.as_str())
    .execute(pool)
    .await?;

    Ok(())
}

/// Append a chunk of text to a pod's log
pub async fn append(
    pool: &PgPool,
    job_name: &str,
    pod_name: &str,
    chunk: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        UPDATE pod_logs
        SET content = content || $3
        WHERE job_name = $1 AND pod_name = $2
        "#,
    )
    .bind(job_name)
    .bind(pod_name)
    .bind(chunk)
    .execute(pool)
    .await?;

    Ok(())
}

/// Get the persisted log of a pod
pub async fn find_by_pod(pool: &PgPool, pod_name: &str) -> Result<Option<String>, sqlx::Error> {
    let row: Option<(String,)> = sqlx::query_as(
        r#"
        SELECT content FROM pod_logs
        WHERE pod_name = $1
        ORDER BY created_at DESC
        LIMIT 1
        "#,
    )
    .bind(pod_name)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|(content,)| content))
}

/// Pods harvested for a job, with their terminal phase
pub async fn pod_statuses(pool: &PgPool, job_name: &str) -> Result<Vec<PodSummary>, sqlx::Error> {
    let rows = sqlx::query_as::<_, PodRow>(
        r#"
        SELECT pod_name, phase
        FROM pod_logs
        WHERE job_name = $1
        ORDER BY pod_name ASC
        "#,
    )
    .bind(job_name)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(|r| r.into()).collect())
}

// =============================================================================
// Database Row Types
// =============================================================================

#[derive(sqlx::FromRow)]
struct PodRow {
    pod_name: String,
    phase: String,
}

impl From<PodRow> for PodSummary {
    fn from(row: PodRow) -> Self {
        PodSummary {
            name: row.pod_name,
            phase: PodPhase::parse(&row.phase),
        }
    }
}
