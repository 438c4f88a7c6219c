//! Project Repository
//!
//! Lookup of projects registered to deliver webhooks.

use neutron_core::domain::project::{Project, SourceKind};
use sqlx::PgPool;

/// Find a registered project by its webhook id
pub async fn find_by_id(pool: &PgPool, id: &str) -> Result<Option<Project>, sqlx::Error> {
    let row = sqlx::query_as::<_, ProjectRow>(
        r#"
        SELECT id, webhook_type, repo_url
        FROM projects
        WHERE id = $1
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    row.map(Project::try_from).transpose()
}

/// Register or update a project
pub async fn upsert(pool: &PgPool, project: &Project) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO projects (id, webhook_type, repo_url)
        VALUES ($1, $2, $3)
        ON CONFLICT (id) DO UPDATE
        SET webhook_type = EXCLUDED.webhook_type, repo_url = EXCLUDED.repo_url
        "#,
    )
    .bind(&project.id)
    .bind(project.webhook_type.as_str())
    .bind(&project.repo_url)
    .execute(pool)
    .await?;

    Ok(())
}

// =============================================================================
// Database Row Types
// =============================================================================

#[derive(sqlx::FromRow)]
struct ProjectRow {
    id: String,
    webhook_type: String,
    repo_url: String,
}

impl TryFrom<ProjectRow> for Project {
    type Error = sqlx::Error;

    fn try_from(row: ProjectRow) -> Result<Self, Self::Error> {
        let webhook_type = row
            .webhook_type
            .parse::<SourceKind>()
            .map_err(|e| sqlx::Error::Decode(e.into()))?;

        Ok(Project {
            id: row.id,
            webhook_type,
            repo_url: row.repo_url,
        })
    }
}
