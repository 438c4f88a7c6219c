//! Status Service
//!
//! Job status reads. Harvested jobs are answered from the database; jobs not
//! harvested yet are looked up in the cluster.

use neutron_core::domain::harvest::JobOutcome;
use neutron_core::domain::job::JobAnnotations;
use neutron_core::dto::status::{JobStatusView, StatusSource};
use sqlx::PgPool;
use thiserror::Error;

use crate::cluster::{ClusterApi, ClusterError};
use crate::repository::{job_repository, log_repository};

#[derive(Debug, Error)]
pub enum StatusError {
    #[error("job not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Cluster(#[from] ClusterError),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Get the status of a job, preferring the harvested record
pub async fn get_status(
    pool: &PgPool,
    cluster: &dyn ClusterApi,
    job_name: &str,
) -> Result<JobStatusView, StatusError> {
    if let Some(outcome) = job_repository::find_outcome(pool, job_name).await? {
        let pods = log_repository::pod_statuses(pool, job_name).await?;
        return Ok(JobStatusView {
            job_name: job_name.to_string(),
            source: StatusSource::Persisted,
            outcome,
            pods,
        });
    }

    live_status(cluster, job_name).await
}

/// Build a status view from the cluster alone
pub async fn live_status(cluster: &dyn ClusterApi, job_name: &str) -> Result<JobStatusView, StatusError> {
    let job = cluster
        .get_job(job_name)
        .await?
        .ok_or_else(|| StatusError::NotFound(job_name.to_string()))?;

    let pods = cluster.list_pods(&job.pod_selector()).await?;
    let (active, succeeded, failed) = job.counters();
    let annotations = JobAnnotations::from_map(&job.metadata.annotations);

    Ok(JobStatusView {
        job_name: job_name.to_string(),
        source: StatusSource::Live,
        outcome: JobOutcome::from_parts(&annotations, active, succeeded, failed),
        pods: pods.iter().map(|pod| pod.summary()).collect(),
    })
}
