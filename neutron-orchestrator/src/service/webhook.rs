//! Webhook Service
//!
//! Handles one webhook delivery end to end, synchronously: project lookup,
//! event resolution, manifest fetch, then one launch per accepted task.
//! Tasks that do not accept the trigger are reported green without a job.

use neutron_client::{ClientError, CommitStatus, ManifestFetcher, StatusPublisher};
use neutron_core::domain::pipeline::PipelineManifest;
use neutron_core::domain::step::StepResult;
use neutron_core::domain::trigger::TriggerKind;
use neutron_core::dto::webhook::LaunchFailure;
use sqlx::PgPool;
use thiserror::Error;

use crate::repository::{job_repository, project_repository};
use crate::service::launcher::{LaunchContext, Launcher};
use crate::service::resolver;

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("unknown project: {0}")]
    UnknownProject(String),

    #[error("failed to fetch pipeline manifest at {manifest_ref}: {source}")]
    Manifest {
        manifest_ref: String,
        #[source]
        source: ClientError,
    },

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// What happened to each task of the manifest
#[derive(Debug)]
pub struct DispatchReport {
    pub pipeline: PipelineManifest,
    /// Created cluster jobs
    pub jobs: Vec<String>,
    pub failures: Vec<LaunchFailure>,
    /// Tasks reported as skipped for this trigger
    pub skipped: Vec<String>,
}

impl DispatchReport {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Message of the synthetic success reported for a task the trigger skips
pub fn skip_message(trigger: TriggerKind) -> String {
    format!("Current job skipped in {}.", trigger)
}

/// Split task names into those to launch and those to skip, in manifest order
pub fn plan(manifest: &PipelineManifest, trigger: TriggerKind) -> (Vec<&str>, Vec<&str>) {
    let mut launch = Vec::new();
    let mut skip = Vec::new();
    for (name, task) in &manifest.jobs {
        if task.accepts(trigger) {
            launch.push(name.as_str());
        } else {
            skip.push(name.as_str());
        }
    }
    (launch, skip)
}

/// Handle a delivery for the registered project `project_ref`
pub async fn handle(
    pool: &PgPool,
    fetcher: &dyn ManifestFetcher,
    publisher: &dyn StatusPublisher,
    launcher: &Launcher,
    project_ref: &str,
    body: &[u8],
) -> Result<DispatchReport, ResolveError> {
    let project = project_repository::find_by_id(pool, project_ref)
        .await?
        .ok_or_else(|| ResolveError::UnknownProject(project_ref.to_string()))?;

    let resolution = resolver::resolve(project.webhook_type, body);
    let ctx = LaunchContext {
        source: project.webhook_type,
        trigger: resolution.trigger,
        project_id: resolution.event.project_id.to_string(),
        repo_url: project.repo_url,
    };

    let report = dispatch(fetcher, publisher, launcher, &ctx).await?;

    for job in &report.jobs {
        if let Err(e) = job_repository::create(pool, job, &project.id).await {
            tracing::error!(job = %job, "Failed to record launched job: {}", e);
        }
    }

    Ok(report)
}

/// Fetch the manifest for a resolved delivery and act on every task.
///
/// Each task is launched independently; one failure does not stop the rest.
pub async fn dispatch(
    fetcher: &dyn ManifestFetcher,
    publisher: &dyn StatusPublisher,
    launcher: &Launcher,
    ctx: &LaunchContext,
) -> Result<DispatchReport, ResolveError> {
    let manifest_ref = ctx.trigger.manifest_ref();
    let pipeline = fetcher
        .fetch(&ctx.project_id, manifest_ref)
        .await
        .map_err(|source| ResolveError::Manifest {
            manifest_ref: manifest_ref.to_string(),
            source,
        })?;

    let (launch, skip) = plan(&pipeline, ctx.trigger.kind);
    let mut jobs = Vec::new();
    let mut failures = Vec::new();

    for task_name in &launch {
        let Some(task) = pipeline.task(task_name) else {
            continue;
        };
        match launcher.launch(ctx, task_name, task).await {
            Ok(spec) => {
                tracing::info!(job = %spec.name, task = %task_name, "Launched job");
                jobs.push(spec.name);
            }
            Err(e) => {
                tracing::error!(task = %task_name, "Failed to launch task: {}", e);
                failures.push(LaunchFailure {
                    task: task_name.to_string(),
                    error: e.to_string(),
                });
            }
        }
    }

    for task_name in &skip {
        let status = CommitStatus::new(
            StepResult::Success,
            task_name,
            "",
            launcher.public_url(),
            skip_message(ctx.trigger.kind),
        );
        if let Err(e) = publisher
            .publish(&ctx.project_id, &ctx.trigger.report_ref, &status)
            .await
        {
            tracing::warn!(task = %task_name, "Failed to report skipped task: {}", e);
        }
    }

    let skipped = skip.iter().map(|s| s.to_string()).collect();
    Ok(DispatchReport {
        pipeline,
        jobs,
        failures,
        skipped,
    })
}
