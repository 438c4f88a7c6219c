//! Step status reporting
//!
//! Every report is sent once. A failed post is logged and dropped; the
//! process exit code remains the authoritative result.

use async_trait::async_trait;
use neutron_client::{CommitStatus, StatusPublisher};
use neutron_core::domain::step::StepResult;
use neutron_core::env::RunnerEnv;
use std::sync::Arc;
use tracing::{debug, warn};

#[async_trait]
pub trait StatusReporter: Send + Sync {
    /// Report `result` for `step`; an empty step name reports the task itself
    async fn report(&self, step: &str, result: StepResult, description: &str);
}

/// Reports to the commit the job was triggered for
pub struct GitLabReporter {
    publisher: Arc<dyn StatusPublisher>,
    project_id: String,
    report_sha: String,
    job_name: String,
    target_url: String,
}

impl GitLabReporter {
    pub fn new(publisher: Arc<dyn StatusPublisher>, env: &RunnerEnv) -> Self {
        Self {
            publisher,
            project_id: env.project_id.clone(),
            report_sha: env.report_sha.clone(),
            job_name: env.job_name.clone(),
            target_url: env.pipeline_url.clone(),
        }
    }
}

#[async_trait]
impl StatusReporter for GitLabReporter {
    async fn report(&self, step: &str, result: StepResult, description: &str) {
        let status = CommitStatus::new(result, &self.job_name, step, &self.target_url, description);

        match self
            .publisher
            .publish(&self.project_id, &self.report_sha, &status)
            .await
        {
            Ok(()) => debug!(context = %status.context, state = %status.state, "Status reported"),
            Err(e) => warn!(context = %status.context, state = %status.state, "Failed to report status: {}", e),
        }
    }
}
