//! Commit status endpoints

use crate::GitLabClient;
use crate::TOKEN_HEADER;
use crate::error::Result;
use neutron_core::domain::step::StepResult;
use serde::Serialize;

/// Body of `POST /projects/{id}/statuses/{sha}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommitStatus {
    pub state: String,
    pub target_url: String,
    pub description: String,
    /// `{jobName}/{stepName}`
    pub context: String,
}

impl CommitStatus {
    pub fn new(
        result: StepResult,
        job_name: &str,
        step_name: &str,
        target_url: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            state: result.state().to_string(),
            target_url: target_url.into(),
            description: description.into(),
            context: format!("{}/{}", job_name, step_name),
        }
    }
}

impl GitLabClient {
    /// Post a commit status
    ///
    /// # Arguments
    /// * `project_id` - Project the commit belongs to
    /// * `sha` - Concrete commit to attach the status to
    /// * `status` - State, link, description and context
    pub async fn post_status(&self, project_id: &str, sha: &str, status: &CommitStatus) -> Result<()> {
        let url = self.api_url(&["projects", project_id, "statuses", sha])?;
        let response = self
            .client
            .post(url)
            .header(TOKEN_HEADER, &self.token)
            .json(status)
            .send()
            .await?;

        self.handle_empty_response(response).await
    }
}
