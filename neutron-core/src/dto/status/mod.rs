//! Job status DTOs

use serde::{Deserialize, Serialize};

use crate::domain::harvest::{JobOutcome, PodSummary};

/// Where a status view was assembled from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusSource {
    /// Outcome persisted by a harvest pass
    Persisted,
    /// Queried from the cluster because nothing is persisted yet
    Live,
}

/// Body of `GET /status/{jobName}`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobStatusView {
    pub job_name: String,
    pub source: StatusSource,
    pub outcome: JobOutcome,
    pub pods: Vec<PodSummary>,
}
