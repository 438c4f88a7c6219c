//! Webhook delivery DTOs

use serde::{Deserialize, Serialize};

use crate::domain::pipeline::PipelineManifest;

/// Response when every accepted task launched
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookAccepted {
    pub status: String,
    pub pipeline: PipelineManifest,
    /// Names of the cluster jobs that were created
    pub jobs: Vec<String>,
}

/// One task that could not be launched
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LaunchFailure {
    pub task: String,
    pub error: String,
}

/// Response when at least one task failed to launch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookPartialFailure {
    pub error: String,
    pub jobs: Vec<String>,
    pub failures: Vec<LaunchFailure>,
}
