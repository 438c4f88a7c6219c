//! Harvest domain types

use crate::domain::job::JobAnnotations;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle phase of a pod, as reported by the cluster
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PodPhase {
    Pending,
    Running,
    Succeeded,
    Failed,
    #[serde(other)]
    Unknown,
}

impl PodPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, PodPhase::Succeeded | PodPhase::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PodPhase::Pending => "Pending",
            PodPhase::Running => "Running",
            PodPhase::Succeeded => "Succeeded",
            PodPhase::Failed => "Failed",
            PodPhase::Unknown => "Unknown",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "Pending" => PodPhase::Pending,
            "Running" => PodPhase::Running,
            "Succeeded" => PodPhase::Succeeded,
            "Failed" => PodPhase::Failed,
            _ => PodPhase::Unknown,
        }
    }
}

impl fmt::Display for PodPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Captured log of one terminal pod
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HarvestRecord {
    pub job_name: String,
    pub pod_name: String,
    pub phase: PodPhase,
    pub content: String,
}

/// Final outcome of a job, upserted once keyed by job name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobOutcome {
    pub webhook_type: String,
    pub repo_url: String,
    pub trigger_type: String,
    pub project_url: String,
    pub active: i32,
    pub succeeded: i32,
    pub failed: i32,
}

impl JobOutcome {
    /// Combines launcher annotations with the job's live pod counters
    pub fn from_parts(annotations: &JobAnnotations, active: i32, succeeded: i32, failed: i32) -> Self {
        Self {
            webhook_type: annotations.source_type.clone(),
            repo_url: annotations.repo_url.clone(),
            trigger_type: annotations.trigger_type.clone(),
            project_url: annotations.project_url.clone(),
            active,
            succeeded,
            failed,
        }
    }
}

/// Pod name and phase, as shown in status views
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PodSummary {
    pub name: String,
    pub phase: PodPhase,
}
