//! Cluster Module
//!
//! Seam between the orchestrator and the Kubernetes API. Services only see
//! the [`ClusterApi`] trait; [`KubeClient`] is the REST implementation used
//! in production and tests substitute in-memory fakes.

pub mod http;
pub mod types;

pub use http::KubeClient;

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use thiserror::Error;

use types::{Job, Pod};

/// Label every job created by the launcher carries
pub const MANAGED_BY_LABEL: &str = "app.kubernetes.io/managed-by";
pub const MANAGED_BY_VALUE: &str = "neutron";

/// Body of a pod log, delivered as it is read
pub type LogStream = BoxStream<'static, Result<Bytes, ClusterError>>;

#[derive(Debug, Error)]
pub enum ClusterError {
    #[error("cluster request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("cluster API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid cluster configuration: {0}")]
    Config(String),

    #[error("failed to decode cluster response: {0}")]
    Decode(String),
}

impl ClusterError {
    pub fn api(status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            message: message.into(),
        }
    }
}

/// Operations the orchestrator performs against the cluster.
///
/// Implementations are scoped to a single namespace and must be safe to
/// share across concurrent harvest workers.
#[async_trait]
pub trait ClusterApi: Send + Sync {
    /// Submit a job. Returns the job as stored by the cluster.
    async fn create_job(&self, job: &Job) -> Result<Job, ClusterError>;

    async fn get_job(&self, name: &str) -> Result<Option<Job>, ClusterError>;

    async fn list_jobs(&self, label_selector: &str) -> Result<Vec<Job>, ClusterError>;

    async fn list_pods(&self, label_selector: &str) -> Result<Vec<Pod>, ClusterError>;

    /// Stream a pod's log. With `follow`, the stream stays open while the
    /// container runs.
    async fn stream_pod_logs(&self, pod: &str, follow: bool) -> Result<LogStream, ClusterError>;

    /// Delete a job; its pods are removed by the cluster in the background
    async fn delete_job(&self, name: &str) -> Result<(), ClusterError>;
}

/// Label selector matching every job the launcher created
pub fn managed_jobs_selector() -> String {
    format!("{}={}", MANAGED_BY_LABEL, MANAGED_BY_VALUE)
}
