//! Neutron GitLab Client
//!
//! A small, typed HTTP client for the parts of the GitLab v4 API that neutron
//! needs: reading the pipeline manifest out of a repository and posting
//! commit statuses.
//!
//! The orchestrator uses it as the manifest fetcher and for skip reports; the
//! runner uses it as the transport behind its step status reporter.
//!
//! # Example
//!
//! ```no_run
//! use neutron_client::{GitLabClient, ManifestFetcher};
//!
//! # async fn example() -> neutron_client::Result<()> {
//! let client = GitLabClient::new("https://gitlab.example.com", "glpat-token");
//! let manifest = client.fetch("42", "deadbeef").await?;
//! println!("{} tasks", manifest.jobs.len());
//! # Ok(())
//! # }
//! ```

pub mod error;
mod files;
mod statuses;

// Re-export commonly used types
pub use error::{ClientError, Result};
pub use files::decode_file_content;
pub use statuses::CommitStatus;

use async_trait::async_trait;
use neutron_core::domain::pipeline::{DEFAULT_MANIFEST_PATH, PipelineManifest};
use reqwest::{Client, Url};
use serde::de::DeserializeOwned;

/// Header GitLab reads personal/project access tokens from
const TOKEN_HEADER: &str = "PRIVATE-TOKEN";

/// Reads the pipeline manifest of a project at a given ref
#[async_trait]
pub trait ManifestFetcher: Send + Sync {
    /// Fetch and decode the manifest of `project_id` at `manifest_ref`
    async fn fetch(&self, project_id: &str, manifest_ref: &str) -> Result<PipelineManifest>;
}

/// Posts commit statuses to the source-control API
#[async_trait]
pub trait StatusPublisher: Send + Sync {
    async fn publish(&self, project_id: &str, sha: &str, status: &CommitStatus) -> Result<()>;
}

/// HTTP client for the GitLab v4 API
#[derive(Debug, Clone)]
pub struct GitLabClient {
    /// Base URL of the GitLab instance (e.g., "https://gitlab.example.com")
    base_url: String,
    /// Private token sent with every request
    token: String,
    /// Repository path of the pipeline manifest
    manifest_path: String,
    /// HTTP client instance
    client: Client,
}

impl GitLabClient {
    /// Create a new GitLab client
    ///
    /// # Arguments
    /// * `base_url` - The base URL of the GitLab instance
    /// * `token` - A private token with `api` scope
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self::with_client(base_url, token, Client::new())
    }

    /// Create a new GitLab client with a custom HTTP client
    ///
    /// This allows you to configure timeouts, proxies, TLS settings, etc.
    pub fn with_client(base_url: impl Into<String>, token: impl Into<String>, client: Client) -> Self {
        let base_url = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.into(),
            manifest_path: DEFAULT_MANIFEST_PATH.to_string(),
            client,
        }
    }

    /// Override the repository path the manifest is read from
    pub fn with_manifest_path(mut self, path: impl Into<String>) -> Self {
        self.manifest_path = path.into();
        self
    }

    /// Get the base URL of the GitLab instance
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn manifest_path(&self) -> &str {
        &self.manifest_path
    }

    /// Build `{base}/api/v4/{segments...}`, percent-encoding each segment
    /// (so a file path like `ci/neutron.yaml` becomes one `ci%2Fneutron.yaml`
    /// segment, as the files API expects).
    fn api_url(&self, segments: &[&str]) -> Result<Url> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| ClientError::InvalidRequest(format!("invalid base URL: {}", e)))?;
        url.path_segments_mut()
            .map_err(|_| ClientError::InvalidRequest("base URL cannot be a base".to_string()))?
            .pop_if_empty()
            .extend(["api", "v4"])
            .extend(segments);
        Ok(url)
    }

    // =============================================================================
    // Response Handlers
    // =============================================================================

    /// Handle an API response and deserialize JSON
    async fn handle_response<T: DeserializeOwned>(&self, response: reqwest::Response) -> Result<T> {
        let status = response.status();

        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ClientError::from_status(status.as_u16(), error_text));
        }

        response
            .json()
            .await
            .map_err(|e| ClientError::Malformed(format!("Failed to parse JSON response: {}", e)))
    }

    /// Handle an API response whose body is irrelevant
    async fn handle_empty_response(&self, response: reqwest::Response) -> Result<()> {
        let status = response.status();

        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ClientError::from_status(status.as_u16(), error_text));
        }

        Ok(())
    }
}

#[async_trait]
impl ManifestFetcher for GitLabClient {
    async fn fetch(&self, project_id: &str, manifest_ref: &str) -> Result<PipelineManifest> {
        self.fetch_manifest(project_id, manifest_ref).await
    }
}

#[async_trait]
impl StatusPublisher for GitLabClient {
    async fn publish(&self, project_id: &str, sha: &str, status: &CommitStatus) -> Result<()> {
        self.post_status(project_id, sha, status).await
    }
}
