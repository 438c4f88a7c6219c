//! Kubernetes REST client
//!
//! Speaks `/apis/batch/v1` and `/api/v1` directly with bearer-token auth.

use async_trait::async_trait;
use futures::{StreamExt, TryStreamExt};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use std::path::Path;

use super::types::{Job, JobList, Pod, PodList};
use super::{ClusterApi, ClusterError, LogStream};
use crate::config::{KubeSettings, SERVICE_ACCOUNT_CA};

#[derive(Debug, Clone)]
pub struct KubeClient {
    base_url: String,
    namespace: String,
    token: Option<String>,
    client: Client,
}

impl KubeClient {
    /// Build a client from settings, reading the token file and CA bundle
    /// from disk where configured.
    pub fn from_settings(settings: &KubeSettings) -> Result<Self, ClusterError> {
        let token = match &settings.token {
            Some(token) => Some(token.clone()),
            None => read_token(&settings.token_file)?,
        };

        let mut builder = Client::builder().danger_accept_invalid_certs(settings.insecure_tls);

        let ca_path = settings
            .ca_cert
            .clone()
            .or_else(|| Some(Path::new(SERVICE_ACCOUNT_CA).to_path_buf()).filter(|p| p.exists()));
        if let Some(path) = ca_path {
            let pem = std::fs::read(&path).map_err(|e| {
                ClusterError::Config(format!("cannot read CA bundle {}: {}", path.display(), e))
            })?;
            let cert = reqwest::Certificate::from_pem(&pem)
                .map_err(|e| ClusterError::Config(format!("invalid CA bundle: {}", e)))?;
            builder = builder.add_root_certificate(cert);
        }

        let client = builder
            .build()
            .map_err(|e| ClusterError::Config(format!("cannot build HTTP client: {}", e)))?;

        Ok(Self::with_client(&settings.api_url, &settings.namespace, token, client))
    }

    pub fn with_client(
        base_url: impl Into<String>,
        namespace: impl Into<String>,
        token: Option<String>,
        client: Client,
    ) -> Self {
        let base_url = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            namespace: namespace.into(),
            token,
            client,
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    fn jobs_url(&self) -> String {
        format!(
            "{}/apis/batch/v1/namespaces/{}/jobs",
            self.base_url, self.namespace
        )
    }

    fn pods_url(&self) -> String {
        format!("{}/api/v1/namespaces/{}/pods", self.base_url, self.namespace)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    // =============================================================================
    // Response Handlers
    // =============================================================================

    async fn check(&self, response: Response, what: &str) -> Result<Response, ClusterError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let message = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        if status == StatusCode::NOT_FOUND {
            return Err(ClusterError::NotFound(what.to_string()));
        }
        Err(ClusterError::api(status.as_u16(), message))
    }

    async fn handle_response<T: DeserializeOwned>(
        &self,
        response: Response,
        what: &str,
    ) -> Result<T, ClusterError> {
        self.check(response, what)
            .await?
            .json()
            .await
            .map_err(|e| ClusterError::Decode(e.to_string()))
    }
}

fn read_token(path: &Path) -> Result<Option<String>, ClusterError> {
    if !path.exists() {
        tracing::warn!("No cluster token at {}, sending anonymous requests", path.display());
        return Ok(None);
    }
    let raw = std::fs::read_to_string(path)
        .map_err(|e| ClusterError::Config(format!("cannot read token {}: {}", path.display(), e)))?;
    Ok(Some(raw.trim().to_string()))
}

#[async_trait]
impl ClusterApi for KubeClient {
    async fn create_job(&self, job: &Job) -> Result<Job, ClusterError> {
        let response = self
            .authorized(self.client.post(self.jobs_url()))
            .json(job)
            .send()
            .await?;
        self.handle_response(response, job.name()).await
    }

    async fn get_job(&self, name: &str) -> Result<Option<Job>, ClusterError> {
        let url = format!("{}/{}", self.jobs_url(), name);
        let response = self.authorized(self.client.get(url)).send().await?;
        match self.handle_response(response, name).await {
            Ok(job) => Ok(Some(job)),
            Err(ClusterError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn list_jobs(&self, label_selector: &str) -> Result<Vec<Job>, ClusterError> {
        let response = self
            .authorized(self.client.get(self.jobs_url()))
            .query(&[("labelSelector", label_selector)])
            .send()
            .await?;
        let list: JobList = self.handle_response(response, "jobs").await?;
        Ok(list.items)
    }

    async fn list_pods(&self, label_selector: &str) -> Result<Vec<Pod>, ClusterError> {
        let response = self
            .authorized(self.client.get(self.pods_url()))
            .query(&[("labelSelector", label_selector)])
            .send()
            .await?;
        let list: PodList = self.handle_response(response, "pods").await?;
        Ok(list.items)
    }

    async fn stream_pod_logs(&self, pod: &str, follow: bool) -> Result<LogStream, ClusterError> {
        let url = format!("{}/{}/log", self.pods_url(), pod);
        let response = self
            .authorized(self.client.get(url))
            .query(&[("follow", if follow { "true" } else { "false" })])
            .send()
            .await?;
        let response = self.check(response, pod).await?;
        Ok(response.bytes_stream().map_err(ClusterError::from).boxed())
    }

    async fn delete_job(&self, name: &str) -> Result<(), ClusterError> {
        let url = format!("{}/{}", self.jobs_url(), name);
        let response = self
            .authorized(self.client.delete(url))
            .query(&[("propagationPolicy", "Background")])
            .send()
            .await?;
        self.check(response, name).await?;
        Ok(())
    }
}
