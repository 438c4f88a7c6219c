//! Repository file endpoints

use crate::GitLabClient;
use crate::TOKEN_HEADER;
use crate::error::{ClientError, Result};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use neutron_core::domain::pipeline::PipelineManifest;
use serde::Deserialize;

/// Subset of the files API response that carries the content
#[derive(Debug, Deserialize)]
struct RepositoryFile {
    #[serde(default)]
    encoding: String,
    content: String,
}

impl GitLabClient {
    // =============================================================================
    // Pipeline Manifest
    // =============================================================================

    /// Fetch the pipeline manifest of a project at a ref
    ///
    /// # Arguments
    /// * `project_id` - Numeric project id or URL-encoded path
    /// * `manifest_ref` - Branch, tag or commit sha to read the file at
    ///
    /// # Errors
    /// `NotFound` if the file is absent at that ref, `Unauthorized` if the
    /// token is rejected, `Malformed` if the content cannot be decoded.
    pub async fn fetch_manifest(
        &self,
        project_id: &str,
        manifest_ref: &str,
    ) -> Result<PipelineManifest> {
        let mut url = self.api_url(&[
            "projects",
            project_id,
            "repository",
            "files",
            self.manifest_path(),
        ])?;
        url.query_pairs_mut().append_pair("ref", manifest_ref);

        tracing::debug!(project_id, manifest_ref, "fetching pipeline manifest");
        let response = self
            .client
            .get(url)
            .header(TOKEN_HEADER, &self.token)
            .send()
            .await?;

        let file: RepositoryFile = self.handle_response(response).await?;
        let raw = decode_file_content(&file.encoding, &file.content)?;
        PipelineManifest::from_slice(&raw).map_err(|e| ClientError::Malformed(e.to_string()))
    }
}

/// Decode the `content` field of a files API response.
///
/// GitLab wraps base64 content at 60 columns or so; whitespace is stripped
/// before decoding. An explicit `text` encoding is passed through unchanged.
pub fn decode_file_content(encoding: &str, content: &str) -> Result<Vec<u8>> {
    match encoding {
        "" | "base64" => {
            let compact: String = content.chars().filter(|c| !c.is_whitespace()).collect();
            STANDARD
                .decode(compact)
                .map_err(|e| ClientError::Malformed(format!("invalid base64 content: {}", e)))
        }
        "text" => Ok(content.as_bytes().to_vec()),
        other => Err(ClientError::Malformed(format!(
            "unsupported file encoding '{}'",
            other
        ))),
    }
}
