//! Pipeline manifest domain types
//!
//! The manifest is a YAML document kept in each repository:
//!
//! ```yaml
//! jobs:
//!   build:
//!     image: rust:1.85
//!     trigger: [PUSH, MR]
//!     steps:
//!       - name: test
//!         cmd: cargo test --locked
//! ```

use crate::domain::trigger::TriggerKind;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Manifest path used when none is configured
pub const DEFAULT_MANIFEST_PATH: &str = "neutron.yaml";

/// Errors raised while decoding or encoding a manifest
#[derive(Debug, thiserror::Error)]
pub enum ManifestError {
    #[error("malformed pipeline manifest: {0}")]
    Decode(#[source] serde_yaml::Error),

    #[error("failed to encode pipeline manifest: {0}")]
    Encode(#[source] serde_yaml::Error),

    #[error("pipeline manifest is not valid UTF-8")]
    Encoding(#[from] std::str::Utf8Error),

    #[error("failed to read pipeline manifest: {0}")]
    Io(#[from] std::io::Error),
}

/// Mapping from task name to task definition
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineManifest {
    #[serde(default)]
    pub jobs: BTreeMap<String, Task>,
}

/// Named unit of a manifest; launched as exactly one cluster job
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub image: String,
    #[serde(default)]
    pub trigger: Vec<TriggerKind>,
    #[serde(default)]
    pub steps: Vec<Step>,
}

/// One ordered shell command within a task
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Step {
    pub name: String,
    pub cmd: String,
}

impl PipelineManifest {
    pub fn from_yaml(source: &str) -> Result<Self, ManifestError> {
        serde_yaml::from_str(source).map_err(ManifestError::Decode)
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self, ManifestError> {
        Self::from_yaml(std::str::from_utf8(bytes)?)
    }

    /// Reads and decodes a manifest from disk
    pub fn from_path(path: impl AsRef<std::path::Path>) -> Result<Self, ManifestError> {
        let raw = std::fs::read(path)?;
        Self::from_slice(&raw)
    }

    pub fn to_yaml(&self) -> Result<String, ManifestError> {
        serde_yaml::to_string(self).map_err(ManifestError::Encode)
    }

    pub fn task(&self, name: &str) -> Option<&Task> {
        self.jobs.get(name)
    }
}

impl Task {
    /// Whether this task runs for the given trigger kind
    pub fn accepts(&self, kind: TriggerKind) -> bool {
        self.trigger.contains(&kind)
    }
}
