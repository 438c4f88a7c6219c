//! Job launch domain types
//!
//! A [`JobLaunchSpec`] is the compiled, self-describing artifact handed to the
//! cluster: init containers run sequentially before the execution container,
//! and everything the runner needs travels in its environment.

use crate::domain::trigger::{ResolvedTrigger, TriggerKind};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Annotation key for the source-control kind
pub const ANNOTATION_SOURCE_TYPE: &str = "sourceType";
/// Annotation key for the project URL
pub const ANNOTATION_SOURCE_LINK: &str = "sourceLink";
/// Annotation key for the trigger kind
pub const ANNOTATION_TRIGGER_TYPE: &str = "triggerType";
/// Annotation key for the repository clone URL
pub const ANNOTATION_GIT_PATH: &str = "gitPath";

/// Metadata recorded on the job by the launcher and read back by the harvester
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobAnnotations {
    pub source_type: String,
    pub repo_url: String,
    pub trigger_type: String,
    pub project_url: String,
}

impl JobAnnotations {
    pub fn to_map(&self) -> BTreeMap<String, String> {
        BTreeMap::from([
            (ANNOTATION_SOURCE_TYPE.to_string(), self.source_type.clone()),
            (ANNOTATION_SOURCE_LINK.to_string(), self.project_url.clone()),
            (ANNOTATION_TRIGGER_TYPE.to_string(), self.trigger_type.clone()),
            (ANNOTATION_GIT_PATH.to_string(), self.repo_url.clone()),
        ])
    }

    /// Reads annotations back from a job. Missing keys become empty strings.
    pub fn from_map(map: &BTreeMap<String, String>) -> Self {
        let get = |key: &str| map.get(key).cloned().unwrap_or_default();
        Self {
            source_type: get(ANNOTATION_SOURCE_TYPE),
            repo_url: get(ANNOTATION_GIT_PATH),
            trigger_type: get(ANNOTATION_TRIGGER_TYPE),
            project_url: get(ANNOTATION_SOURCE_LINK),
        }
    }
}

/// How the runner's workspace is populated for a trigger
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckoutStrategy {
    /// Fetch a ref-spec into a tracking ref, then check it out as `branch`
    FetchRef {
        refspec: String,
        tracking_ref: String,
        branch: String,
    },
    /// Clone and hard-checkout a commit directly
    Commit { sha: String },
}

/// Local ref that merge-request merge refs are fetched into
pub const MERGE_TRACKING_REF: &str = "refs/remotes/origin/mr-merge";
/// Local branch created from [`MERGE_TRACKING_REF`]
pub const MERGE_BRANCH: &str = "mr-merge";

impl CheckoutStrategy {
    pub fn for_trigger(trigger: &ResolvedTrigger) -> Self {
        match trigger.kind {
            TriggerKind::Mr => CheckoutStrategy::FetchRef {
                refspec: format!("+{}:{}", trigger.execution_ref, MERGE_TRACKING_REF),
                tracking_ref: MERGE_TRACKING_REF.to_string(),
                branch: MERGE_BRANCH.to_string(),
            },
            TriggerKind::Push | TriggerKind::Tag => CheckoutStrategy::Commit {
                sha: trigger.execution_ref.clone(),
            },
        }
    }
}

/// Credential used to clone the repository
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckoutCredential {
    /// Private key read from a cluster secret, mounted read-only
    PrivateKey { secret_name: String, key: String },
    /// Username/password pair carried in the job environment only
    BasicAuth { username: String, password: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VolumeSource {
    /// Ephemeral scratch space scoped to the pod
    Ephemeral,
    /// Secret projected as files; `items` maps secret key to file path
    Secret {
        secret_name: String,
        items: BTreeMap<String, String>,
        mode: Option<i32>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Volume {
    pub name: String,
    pub source: VolumeSource,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mount {
    pub volume: String,
    pub path: String,
    pub read_only: bool,
}

/// One container of the launched job
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerSpec {
    pub name: String,
    pub image: String,
    pub command: Vec<String>,
    pub working_dir: Option<String>,
    pub env: Vec<(String, String)>,
    pub mounts: Vec<Mount>,
}

/// Compiled cluster job. Write-once: never mutated after submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobLaunchSpec {
    /// Unique, time-suffixed DNS label
    pub name: String,
    pub task_name: String,
    pub labels: BTreeMap<String, String>,
    pub annotations: JobAnnotations,
    /// Run in order; each must succeed before the next starts
    pub init_containers: Vec<ContainerSpec>,
    pub container: ContainerSpec,
    pub volumes: Vec<Volume>,
}

impl JobLaunchSpec {
    /// Init container that populates the workspace
    pub fn checkout(&self) -> Option<&ContainerSpec> {
        self.init_containers.first()
    }

    /// Init container that downloads the runner binary
    pub fn bootstrap(&self) -> Option<&ContainerSpec> {
        self.init_containers.get(1)
    }

    /// Value of a variable in the execution container's environment
    pub fn env_var(&self, name: &str) -> Option<&str> {
        self.container
            .env
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}
