//! Launcher → Runner environment contract
//!
//! The launcher and the runner never share memory; the variables below are the
//! whole protocol between them. The launcher renders a [`RunnerEnv`] into the
//! job's environment with [`RunnerEnv::to_vars`], and the runner validates it
//! once at startup with [`RunnerEnv::from_env`], reporting every missing
//! variable in a single error.

use crate::domain::trigger::{TriggerKind, UnknownTrigger};

pub const GIT_REPO_URL: &str = "GIT_REPO_URL";
/// Path of the mounted private key file inside the job
pub const GIT_PRIVATE_KEY: &str = "GIT_PRIVATE_KEY";
pub const GIT_USERNAME: &str = "GIT_USERNAME";
pub const GIT_PASSWORD: &str = "GIT_PASSWORD";
/// Execution reference
pub const GITLAB_COMMIT_SHA: &str = "GITLAB_COMMIT_SHA";
/// Report reference
pub const GITLAB_REPORT_SHA: &str = "GITLAB_REPORT_SHA";
pub const GITLAB_PROJECT_ID: &str = "GITLAB_PROJECT_ID";
pub const GITLAB_TOKEN: &str = "GITLAB_TOKEN";
pub const TRIGGER: &str = "TRIGGER";
pub const GITLAB_URL: &str = "GITLAB_URL";
pub const JOB_NAME: &str = "JOB_NAME";
pub const PIPELINE_URL: &str = "PIPELINE_URL";
/// Manifest location relative to the workspace. Optional; the runner
/// defaults to `neutron.yaml`.
pub const MANIFEST_PATH: &str = "NEUTRON_MANIFEST_PATH";

/// Label used in [`EnvError::Missing`] when neither credential form is present
pub const GIT_CREDENTIAL: &str = "GIT_PRIVATE_KEY|GIT_USERNAME+GIT_PASSWORD";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum EnvError {
    #[error("missing required environment variables: {}", .0.join(", "))]
    Missing(Vec<&'static str>),

    #[error("invalid TRIGGER value: {0}")]
    InvalidTrigger(String),
}

impl From<UnknownTrigger> for EnvError {
    fn from(err: UnknownTrigger) -> Self {
        EnvError::InvalidTrigger(err.0)
    }
}

/// Repository credential carried by the environment
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GitCredential {
    PrivateKey { path: String },
    BasicAuth { username: String, password: String },
}

/// Validated environment of one launched job
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunnerEnv {
    pub repo_url: String,
    pub credential: GitCredential,
    pub commit_sha: String,
    pub report_sha: String,
    pub project_id: String,
    pub gitlab_token: String,
    pub trigger: TriggerKind,
    pub gitlab_url: String,
    /// Task name within the manifest
    pub job_name: String,
    pub pipeline_url: String,
}

impl RunnerEnv {
    /// Reads the contract from the process environment
    pub fn from_env() -> Result<Self, EnvError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Reads the contract through `lookup`. Empty values count as missing.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, EnvError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut missing = Vec::new();
        let mut required = |name: &'static str| match lookup(name).filter(|v| !v.is_empty()) {
            Some(value) => value,
            None => {
                missing.push(name);
                String::new()
            }
        };

        let repo_url = required(GIT_REPO_URL);
        let commit_sha = required(GITLAB_COMMIT_SHA);
        let report_sha = required(GITLAB_REPORT_SHA);
        let project_id = required(GITLAB_PROJECT_ID);
        let gitlab_token = required(GITLAB_TOKEN);
        let trigger = required(TRIGGER);
        let gitlab_url = required(GITLAB_URL);
        let job_name = required(JOB_NAME);
        let pipeline_url = required(PIPELINE_URL);

        let present = |name: &str| lookup(name).filter(|v| !v.is_empty());
        let credential = match (present(GIT_PRIVATE_KEY), present(GIT_USERNAME), present(GIT_PASSWORD)) {
            (Some(path), _, _) => Some(GitCredential::PrivateKey { path }),
            (None, Some(username), Some(password)) => {
                Some(GitCredential::BasicAuth { username, password })
            }
            (None, Some(_), None) => {
                missing.push(GIT_PASSWORD);
                None
            }
            (None, None, Some(_)) => {
                missing.push(GIT_USERNAME);
                None
            }
            (None, None, None) => {
                missing.push(GIT_CREDENTIAL);
                None
            }
        };

        let credential = match credential {
            Some(credential) if missing.is_empty() => credential,
            _ => return Err(EnvError::Missing(missing)),
        };

        Ok(Self {
            repo_url,
            credential,
            commit_sha,
            report_sha,
            project_id,
            gitlab_token,
            trigger: trigger.parse()?,
            gitlab_url,
            job_name,
            pipeline_url,
        })
    }

    /// Renders the contract as `(name, value)` pairs for a container spec
    pub fn to_vars(&self) -> Vec<(String, String)> {
        let mut vars = vec![(GIT_REPO_URL, self.repo_url.clone())];
        match &self.credential {
            GitCredential::PrivateKey { path } => vars.push((GIT_PRIVATE_KEY, path.clone())),
            GitCredential::BasicAuth { username, password } => {
                vars.push((GIT_USERNAME, username.clone()));
                vars.push((GIT_PASSWORD, password.clone()));
            }
        }
        vars.extend([
            (GITLAB_COMMIT_SHA, self.commit_sha.clone()),
            (GITLAB_REPORT_SHA, self.report_sha.clone()),
            (GITLAB_PROJECT_ID, self.project_id.clone()),
            (GITLAB_TOKEN, self.gitlab_token.clone()),
            (TRIGGER, self.trigger.to_string()),
            (GITLAB_URL, self.gitlab_url.clone()),
            (JOB_NAME, self.job_name.clone()),
            (PIPELINE_URL, self.pipeline_url.clone()),
        ]);
        vars.into_iter().map(|(k, v)| (k.to_string(), v)).collect()
    }
}
