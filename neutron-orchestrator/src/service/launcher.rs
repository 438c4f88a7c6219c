//! Job Launcher
//!
//! Compiles a resolved trigger plus one manifest task into a [`JobLaunchSpec`]
//! and submits it to the cluster. The compiled job is self-describing: the
//! checkout and bootstrap init containers, the execution container and the
//! runner's environment contract are all inside it, so resubmitting the job
//! reproduces the same behavior without this service.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use neutron_core::domain::job::{
    CheckoutCredential, CheckoutStrategy, ContainerSpec, JobAnnotations, JobLaunchSpec, Mount,
    Volume, VolumeSource,
};
use neutron_core::domain::pipeline::Task;
use neutron_core::domain::project::SourceKind;
use neutron_core::domain::trigger::ResolvedTrigger;
use neutron_core::env::{self, GitCredential, RunnerEnv};
use rand::Rng;
use thiserror::Error;

use crate::cluster::types::Job;
use crate::cluster::{ClusterApi, ClusterError, MANAGED_BY_LABEL, MANAGED_BY_VALUE};
use crate::config::Config;

/// Checkout root inside every container
pub const WORKSPACE_DIR: &str = "/repo";
/// Directory the runner binary is downloaded into
pub const PIPELINE_DIR: &str = "/pipeline";
pub const RUNNER_PATH: &str = "/pipeline/runner";
/// Directory the checkout key secret is projected into
pub const KEY_DIR: &str = "/etc/neutron/ssh";
/// Key of the private key inside the secret
pub const KEY_FILE: &str = "id_rsa";
/// Runner build served to GitLab-triggered jobs
pub const RUNNER_PLATFORM: &str = "gitlab";
/// Label carrying the task name
pub const TASK_LABEL: &str = "neutron/task";

const PIPELINE_VOLUME: &str = "pipeline";
const REPO_VOLUME: &str = "repo";
const KEY_VOLUME: &str = "git-key";

/// Longest valid DNS label
const MAX_NAME_LEN: usize = 63;
/// `-YYYYMMDD-HHMMSS-xxxx`
const NAME_SUFFIX_LEN: usize = 21;

#[derive(Debug, Error)]
pub enum LaunchError {
    #[error("cluster rejected job {name}: {source}")]
    Submit {
        name: String,
        #[source]
        source: ClusterError,
    },
}

/// Everything about one delivery that a launched job needs
#[derive(Debug, Clone)]
pub struct LaunchContext {
    pub source: SourceKind,
    pub trigger: ResolvedTrigger,
    pub project_id: String,
    /// Clone URL of the registered project
    pub repo_url: String,
}

pub struct Launcher {
    job_prefix: String,
    init_image: String,
    git_secret: String,
    basic_auth: Option<(String, String)>,
    /// Callback base URL reachable from jobs
    public_url: String,
    gitlab_url: String,
    gitlab_token: String,
    /// Manifest path inside the repository, as fetched by the webhook
    manifest_path: String,
    cluster: Arc<dyn ClusterApi>,
}

impl Launcher {
    pub fn new(config: &Config, cluster: Arc<dyn ClusterApi>) -> Self {
        Self {
            job_prefix: config.launch.job_prefix.clone(),
            init_image: config.launch.init_image.clone(),
            git_secret: config.launch.git_secret.clone(),
            basic_auth: config.launch.basic_auth.clone(),
            public_url: config.public_url.clone(),
            gitlab_url: config.gitlab.url.clone(),
            gitlab_token: config.gitlab.token.clone(),
            manifest_path: config.gitlab.manifest_path.clone(),
            cluster,
        }
    }

    /// Compile and submit one task. Submission failures are returned as-is;
    /// there is no retry here.
    pub async fn launch(
        &self,
        ctx: &LaunchContext,
        task_name: &str,
        task: &Task,
    ) -> Result<JobLaunchSpec, LaunchError> {
        let suffix: u16 = rand::thread_rng().r#gen();
        let name = job_name(&self.job_prefix, task_name, Utc::now(), suffix);
        let spec = self.compile(ctx, task_name, task, name);

        tracing::info!(job = %spec.name, task = task_name, trigger = %ctx.trigger.kind, "Submitting job");

        self.cluster
            .create_job(&Job::from(&spec))
            .await
            .map_err(|source| LaunchError::Submit {
                name: spec.name.clone(),
                source,
            })?;

        Ok(spec)
    }

    /// Status page of a job, used as the commit-status link
    pub fn pipeline_url(&self, job_name: &str) -> String {
        format!("{}/status/{}", self.public_url, job_name)
    }

    pub fn public_url(&self) -> &str {
        &self.public_url
    }

    fn credential(&self) -> CheckoutCredential {
        match &self.basic_auth {
            Some((username, password)) => CheckoutCredential::BasicAuth {
                username: username.clone(),
                password: password.clone(),
            },
            None => CheckoutCredential::PrivateKey {
                secret_name: self.git_secret.clone(),
                key: KEY_FILE.to_string(),
            },
        }
    }

    /// Deterministically build the job for `task_name` under `name`
    pub fn compile(&self, ctx: &LaunchContext, task_name: &str, task: &Task, name: String) -> JobLaunchSpec {
        let credential = self.credential();
        let strategy = CheckoutStrategy::for_trigger(&ctx.trigger);

        let runner_env = RunnerEnv {
            repo_url: ctx.repo_url.clone(),
            credential: match &credential {
                CheckoutCredential::PrivateKey { .. } => GitCredential::PrivateKey {
                    path: format!("{}/{}", KEY_DIR, KEY_FILE),
                },
                CheckoutCredential::BasicAuth { username, password } => GitCredential::BasicAuth {
                    username: username.clone(),
                    password: password.clone(),
                },
            },
            commit_sha: ctx.trigger.execution_ref.clone(),
            report_sha: ctx.trigger.report_ref.clone(),
            project_id: ctx.project_id.clone(),
            gitlab_token: self.gitlab_token.clone(),
            trigger: ctx.trigger.kind,
            gitlab_url: self.gitlab_url.clone(),
            job_name: task_name.to_string(),
            pipeline_url: self.pipeline_url(&name),
        };

        let mut volumes = vec![
            Volume {
                name: PIPELINE_VOLUME.to_string(),
                source: VolumeSource::Ephemeral,
            },
            Volume {
                name: REPO_VOLUME.to_string(),
                source: VolumeSource::Ephemeral,
            },
        ];
        let mut key_mounts = Vec::new();
        let mut checkout_env = Vec::new();

        match &credential {
            CheckoutCredential::PrivateKey { secret_name, key } => {
                volumes.push(Volume {
                    name: KEY_VOLUME.to_string(),
                    source: VolumeSource::Secret {
                        secret_name: secret_name.clone(),
                        items: BTreeMap::from([(key.clone(), KEY_FILE.to_string())]),
                        // ssh refuses keys readable by others
                        mode: Some(0o400),
                    },
                });
                key_mounts.push(Mount {
                    volume: KEY_VOLUME.to_string(),
                    path: KEY_DIR.to_string(),
                    read_only: true,
                });
                checkout_env.push((
                    "GIT_SSH_COMMAND".to_string(),
                    format!(
                        "ssh -i {}/{} -o StrictHostKeyChecking=no -o UserKnownHostsFile=/dev/null",
                        KEY_DIR, KEY_FILE
                    ),
                ));
            }
            CheckoutCredential::BasicAuth { username, password } => {
                checkout_env.extend([
                    ("GIT_USERNAME".to_string(), username.clone()),
                    ("GIT_PASSWORD".to_string(), password.clone()),
                    ("GIT_CONFIG_COUNT".to_string(), "1".to_string()),
                    ("GIT_CONFIG_KEY_0".to_string(), "credential.helper".to_string()),
                    (
                        "GIT_CONFIG_VALUE_0".to_string(),
                        r#"!f() { echo "username=${GIT_USERNAME}"; echo "password=${GIT_PASSWORD}"; }; f"#
                            .to_string(),
                    ),
                ]);
            }
        }

        let repo_mount = Mount {
            volume: REPO_VOLUME.to_string(),
            path: WORKSPACE_DIR.to_string(),
            read_only: false,
        };

        let checkout = ContainerSpec {
            name: "checkout".to_string(),
            image: self.init_image.clone(),
            command: shell(checkout_script(&ctx.repo_url, &strategy)),
            working_dir: None,
            env: checkout_env,
            mounts: std::iter::once(repo_mount.clone())
                .chain(key_mounts.iter().cloned())
                .collect(),
        };

        let bootstrap = ContainerSpec {
            name: "bootstrap".to_string(),
            image: self.init_image.clone(),
            command: shell(bootstrap_script(&self.public_url, RUNNER_PLATFORM)),
            working_dir: None,
            env: Vec::new(),
            mounts: vec![Mount {
                volume: PIPELINE_VOLUME.to_string(),
                path: PIPELINE_DIR.to_string(),
                read_only: false,
            }],
        };

        let mut container_env = runner_env.to_vars();
        container_env.push((env::MANIFEST_PATH.to_string(), self.manifest_path.clone()));

        let container = ContainerSpec {
            name: "pipeline".to_string(),
            image: task.image.clone(),
            command: vec![RUNNER_PATH.to_string()],
            working_dir: Some(WORKSPACE_DIR.to_string()),
            env: container_env,
            mounts: [
                Mount {
                    volume: PIPELINE_VOLUME.to_string(),
                    path: PIPELINE_DIR.to_string(),
                    read_only: true,
                },
                repo_mount,
            ]
            .into_iter()
            .chain(key_mounts)
            .collect(),
        };

        JobLaunchSpec {
            name,
            task_name: task_name.to_string(),
            labels: BTreeMap::from([
                (MANAGED_BY_LABEL.to_string(), MANAGED_BY_VALUE.to_string()),
                (TASK_LABEL.to_string(), label_value(task_name)),
            ]),
            annotations: JobAnnotations {
                source_type: ctx.source.to_string(),
                repo_url: ctx.repo_url.clone(),
                trigger_type: ctx.trigger.kind.to_string(),
                project_url: format!("{}/projects/{}", self.gitlab_url, ctx.project_id),
            },
            init_containers: vec![checkout, bootstrap],
            container,
            volumes,
        }
    }
}

// =============================================================================
// Naming
// =============================================================================

/// `{prefix}-{task}-{YYYYMMDD-HHMMSS}-{4 hex}`, squeezed into a DNS label.
/// The task part is shortened first so the time and random suffix survive.
pub fn job_name(prefix: &str, task: &str, now: DateTime<Utc>, suffix: u16) -> String {
    let mut head = dns_label(&format!("{}-{}", prefix, task));
    head.truncate(MAX_NAME_LEN - NAME_SUFFIX_LEN);
    let head = head.trim_end_matches('-');
    let head = if head.is_empty() { "job" } else { head };

    format!("{}-{}-{:04x}", head, now.format("%Y%m%d-%H%M%S"), suffix)
}

/// Lowercase, `[a-z0-9-]` only, no leading/trailing or repeated dashes
fn dns_label(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        let c = c.to_ascii_lowercase();
        if c.is_ascii_lowercase() || c.is_ascii_digit() {
            out.push(c);
        } else if !out.is_empty() && !out.ends_with('-') {
            out.push('-');
        }
    }
    out.trim_end_matches('-').to_string()
}

fn label_value(raw: &str) -> String {
    let mut value = dns_label(raw);
    value.truncate(MAX_NAME_LEN);
    value.trim_end_matches('-').to_string()
}

// =============================================================================
// Init scripts
// =============================================================================

fn shell(script: String) -> Vec<String> {
    vec!["/bin/sh".to_string(), "-c".to_string(), script]
}

fn checkout_script(repo_url: &str, strategy: &CheckoutStrategy) -> String {
    let mut script = format!(
        "git clone {} {ws} && cd {ws}",
        shell_words::quote(repo_url),
        ws = WORKSPACE_DIR
    );
    match strategy {
        CheckoutStrategy::FetchRef {
            refspec,
            tracking_ref,
            branch,
        } => script.push_str(&format!(
            " && git fetch origin {} && git checkout --force -B {} {}",
            shell_words::quote(refspec),
            shell_words::quote(branch),
            shell_words::quote(tracking_ref)
        )),
        CheckoutStrategy::Commit { sha } => {
            script.push_str(&format!(" && git checkout --force {}", shell_words::quote(sha)))
        }
    }
    script
}

fn bootstrap_script(public_url: &str, platform: &str) -> String {
    format!(
        "wget -q -O {path} {}/runner-bin/{} && chmod a+x {path}",
        public_url,
        platform,
        path = RUNNER_PATH
    )
}
