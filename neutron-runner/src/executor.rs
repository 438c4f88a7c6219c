//! Step subprocess execution

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

#[async_trait]
pub trait CommandExecutor: Send + Sync {
    /// Run `program` with `args` to completion and return its exit code.
    /// Errors mean the process could not be started at all.
    async fn execute(&self, program: &str, args: &[String]) -> Result<i32>;
}

/// Runs steps as child processes of the runner, in the workspace, with the
/// runner's own stdout/stderr so output lands in the pod log as it happens.
pub struct ProcessExecutor {
    workspace: PathBuf,
}

impl ProcessExecutor {
    pub fn new(workspace: impl Into<PathBuf>) -> Self {
        Self {
            workspace: workspace.into(),
        }
    }
}

#[async_trait]
impl CommandExecutor for ProcessExecutor {
    async fn execute(&self, program: &str, args: &[String]) -> Result<i32> {
        debug!("Executing {} {:?} in {}", program, args, self.workspace.display());

        let status = Command::new(program)
            .args(args)
            .current_dir(&self.workspace)
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .status()
            .await
            .with_context(|| format!("Failed to start '{}'", program))?;

        // Killed by a signal counts as failure
        Ok(status.code().unwrap_or(1))
    }
}
