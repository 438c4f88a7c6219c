//! Neutron Runner
//!
//! The executable started as the main container of every launched job.
//!
//! Architecture:
//! - Configuration: the job's environment contract plus a few arguments
//! - Engine: sequential step execution with cascading failure
//! - Reporter: per-step commit statuses on the source-control side
//!
//! The checkout is populated by an init container before this starts. The
//! exit code is the job's result as seen by the cluster.

mod config;
mod engine;
mod executor;
mod reporter;

use anyhow::{Context, Result};
use clap::Parser;
use neutron_client::GitLabClient;
use neutron_core::domain::pipeline::PipelineManifest;
use neutron_core::env::RunnerEnv;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Args;
use crate::engine::{Engine, Outcome};
use crate::executor::ProcessExecutor;
use crate::reporter::GitLabReporter;

#[tokio::main]
async fn main() -> ExitCode {
    // Initialize logging; stdout belongs to the steps
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "neutron_runner=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match run().await {
        Ok(outcome) => ExitCode::from(outcome.exit_code() as u8),
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<Outcome> {
    let args = Args::parse();
    let env = RunnerEnv::from_env().context("Invalid job environment")?;

    info!(
        "Starting Neutron Runner: task={}, trigger={}, project={}",
        env.job_name, env.trigger, env.project_id
    );

    let manifest_path = args.manifest_path();
    let manifest = PipelineManifest::from_path(&manifest_path)
        .with_context(|| format!("Failed to load {}", manifest_path.display()))?;

    let client = Arc::new(GitLabClient::new(&env.gitlab_url, &env.gitlab_token));
    let reporter = GitLabReporter::new(client, &env);
    let executor = ProcessExecutor::new(&args.workspace);

    let outcome = Engine::new(&reporter, &executor)
        .run(&manifest, &env.job_name, env.trigger)
        .await?;

    match &outcome {
        Outcome::Skipped => info!("Task skipped for trigger {}", env.trigger),
        Outcome::Succeeded => info!("All steps finished"),
        Outcome::Failed { step } => error!("Step {} failed", step),
    }

    Ok(outcome)
}
