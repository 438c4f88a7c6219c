//! Runner configuration
//!
//! Command-line arguments, all of which can also come from the environment.
//! The job contract itself is read separately into a [`RunnerEnv`].
//!
//! [`RunnerEnv`]: neutron_core::env::RunnerEnv

use clap::Parser;
use neutron_core::domain::pipeline::DEFAULT_MANIFEST_PATH;
use std::path::PathBuf;

#[derive(Debug, Clone, Parser)]
#[command(name = "neutron-runner")]
#[command(about = "Runs the steps of one pipeline task inside its job", long_about = None)]
pub struct Args {
    /// Checkout root; steps run with this as working directory
    #[arg(long, env = "NEUTRON_WORKSPACE", default_value = "/repo")]
    pub workspace: PathBuf,

    /// Manifest path, relative to the workspace unless absolute
    #[arg(long, env = "NEUTRON_MANIFEST_PATH", default_value = DEFAULT_MANIFEST_PATH)]
    pub manifest: PathBuf,
}

impl Args {
    pub fn manifest_path(&self) -> PathBuf {
        self.workspace.join(&self.manifest)
    }
}
