//! Project registration types

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Source-control kind a project's webhooks come from.
///
/// Only GitLab is implemented; further kinds are added as variants together
/// with a classification table in the resolver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SourceKind {
    GitLab,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::GitLab => "GitLab",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "gitlab" => Ok(SourceKind::GitLab),
            other => Err(format!("unsupported webhook type '{}'", other)),
        }
    }
}

/// Registered project that may deliver webhooks
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    /// Identifier used in `/webhook/{projectRef}`; matches the forge's project id
    pub id: String,
    pub webhook_type: SourceKind,
    /// Clone URL handed to launched jobs
    pub repo_url: String,
}
