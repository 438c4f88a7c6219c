//! Trigger domain types
//!
//! A VCS event is normalized into a [`WebhookEvent`] and then classified into a
//! [`ResolvedTrigger`], which carries everything the launcher and runner need
//! to decide what to check out and where to attach status.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Classification of a VCS event, governing which tasks run and how code is
/// checked out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TriggerKind {
    #[serde(rename = "PUSH", alias = "push")]
    Push,
    #[serde(rename = "TAG", alias = "tag")]
    Tag,
    #[serde(rename = "MR", alias = "mr")]
    Mr,
}

impl TriggerKind {
    /// Wire representation used in manifests, annotations and the job environment
    pub fn as_str(&self) -> &'static str {
        match self {
            TriggerKind::Push => "PUSH",
            TriggerKind::Tag => "TAG",
            TriggerKind::Mr => "MR",
        }
    }
}

impl fmt::Display for TriggerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a string is not one of `PUSH`, `TAG` or `MR`
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown trigger kind '{0}'")]
pub struct UnknownTrigger(pub String);

impl FromStr for TriggerKind {
    type Err = UnknownTrigger;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PUSH" | "push" => Ok(TriggerKind::Push),
            "TAG" | "tag" => Ok(TriggerKind::Tag),
            "MR" | "mr" => Ok(TriggerKind::Mr),
            other => Err(UnknownTrigger(other.to_string())),
        }
    }
}

/// Kind of inbound VCS event, as announced by the event body
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Push,
    TagPush,
    MergeRequest,
    Unknown,
}

impl EventKind {
    /// Maps an `object_kind` value onto an event kind. Anything unrecognized
    /// (including an empty string) is `Unknown`.
    pub fn from_object_kind(kind: &str) -> Self {
        match kind {
            "push" => EventKind::Push,
            "tag_push" => EventKind::TagPush,
            "merge_request" => EventKind::MergeRequest,
            _ => EventKind::Unknown,
        }
    }
}

/// Normalized inbound event. Constructed once per request and never mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebhookEvent {
    pub kind: EventKind,
    pub project_id: u64,
    /// HTTP clone URL announced by the event (may be empty)
    pub repo_url: String,
    /// Commit the event points at (`checkout_sha`)
    pub commit_sha: String,
    /// Ref the event points at (`ref`), e.g. `refs/tags/v1.0.0`
    pub git_ref: String,
    pub merge_request_iid: Option<u64>,
    pub last_commit: Option<String>,
}

/// Trigger derived deterministically from a [`WebhookEvent`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedTrigger {
    pub kind: TriggerKind,
    /// What the runner checks out. A virtual merge ref for merge requests.
    pub execution_ref: String,
    /// Concrete commit that status updates are attached to
    pub report_ref: String,
}

impl ResolvedTrigger {
    /// Ref at which the pipeline manifest must be read.
    ///
    /// The manifest file API cannot dereference a merge-request merge ref, and
    /// the manifest may have been edited on the source branch, so merge requests
    /// read it at the last source-branch commit.
    pub fn manifest_ref(&self) -> &str {
        match self.kind {
            TriggerKind::Mr => &self.report_ref,
            TriggerKind::Push | TriggerKind::Tag => &self.execution_ref,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trigger_kind_parse_and_display() {
        assert_eq!("MR".parse::<TriggerKind>().unwrap(), TriggerKind::Mr);
        assert_eq!("tag".parse::<TriggerKind>().unwrap(), TriggerKind::Tag);
        assert_eq!(TriggerKind::Push.to_string(), "PUSH");
        assert!("DEPLOY".parse::<TriggerKind>().is_err());
    }

    #[test]
    fn test_event_kind_unknown_fallback() {
        assert_eq!(EventKind::from_object_kind("tag_push"), EventKind::TagPush);
        assert_eq!(EventKind::from_object_kind("pipeline"), EventKind::Unknown);
        assert_eq!(EventKind::from_object_kind(""), EventKind::Unknown);
    }

    #[test]
    fn test_manifest_ref_uses_report_ref_for_merge_requests() {
        let mr = ResolvedTrigger {
            kind: TriggerKind::Mr,
            execution_ref: "refs/merge-requests/42/merge".to_string(),
            report_ref: "deadbeef".to_string(),
        };
        assert_eq!(mr.manifest_ref(), "deadbeef");

        let tag = ResolvedTrigger {
            kind: TriggerKind::Tag,
            execution_ref: "refs/tags/v1".to_string(),
            report_ref: "abc123".to_string(),
        };
        assert_eq!(tag.manifest_ref(), "refs/tags/v1");
    }
}
