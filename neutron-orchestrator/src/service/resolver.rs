//! Webhook Resolver
//!
//! Normalizes an inbound VCS event body into a [`WebhookEvent`] and classifies
//! it into a [`ResolvedTrigger`]. Decoding is best-effort: fields that are
//! missing or of the wrong type default to empty values, so a garbled body
//! surfaces later as a manifest fetch failure rather than a parse error.

use neutron_core::domain::project::SourceKind;
use neutron_core::domain::trigger::{EventKind, ResolvedTrigger, TriggerKind, WebhookEvent};
use serde_json::Value;

/// Event and trigger derived from one delivery
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub event: WebhookEvent,
    pub trigger: ResolvedTrigger,
}

/// Per-kind decoding and classification
struct SourceRules {
    parse: fn(&Value) -> WebhookEvent,
    classify: fn(&WebhookEvent) -> ResolvedTrigger,
}

fn rules(source: SourceKind) -> SourceRules {
    match source {
        SourceKind::GitLab => SourceRules {
            parse: parse_gitlab,
            classify: classify_gitlab,
        },
    }
}

/// Resolve a raw event body delivered by `source`. Never fails.
pub fn resolve(source: SourceKind, body: &[u8]) -> Resolution {
    let value = serde_json::from_slice::<Value>(body).unwrap_or_else(|e| {
        tracing::warn!("Webhook body is not valid JSON, decoding best-effort: {}", e);
        Value::Null
    });

    let rules = rules(source);
    let event = (rules.parse)(&value);
    let trigger = (rules.classify)(&event);

    tracing::debug!(
        kind = ?event.kind,
        project_id = event.project_id,
        trigger = %trigger.kind,
        execution_ref = %trigger.execution_ref,
        report_ref = %trigger.report_ref,
        "Resolved webhook event"
    );

    Resolution { event, trigger }
}

// =============================================================================
// GitLab
// =============================================================================

fn parse_gitlab(value: &Value) -> WebhookEvent {
    let kind = EventKind::from_object_kind(str_at(value, &["object_kind"]).unwrap_or_default());

    let project_id = u64_at(value, &["project", "id"])
        .or_else(|| u64_at(value, &["project_id"]))
        .unwrap_or_default();

    WebhookEvent {
        kind,
        project_id,
        repo_url: str_at(value, &["project", "http_url"])
            .or_else(|| str_at(value, &["repository", "git_http_url"]))
            .unwrap_or_default()
            .to_string(),
        commit_sha: str_at(value, &["checkout_sha"]).unwrap_or_default().to_string(),
        git_ref: str_at(value, &["ref"]).unwrap_or_default().to_string(),
        merge_request_iid: u64_at(value, &["object_attributes", "iid"]),
        last_commit: str_at(value, &["object_attributes", "last_commit", "id"]).map(str::to_string),
    }
}

fn classify_gitlab(event: &WebhookEvent) -> ResolvedTrigger {
    match event.kind {
        EventKind::MergeRequest => ResolvedTrigger {
            kind: TriggerKind::Mr,
            execution_ref: format!(
                "refs/merge-requests/{}/merge",
                event.merge_request_iid.unwrap_or_default()
            ),
            report_ref: event.last_commit.clone().unwrap_or_default(),
        },
        EventKind::TagPush => ResolvedTrigger {
            kind: TriggerKind::Tag,
            execution_ref: event.git_ref.clone(),
            report_ref: event.commit_sha.clone(),
        },
        EventKind::Push | EventKind::Unknown => ResolvedTrigger {
            kind: TriggerKind::Push,
            execution_ref: event.commit_sha.clone(),
            report_ref: event.commit_sha.clone(),
        },
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

fn at<'a>(value: &'a Value, path: &[&str]) -> Option<&'a Value> {
    path.iter().try_fold(value, |v, key| v.get(key))
}

fn str_at<'a>(value: &'a Value, path: &[&str]) -> Option<&'a str> {
    at(value, path).and_then(Value::as_str)
}

/// Numbers, or numeric strings
fn u64_at(value: &Value, path: &[&str]) -> Option<u64> {
    at(value, path).and_then(|v| v.as_u64().or_else(|| v.as_str()?.parse().ok()))
}
