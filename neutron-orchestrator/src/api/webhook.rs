//! Webhook API Handler
//!
//! Inbound source-control events.

use axum::{
    Json,
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use neutron_core::dto::webhook::{WebhookAccepted, WebhookPartialFailure};

use crate::api::error::ApiResult;
use crate::service::webhook_service;
use crate::state::AppState;

/// POST /webhook/{project_ref}
/// Resolve an event and launch the matching pipeline tasks
pub async fn receive_webhook(
    State(state): State<AppState>,
    Path(project_ref): Path<String>,
    body: Bytes,
) -> ApiResult<Response> {
    tracing::info!("Webhook delivery for project: {}", project_ref);

    let report = webhook_service::handle(
        &state.pool,
        state.fetcher.as_ref(),
        state.publisher.as_ref(),
        &state.launcher,
        &project_ref,
        &body,
    )
    .await?;

    if report.is_complete() {
        return Ok(Json(WebhookAccepted {
            status: "ok".to_string(),
            pipeline: report.pipeline,
            jobs: report.jobs,
        })
        .into_response());
    }

    let tasks: Vec<&str> = report.failures.iter().map(|f| f.task.as_str()).collect();
    let error = format!("failed to launch tasks: {}", tasks.join(", "));
    Ok((
        StatusCode::BAD_REQUEST,
        Json(WebhookPartialFailure {
            error,
            jobs: report.jobs,
            failures: report.failures,
        }),
    )
        .into_response())
}
