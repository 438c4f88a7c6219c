//! Status API Handler

use axum::{
    Json,
    extract::{Path, State},
};
use neutron_core::dto::status::JobStatusView;

use crate::api::error::ApiResult;
use crate::service::status_service;
use crate::state::AppState;

/// GET /status/{job_name}
/// Get job outcome and pod summary, live from the cluster if not harvested yet
pub async fn get_job_status(
    State(state): State<AppState>,
    Path(job_name): Path<String>,
) -> ApiResult<Json<JobStatusView>> {
    tracing::debug!("Getting status of job: {}", job_name);

    let view = status_service::get_status(&state.pool, state.cluster.as_ref(), &job_name).await?;

    Ok(Json(view))
}
