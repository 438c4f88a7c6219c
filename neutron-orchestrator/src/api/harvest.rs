//! Harvest API Handler

use axum::{Json, extract::State};
use neutron_core::dto::harvest::HarvestSummary;

use crate::api::error::ApiResult;
use crate::state::AppState;

/// GET /loot
/// Run one harvest pass; meant to be called by an external scheduler
pub async fn run_harvest(State(state): State<AppState>) -> ApiResult<Json<HarvestSummary>> {
    tracing::info!("Harvest pass requested");

    let summary = state.harvester.harvest_once().await?;

    Ok(Json(summary))
}
