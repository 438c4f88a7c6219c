//! Runner Binary API Handler
//!
//! Serves the in-job runner executable downloaded by the bootstrap init
//! container.

use axum::{
    body::Body,
    extract::{Path, State},
    http::header,
    response::{IntoResponse, Response},
};
use tokio_util::io::ReaderStream;

use crate::api::error::{ApiError, ApiResult};
use crate::state::AppState;

/// GET /runner-bin/{platform}
/// Stream `neutron-{platform}-runner` from the binary directory
pub async fn download_runner(
    State(state): State<AppState>,
    Path(platform): Path<String>,
) -> ApiResult<Response> {
    if !is_valid_platform(&platform) {
        return Err(ApiError::BadRequest(format!("Invalid platform: {}", platform)));
    }

    let path = state
        .config
        .runner_bin_dir
        .join(format!("neutron-{}-runner", platform));

    let file = tokio::fs::File::open(&path).await.map_err(|e| {
        tracing::warn!("Runner binary {} unavailable: {}", path.display(), e);
        ApiError::NotFound(format!("No runner for platform {}", platform))
    })?;

    tracing::debug!("Serving runner binary: {}", path.display());

    Ok((
        [
            (header::CONTENT_TYPE, "application/octet-stream"),
            (header::CONTENT_DISPOSITION, "attachment; filename=\"runner\""),
        ],
        Body::from_stream(ReaderStream::new(file)),
    )
        .into_response())
}

/// Platform names map to file names, so no separators or dots
fn is_valid_platform(platform: &str) -> bool {
    !platform.is_empty()
        && platform
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_')
}
