//! Log API Handlers
//!
//! Persisted logs over plain HTTP, live logs over a WebSocket.

use axum::{
    extract::{
        Path, State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::IntoResponse,
};
use futures::{SinkExt, StreamExt};

use crate::api::error::{ApiError, ApiResult};
use crate::cluster::ClusterApi;
use crate::service::log::{self, Utf8Chunker};
use crate::state::AppState;
use std::sync::Arc;

/// GET /log/{pod_name}
/// Get the harvested log of a pod
pub async fn get_pod_log(
    State(state): State<AppState>,
    Path(pod_name): Path<String>,
) -> ApiResult<String> {
    log::get_persisted_log(&state.pool, &pod_name)
        .await?
        .ok_or_else(|| {
            ApiError::NotFound(format!(
                "No harvested log for pod {}; follow it live at /ws/logs/{}",
                pod_name, pod_name
            ))
        })
}

/// GET /ws/logs/{pod_name}
/// Upgrade and relay the pod's log as it is written
pub async fn tail_pod_log(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Path(pod_name): Path<String>,
) -> impl IntoResponse {
    let cluster = state.cluster.clone();
    ws.on_upgrade(move |socket| relay_log(socket, cluster, pod_name))
}

async fn relay_log(socket: WebSocket, cluster: Arc<dyn ClusterApi>, pod_name: String) {
    tracing::info!(pod = %pod_name, "Log tail connected");

    let (mut sink, mut inbound) = socket.split();

    let mut logs = match log::tail(cluster.as_ref(), &pod_name).await {
        Ok(stream) => stream,
        Err(e) => {
            tracing::warn!(pod = %pod_name, "Cannot tail pod log: {}", e);
            let _ = sink.send(Message::Text(format!("error: {}", e).into())).await;
            let _ = sink.send(Message::Close(None)).await;
            return;
        }
    };

    let mut chunker = Utf8Chunker::new();

    loop {
        tokio::select! {
            chunk = logs.next() => match chunk {
                Some(Ok(bytes)) => {
                    let text = chunker.push(&bytes);
                    if text.is_empty() {
                        continue;
                    }
                    if sink.send(Message::Text(text.into())).await.is_err() {
                        tracing::debug!(pod = %pod_name, "Log tail client went away");
                        break;
                    }
                }
                Some(Err(e)) => {
                    tracing::warn!(pod = %pod_name, "Log stream failed: {}", e);
                    break;
                }
                None => {
                    let rest = chunker.finish();
                    if !rest.is_empty() {
                        let _ = sink.send(Message::Text(rest.into())).await;
                    }
                    let _ = sink.send(Message::Close(None)).await;
                    break;
                }
            },
            message = inbound.next() => match message {
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    tracing::debug!(pod = %pod_name, error = %e, "Log tail receive error");
                    break;
                }
            },
        }
    }

    tracing::info!(pod = %pod_name, "Log tail disconnected");
}
