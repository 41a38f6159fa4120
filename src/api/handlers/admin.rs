//! Administrative handlers. Consumer-owned state is changed only through
//! the control channel.

use axum::extract::{Path, State};
use axum::response::Response;
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::api::envelope::{ApiErrorResponse, ApiResponse};
use crate::pipeline::{AppState, ControlError, ReplayError, ReplayProgress};
use crate::types::RecordId;

fn control_error(e: ControlError) -> Response {
    match e {
        ControlError::NotFound(_) => ApiErrorResponse::not_found(e.to_string()),
        ControlError::Storage(_) => ApiErrorResponse::internal(e.to_string()),
        ControlError::Unavailable => ApiErrorResponse::service_unavailable(e.to_string()),
    }
}

/// POST /api/v2/admin/counters/reset
pub async fn reset_counters(State(state): State<AppState>) -> Response {
    match state.control.reset_counters().await {
        Ok(counters) => {
            info!("Anomaly counters reset via API");
            ApiResponse::ok(counters)
        }
        Err(e) => control_error(e),
    }
}

/// POST /api/v2/admin/events/:id/resolve
pub async fn resolve_event(State(state): State<AppState>, Path(id): Path<RecordId>) -> Response {
    match state.control.resolve_event(id).await {
        Ok(event) => ApiResponse::ok(event),
        Err(e) => control_error(e),
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ReplayStartRequest {
    pub path: Option<String>,
    pub interval_ms: Option<u64>,
}

#[derive(Debug, Serialize)]
pub struct ReplayStopped {
    pub stopped: bool,
    pub progress: Option<ReplayProgress>,
}

/// POST /api/v2/admin/replay/start
///
/// Body is optional; without one the configured replay file is used.
pub async fn start_replay(
    State(state): State<AppState>,
    body: Option<Json<ReplayStartRequest>>,
) -> Response {
    let req = body.map(|Json(b)| b).unwrap_or_default();
    let path = req.path.as_deref().map(std::path::Path::new);
    match state.replay.start(path, req.interval_ms).await {
        Ok(progress) => ApiResponse::ok(progress),
        Err(e @ ReplayError::AlreadyRunning) => ApiErrorResponse::conflict(e.to_string()),
        Err(e) => ApiErrorResponse::bad_request(e.to_string()),
    }
}

/// POST /api/v2/admin/replay/stop
pub async fn stop_replay(State(state): State<AppState>) -> Response {
    match state.replay.stop().await {
        Some(progress) => ApiResponse::ok(ReplayStopped {
            stopped: true,
            progress: Some(progress),
        }),
        None => ApiResponse::ok(ReplayStopped {
            stopped: false,
            progress: state.replay.progress().await,
        }),
    }
}

/// GET /api/v2/admin/replay
pub async fn replay_status(State(state): State<AppState>) -> Response {
    ApiResponse::ok(state.replay.progress().await)
}
