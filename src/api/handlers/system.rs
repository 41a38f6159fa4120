//! System health handlers.

use axum::extract::State;
use axum::response::Response;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::api::envelope::ApiResponse;
use crate::health::process_memory_mb;
use crate::pipeline::{AppState, ModelInfo};
use crate::storage::SinkStats;
use crate::types::SystemStatus;

#[derive(Debug, Serialize)]
pub struct PersistenceHealth {
    pub backend: &'static str,
    pub degraded: bool,
    pub stats: Option<SinkStats>,
}

#[derive(Debug, Serialize)]
pub struct QueueHealth {
    pub depth: usize,
    pub capacity: usize,
    pub accepted: u64,
    pub rejected: u64,
}

/// Component-level health for `/api/v2/system/health`.
#[derive(Debug, Serialize)]
pub struct SystemHealthV2 {
    /// `ok` or `degraded`
    pub status: &'static str,
    pub pump: String,
    pub system_status: SystemStatus,
    pub uptime_secs: i64,
    pub inference_latency_ms: Option<f64>,
    pub memory_mb: Option<f64>,
    pub model: ModelInfo,
    pub persistence: PersistenceHealth,
    pub queue: QueueHealth,
    pub consumer_running: bool,
    pub timestamp: DateTime<Utc>,
}

/// GET /api/v2/system/health
pub async fn system_health(State(state): State<AppState>) -> Response {
    let snapshot = state.live.load();
    let degraded = state.sink.is_degraded();
    let consumer_running = state.live.consumer_running();
    let stats = state.queue.stats();

    ApiResponse::ok(SystemHealthV2 {
        status: if degraded || !consumer_running { "degraded" } else { "ok" },
        pump: state.config.pump.name.clone(),
        system_status: snapshot.overall_status(),
        uptime_secs: state.uptime_secs(),
        inference_latency_ms: snapshot.last_latency_ms,
        memory_mb: process_memory_mb(),
        model: state.model.clone(),
        persistence: PersistenceHealth {
            backend: state.sink.backend_name(),
            degraded,
            stats: state.sink.stats().ok(),
        },
        queue: QueueHealth {
            depth: state.queue.depth(),
            capacity: state.queue.capacity(),
            accepted: stats.accepted(),
            rejected: stats.rejected(),
        },
        consumer_running,
        timestamp: Utc::now(),
    })
}

#[derive(Debug, Serialize)]
pub struct HealthCheck {
    pub status: &'static str,
    pub version: &'static str,
    pub uptime_seconds: i64,
}

/// GET /health
pub async fn health_check(State(state): State<AppState>) -> Json<HealthCheck> {
    Json(HealthCheck {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        uptime_seconds: state.uptime_secs(),
    })
}
