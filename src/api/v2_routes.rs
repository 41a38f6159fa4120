//! v2 API routes: envelope responses under `/api/v2`.

use axum::routing::{get, post};
use axum::Router;

use super::handlers;
use crate::pipeline::AppState;

pub fn v2_api_routes(state: AppState) -> Router {
    Router::new()
        // Live state
        .route("/live", get(handlers::live_data))
        .route("/anomalies/status", get(handlers::anomaly_status))
        .route("/anomalies/counts", get(handlers::anomaly_counts))
        .route("/risk", get(handlers::risk))
        .route("/system/health", get(handlers::system_health))
        // Ingestion
        .route("/ingest", post(handlers::ingest_reading))
        // History
        .route("/history/readings", get(handlers::history_readings))
        .route("/history/inferences", get(handlers::history_inferences))
        .route("/history/events", get(handlers::history_events))
        // Administration
        .route("/admin/counters/reset", post(handlers::reset_counters))
        .route("/admin/events/:id/resolve", post(handlers::resolve_event))
        .route("/admin/replay", get(handlers::replay_status))
        .route("/admin/replay/start", post(handlers::start_replay))
        .route("/admin/replay/stop", post(handlers::stop_replay))
        .with_state(state)
}
