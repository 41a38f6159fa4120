//! Legacy flat routes kept for the original dashboard's polling client.

use axum::routing::get;
use axum::Router;

use super::handlers;
use crate::pipeline::AppState;

/// Flat `/api/*` polling endpoints (deprecated).
pub fn legacy_api_routes(state: AppState) -> Router {
    Router::new()
        .route("/live-data", get(handlers::legacy_live_data))
        .route("/anomaly-status", get(handlers::legacy_anomaly_status))
        .route("/anomaly-count", get(handlers::legacy_anomaly_count))
        .route("/system-health", get(handlers::legacy_system_health))
        .with_state(state)
}

/// Liveness endpoint at `/health`
pub fn health_routes(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health_check))
        .with_state(state)
}
