//! REST API module using Axum
//!
//! HTTP surface of the pump monitor:
//! - v2 API under `/api/v2` with a consistent `{data, meta}` envelope
//! - legacy flat polling endpoints under `/api` (deprecated, with
//!   `Deprecation`/`Sunset` headers)
//! - `/health` liveness

pub mod envelope;
pub mod handlers;
pub mod middleware;
mod routes;
mod v2_routes;

use axum::http::{header, Method};
use axum::middleware as axum_mw;
use axum::Router;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

use crate::pipeline::AppState;

/// Largest accepted request body; a reading is well under 1 KiB.
const MAX_BODY_BYTES: usize = 64 * 1024;

/// Build a CORS layer that is restrictive by default (same-origin only).
///
/// Set `PUMPGUARD_CORS_ORIGINS` to a comma-separated list of allowed origins
/// for a dashboard served from elsewhere (e.g., `http://localhost:5173`).
fn build_cors_layer() -> CorsLayer {
    match std::env::var("PUMPGUARD_CORS_ORIGINS") {
        Ok(origins) => {
            let allowed: Vec<_> = origins
                .split(',')
                .filter_map(|o| o.trim().parse().ok())
                .collect();
            tracing::info!(origins = %origins, "CORS: allowing configured origins");
            CorsLayer::new()
                .allow_origin(allowed)
                .allow_methods([Method::GET, Method::POST])
                .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        }
        Err(_) => CorsLayer::new()
            .allow_methods([Method::GET, Method::POST])
            .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]),
    }
}

/// Create the complete application router.
pub fn create_app(state: AppState) -> Router {
    let cors = build_cors_layer();

    Router::new()
        .nest("/api/v2", v2_routes::v2_api_routes(state.clone()))
        .nest(
            "/api",
            routes::legacy_api_routes(state.clone())
                .layer(axum_mw::from_fn(middleware::add_legacy_deprecation_headers)),
        )
        .merge(routes::health_routes(state))
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(cors)
}
