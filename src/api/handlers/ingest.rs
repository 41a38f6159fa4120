//! Reading ingestion. Validation happens here; only well-formed readings
//! reach the queue.

use axum::body::Bytes;
use axum::extract::State;
use axum::response::Response;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, warn};

use crate::acquisition::parse_payload;
use crate::api::envelope::{ApiErrorResponse, ApiResponse};
use crate::pipeline::{AppState, QueueError};

#[derive(Debug, Serialize)]
pub struct IngestAccepted {
    pub source: String,
    pub timestamp: DateTime<Utc>,
    pub queue_depth: usize,
    pub queue_capacity: usize,
}

/// POST /api/v2/ingest
///
/// - 202 when queued
/// - 400 when the payload is malformed
/// - 503 `SERVICE_BUSY` when the queue is full (the reading is dropped)
pub async fn ingest_reading(State(state): State<AppState>, body: Bytes) -> Response {
    let reading = match parse_payload(&body, &state.config.pump.default_source, Utc::now()) {
        Ok(r) => r,
        Err(e) => {
            debug!(error = %e, "Rejected malformed reading");
            return ApiErrorResponse::bad_request(e.to_string());
        }
    };

    let source = reading.source.clone();
    let timestamp = reading.timestamp;
    match state.queue.submit(reading) {
        Ok(()) => ApiResponse::accepted(IngestAccepted {
            source,
            timestamp,
            queue_depth: state.queue.depth(),
            queue_capacity: state.queue.capacity(),
        }),
        Err(QueueError::Full) => {
            warn!(source = %source, "Ingestion queue full, reading rejected");
            ApiErrorResponse::service_busy(format!(
                "ingestion queue is full ({} pending), retry later",
                state.queue.capacity()
            ))
        }
        Err(QueueError::Closed) => {
            ApiErrorResponse::service_unavailable("stream processor is shutting down")
        }
    }
}
