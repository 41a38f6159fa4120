//! Flat endpoints matching the original dashboard's polling contract.
//!
//! No envelope; field names are kept as the dashboard reads them. Served
//! with deprecation headers.

use axum::extract::{Query, State};
use axum::Json;
use serde::Serialize;
use std::collections::BTreeMap;

use super::live::{select_source, SourceQuery};
use super::{channel_map, column_map};
use crate::health::process_memory_mb;
use crate::ml_engine::ModelStatus;
use crate::pipeline::AppState;
use crate::types::SensorState;

#[derive(Debug, Serialize)]
pub struct LegacyLiveData {
    pub timestamp: Option<String>,
    pub record_number: u64,
    pub total_records: u64,
    pub values: Option<BTreeMap<&'static str, f64>>,
    pub status: String,
    pub reconstruction_error: Option<f64>,
    pub threshold: f64,
    pub sensor_states: Option<BTreeMap<&'static str, SensorState>>,
    pub sensor_anomaly_counts: BTreeMap<&'static str, u64>,
}

#[derive(Debug, Serialize)]
pub struct LegacyAnomalyStatus {
    pub system_status: String,
    pub reconstruction_loss: Option<f64>,
    pub threshold: f64,
    pub is_anomaly: bool,
}

#[derive(Debug, Serialize)]
pub struct LegacyAnomalyCount {
    pub total: u64,
    pub last_hour: u64,
    pub per_sensor: BTreeMap<&'static str, u64>,
}

#[derive(Debug, Serialize)]
pub struct LegacySystemHealth {
    pub inference_latency_ms: Option<f64>,
    pub memory_usage_mb: Option<f64>,
    pub data_stream: &'static str,
    pub model_status: ModelStatus,
}

/// GET /api/live-data
pub async fn legacy_live_data(
    State(state): State<AppState>,
    Query(q): Query<SourceQuery>,
) -> Json<LegacyLiveData> {
    let snapshot = state.live.load();
    let source = select_source(&state, &snapshot, q.source.as_deref());
    let (record_number, total_records) = match state.replay.progress().await {
        Some(p) => (p.current, p.total),
        None => (snapshot.counters.total_processed, 0),
    };
    let reading = source.latest_reading.as_ref();
    let result = source.latest_result.as_ref();

    Json(LegacyLiveData {
        timestamp: reading.map(|r| r.timestamp.format("%H:%M:%S").to_string()),
        record_number,
        total_records,
        values: reading.map(|r| column_map(&r.values)),
        status: source.status.to_string(),
        reconstruction_error: result.map(|r| r.reconstruction_error),
        threshold: state.model.threshold,
        sensor_states: result.map(|r| column_map(&r.sensor_states)),
        sensor_anomaly_counts: column_map(&snapshot.counters.per_sensor),
    })
}

/// GET /api/anomaly-status
pub async fn legacy_anomaly_status(State(state): State<AppState>) -> Json<LegacyAnomalyStatus> {
    let snapshot = state.live.load();
    let source = select_source(&state, &snapshot, None);
    let result = source.latest_result.as_ref();
    Json(LegacyAnomalyStatus {
        system_status: source.status.to_string(),
        reconstruction_loss: result.map(|r| r.reconstruction_error),
        threshold: state.model.threshold,
        is_anomaly: result.is_some_and(|r| r.is_anomaly),
    })
}

/// GET /api/anomaly-count
pub async fn legacy_anomaly_count(State(state): State<AppState>) -> Json<LegacyAnomalyCount> {
    let snapshot = state.live.load();
    let counters = &snapshot.counters;
    Json(LegacyAnomalyCount {
        total: counters.total_anomalies,
        last_hour: counters.recent_anomalies,
        per_sensor: channel_map(&counters.per_sensor),
    })
}

/// GET /api/system-health
pub async fn legacy_system_health(State(state): State<AppState>) -> Json<LegacySystemHealth> {
    let snapshot = state.live.load();
    Json(LegacySystemHealth {
        inference_latency_ms: snapshot.last_latency_ms,
        memory_usage_mb: process_memory_mb(),
        data_stream: if state.live.consumer_running() { "ACTIVE" } else { "STOPPED" },
        model_status: state.model.status,
    })
}
