//! Live state handlers. All reads come from the published snapshot.

use axum::extract::{Query, State};
use axum::response::Response;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::channel_map;
use crate::api::envelope::ApiResponse;
use crate::health::assess_risk;
use crate::pipeline::{AppState, LiveSnapshot, ReplayProgress, SourceSnapshot};
use crate::types::{AnomalyCounters, MaintenanceEvent, SensorState, SystemStatus};

#[derive(Debug, Default, Deserialize)]
pub struct SourceQuery {
    pub source: Option<String>,
}

/// Consolidated live view for one pump source.
#[derive(Debug, Serialize)]
pub struct LiveV2 {
    pub source: String,
    pub status: SystemStatus,
    pub timestamp: Option<DateTime<Utc>>,
    pub values: Option<BTreeMap<&'static str, f64>>,
    pub machine_status: Option<String>,
    pub reconstruction_error: Option<f64>,
    pub threshold: f64,
    pub is_anomaly: bool,
    pub sensor_states: Option<BTreeMap<&'static str, SensorState>>,
    pub channel_deltas: Option<BTreeMap<&'static str, f64>>,
    pub anomaly_counts: BTreeMap<&'static str, u64>,
    pub counters: AnomalyCounters,
    pub latency_ms: Option<f64>,
    pub buffered: usize,
    pub window_size: usize,
    pub open_events: Vec<MaintenanceEvent>,
    pub replay: Option<ReplayProgress>,
    pub consumer_running: bool,
    pub sources: Vec<String>,
}

/// Anomaly decision for the latest window.
#[derive(Debug, Serialize)]
pub struct AnomalyStatusV2 {
    pub source: String,
    pub status: SystemStatus,
    pub timestamp: Option<DateTime<Utc>>,
    pub reconstruction_error: Option<f64>,
    pub threshold: f64,
    pub is_anomaly: bool,
    pub sensor_states: Option<BTreeMap<&'static str, SensorState>>,
}

/// Snapshot for the requested source, or an idle placeholder when that
/// source has not produced anything yet.
pub(crate) fn select_source(
    state: &AppState,
    snapshot: &LiveSnapshot,
    requested: Option<&str>,
) -> SourceSnapshot {
    let fallback = requested.unwrap_or(&state.config.pump.default_source);
    match snapshot.source(requested) {
        Some(s) => s.clone(),
        None => SourceSnapshot::idle(fallback, state.model.window_size, snapshot.published_at),
    }
}

/// GET /api/v2/live
pub async fn live_data(State(state): State<AppState>, Query(q): Query<SourceQuery>) -> Response {
    let snapshot = state.live.load();
    let source = select_source(&state, &snapshot, q.source.as_deref());
    let replay = state.replay.progress().await;
    let result = source.latest_result.as_ref();
    let reading = source.latest_reading.as_ref();

    ApiResponse::ok(LiveV2 {
        status: source.status,
        timestamp: reading.map(|r| r.timestamp),
        values: reading.map(|r| channel_map(&r.values)),
        machine_status: reading.and_then(|r| r.machine_status.clone()),
        reconstruction_error: result.map(|r| r.reconstruction_error),
        threshold: state.model.threshold,
        is_anomaly: result.is_some_and(|r| r.is_anomaly),
        sensor_states: result.map(|r| channel_map(&r.sensor_states)),
        channel_deltas: result.map(|r| channel_map(&r.channel_deltas)),
        anomaly_counts: channel_map(&snapshot.counters.per_sensor),
        counters: snapshot.counters.clone(),
        latency_ms: result.map(|r| r.latency_ms),
        buffered: source.buffered,
        window_size: source.window_size,
        open_events: source.open_events.clone(),
        replay,
        consumer_running: state.live.consumer_running(),
        sources: snapshot.sources.keys().cloned().collect(),
        source: source.source,
    })
}

/// GET /api/v2/anomalies/status
pub async fn anomaly_status(State(state): State<AppState>, Query(q): Query<SourceQuery>) -> Response {
    let snapshot = state.live.load();
    let source = select_source(&state, &snapshot, q.source.as_deref());
    let result = source.latest_result.as_ref();

    ApiResponse::ok(AnomalyStatusV2 {
        status: source.status,
        timestamp: result.map(|r| r.timestamp),
        reconstruction_error: result.map(|r| r.reconstruction_error),
        threshold: state.model.threshold,
        is_anomaly: result.is_some_and(|r| r.is_anomaly),
        sensor_states: result.map(|r| channel_map(&r.sensor_states)),
        source: source.source,
    })
}

/// GET /api/v2/anomalies/counts
pub async fn anomaly_counts(State(state): State<AppState>) -> Response {
    let snapshot = state.live.load();
    ApiResponse::ok(snapshot.counters.clone())
}

/// GET /api/v2/risk
pub async fn risk(State(state): State<AppState>) -> Response {
    let snapshot = state.live.load();
    ApiResponse::ok(assess_risk(&snapshot.counters, &state.config.health))
}
