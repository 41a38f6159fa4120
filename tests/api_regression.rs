//! API Regression Tests
//!
//! In-process tests that build the Axum app via `create_app()` and exercise
//! the v2, legacy and health endpoints using `tower::ServiceExt::oneshot()`.
//! No binary spawn, no network port.

use pumpguard::api::create_app;
use pumpguard::config::PumpConfig;
use pumpguard::pipeline::{build_pipeline, AppState, PipelineStats, ProcessingLoop};
use pumpguard::storage::InMemorySink;
use pumpguard::types::{SystemStatus, NUM_CHANNELS};
use pumpguard::load_model;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;

struct TestService {
    state: AppState,
    cancel: CancellationToken,
    consumer: Option<JoinHandle<PipelineStats>>,
    /// Held unstarted so the queue stays open without a consumer
    _idle: Option<ProcessingLoop>,
}

impl TestService {
    fn app(&self) -> Router {
        create_app(self.state.clone())
    }
}

impl Drop for TestService {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

fn test_config(queue_capacity: usize) -> PumpConfig {
    let mut config = PumpConfig::default();
    config.model.artifact_path = String::new();
    config.storage.enabled = false;
    config.pipeline.queue_capacity = queue_capacity;
    config
}

/// Build the service; `run_consumer` spawns the stream processor loop.
fn service(config: PumpConfig, run_consumer: bool) -> TestService {
    let model = load_model(&config);
    let cancel = CancellationToken::new();
    let (state, processing_loop) = build_pipeline(
        Arc::new(config),
        model,
        Arc::new(InMemorySink::new()),
        cancel.clone(),
    );
    let (consumer, idle) = if run_consumer {
        (Some(tokio::spawn(processing_loop.run())), None)
    } else {
        (None, Some(processing_loop))
    };
    TestService {
        state,
        cancel,
        consumer,
        _idle: idle,
    }
}

fn healthy_payload(config: &PumpConfig) -> serde_json::Value {
    let mut obj = serde_json::Map::new();
    for fit in config.channel_fits() {
        obj.insert(fit.sensor.id().to_string(), serde_json::json!(fit.normal));
    }
    serde_json::Value::Object(obj)
}

async fn get(app: Router, uri: &str) -> (StatusCode, serde_json::Value) {
    let resp = app
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = resp.status();
    let body = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null))
}

async fn post(app: Router, uri: &str, body: String) -> (StatusCode, serde_json::Value) {
    let resp = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header("content-type", "application/json")
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap();
    let status = resp.status();
    let body = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null))
}

/// Poll the live state until `done` holds or two seconds pass.
async fn wait_until(state: &AppState, done: impl Fn(&AppState) -> bool) {
    for _ in 0..200 {
        if done(state) {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached in time");
}

/// All v2 GET endpoints should return 200 before any data arrives.
#[tokio::test]
async fn test_v2_get_endpoints_return_200() {
    let svc = service(test_config(16), true);

    let endpoints = [
        "/api/v2/live",
        "/api/v2/anomalies/status",
        "/api/v2/anomalies/counts",
        "/api/v2/risk",
        "/api/v2/system/health",
        "/api/v2/history/readings",
        "/api/v2/history/inferences",
        "/api/v2/history/events",
        "/api/v2/admin/replay",
    ];

    for endpoint in &endpoints {
        let (status, json) = get(svc.app(), endpoint).await;
        assert_eq!(status, StatusCode::OK, "GET {endpoint}");
        assert!(json.get("data").is_some(), "GET {endpoint} missing envelope");
        assert_eq!(json["meta"]["version"], "2");
    }
}

#[tokio::test]
async fn test_live_initializing_before_first_reading() {
    let svc = service(test_config(16), true);
    let (status, json) = get(svc.app(), "/api/v2/live").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["status"], "INITIALIZING");
    assert_eq!(json["data"]["buffered"], 0);
    assert_eq!(json["data"]["window_size"], 30);
    assert!(json["data"]["values"].is_null());
}

#[tokio::test]
async fn test_unknown_source_reports_idle() {
    let svc = service(test_config(16), true);
    let (status, json) = get(svc.app(), "/api/v2/live?source=pump-99").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["source"], "pump-99");
    assert_eq!(json["data"]["status"], "INITIALIZING");
}

#[tokio::test]
async fn test_ingest_accepted_and_processed() {
    let config = test_config(16);
    let payload = healthy_payload(&config).to_string();
    let svc = service(config, true);

    let (status, json) = post(svc.app(), "/api/v2/ingest", payload).await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(json["data"]["source"], "pump-01");
    assert_eq!(json["data"]["queue_capacity"], 16);

    wait_until(&svc.state, |s| s.live.load().counters.total_processed == 1).await;

    let (_, json) = get(svc.app(), "/api/v2/live").await;
    assert_eq!(json["data"]["status"], "LEARNING");
    assert_eq!(json["data"]["buffered"], 1);
    assert_eq!(json["data"]["values"]["bearing_temperature"], 40.0);

    let (_, json) = get(svc.app(), "/api/v2/history/readings").await;
    assert_eq!(json["data"]["count"], 1);
}

#[tokio::test]
async fn test_ingest_rejects_malformed_payloads() {
    let config = test_config(16);
    let mut missing = healthy_payload(&config);
    missing.as_object_mut().unwrap().remove("vibration");
    let mut unknown = healthy_payload(&config);
    unknown["coolant_level"] = serde_json::json!(3.0);
    let mut not_number = healthy_payload(&config);
    not_number["motor_rpm"] = serde_json::json!("fast");
    let svc = service(config, true);

    for body in [
        "{not json".to_string(),
        "[1, 2, 3]".to_string(),
        missing.to_string(),
        unknown.to_string(),
        not_number.to_string(),
    ] {
        let (status, json) = post(svc.app(), "/api/v2/ingest", body.clone()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "body {body}");
        assert_eq!(json["error"]["code"], "BAD_REQUEST");
    }
    assert_eq!(svc.state.queue.depth(), 0);
    assert_eq!(svc.state.queue.stats().accepted(), 0);
}

#[tokio::test]
async fn test_ingest_full_queue_returns_busy() {
    let config = test_config(2);
    let payload = healthy_payload(&config).to_string();
    // Consumer not running: nothing drains the queue
    let svc = service(config, false);

    for _ in 0..2 {
        let (status, _) = post(svc.app(), "/api/v2/ingest", payload.clone()).await;
        assert_eq!(status, StatusCode::ACCEPTED);
    }
    let (status, json) = post(svc.app(), "/api/v2/ingest", payload).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(json["error"]["code"], "SERVICE_BUSY");
    assert_eq!(svc.state.queue.stats().rejected(), 1);
    assert_eq!(svc.state.queue.depth(), 2);
}

#[tokio::test]
async fn test_legacy_endpoints_carry_deprecation_headers() {
    let svc = service(test_config(16), true);

    for endpoint in [
        "/api/live-data",
        "/api/anomaly-status",
        "/api/anomaly-count",
        "/api/system-health",
    ] {
        let resp = svc
            .app()
            .oneshot(Request::builder().uri(endpoint).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK, "GET {endpoint}");
        assert_eq!(resp.headers().get("deprecation").unwrap(), "true");
        assert_eq!(resp.headers().get("sunset").unwrap(), "2027-06-30");
    }
}

#[tokio::test]
async fn test_legacy_shapes_are_flat() {
    let svc = service(test_config(16), true);

    let (_, json) = get(svc.app(), "/api/anomaly-status").await;
    assert_eq!(json["system_status"], "INITIALIZING");
    assert_eq!(json["is_anomaly"], false);
    assert_eq!(json["threshold"], 0.05);

    let (_, json) = get(svc.app(), "/api/anomaly-count").await;
    assert_eq!(json["total"], 0);
    assert_eq!(json["per_sensor"].as_object().unwrap().len(), NUM_CHANNELS);
    assert_eq!(json["per_sensor"]["bearing_temperature"], 0);

    let (_, json) = get(svc.app(), "/api/system-health").await;
    assert_eq!(json["model_status"], "SIMULATED");
}

#[tokio::test]
async fn test_health_returns_json() {
    let svc = service(test_config(16), true);
    let (status, json) = get(svc.app(), "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");

    let (status, json) = get(svc.app(), "/api/v2/system/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["model"]["status"], "SIMULATED");
    assert_eq!(json["data"]["persistence"]["backend"], "InMemory");
    assert_eq!(json["data"]["queue"]["capacity"], 16);
}

#[tokio::test]
async fn test_resolve_unknown_event_is_404() {
    let svc = service(test_config(16), true);
    wait_until(&svc.state, |s| s.live.consumer_running()).await;
    let (status, json) = post(svc.app(), "/api/v2/admin/events/424242/resolve", String::new()).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["error"]["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_reset_counters_returns_zeroed_counters() {
    let config = test_config(16);
    let payload = healthy_payload(&config).to_string();
    let svc = service(config, true);

    post(svc.app(), "/api/v2/ingest", payload).await;
    wait_until(&svc.state, |s| s.live.load().counters.total_processed == 1).await;

    let (status, json) = post(svc.app(), "/api/v2/admin/counters/reset", String::new()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["total_processed"], 0);
    assert_eq!(json["data"]["total_anomalies"], 0);
    assert_eq!(svc.state.live.load().counters.total_processed, 0);
}

#[tokio::test]
async fn test_history_rejects_inverted_range() {
    let svc = service(test_config(16), true);
    let (status, json) = get(
        svc.app(),
        "/api/v2/history/readings?from=2026-01-02T00:00:00Z&to=2026-01-01T00:00:00Z",
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"]["code"], "BAD_REQUEST");

    let (status, _) = get(svc.app(), "/api/v2/history/events?from=yesterday").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_replay_without_source_is_bad_request() {
    let svc = service(test_config(16), true);
    let (status, _) = post(svc.app(), "/api/v2/admin/replay/start", "{}".to_string()).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = post(
        svc.app(),
        "/api/v2/admin/replay/start",
        r#"{"path": "/nonexistent/pump.csv"}"#.to_string(),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, json) = post(svc.app(), "/api/v2/admin/replay/stop", String::new()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["stopped"], false);
}

#[tokio::test]
async fn test_consumer_stops_on_cancel() {
    let mut svc = service(test_config(16), true);
    wait_until(&svc.state, |s| s.live.consumer_running()).await;
    svc.cancel.cancel();
    let stats = svc.consumer.take().unwrap().await.unwrap();
    assert_eq!(stats.readings_processed, 0);
    assert!(!svc.state.live.consumer_running());
    assert_eq!(svc.state.live.load().overall_status(), SystemStatus::Initializing);
}
