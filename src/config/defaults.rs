//! System-wide default constants.
//!
//! Grouped by subsystem. Config defaults in `pump_config.rs` refer to these
//! so the numbers live in one place.

// ============================================================================
// Pipeline
// ============================================================================

/// Pending readings the ingestion queue holds before rejecting submissions.
pub const QUEUE_CAPACITY: usize = 1_000;

/// Readings per sequence window.
pub const WINDOW_SIZE: usize = 30;

/// Log a progress line every N processed readings.
pub const PROGRESS_LOG_INTERVAL: u64 = 100;

/// Pending administrative commands before senders wait.
pub const CONTROL_CHANNEL_CAPACITY: usize = 32;

/// Window used for the `recent_anomalies` counter (seconds).
pub const RECENT_ANOMALY_WINDOW_SECS: i64 = 3_600;

// ============================================================================
// Model
// ============================================================================

/// Reconstruction-error threshold above which a window is anomalous.
pub const ANOMALY_THRESHOLD: f64 = 0.05;

/// Model artifact looked up relative to the working directory.
pub const MODEL_ARTIFACT_PATH: &str = "models/pump_autoencoder.json";

// ============================================================================
// Attribution
// ============================================================================

/// A channel's share of the threshold is `threshold / NUM_CHANNELS`.
/// Delta above `share * factor` marks the sensor ANOMALY.
pub const CONTRIBUTION_ANOMALY_FACTOR: f64 = 1.5;

/// Delta above `share * factor` marks the sensor CRITICAL. At 10 a single
/// channel carries the whole window threshold.
pub const CONTRIBUTION_CRITICAL_FACTOR: f64 = 10.0;

// ============================================================================
// Storage
// ============================================================================

/// Data directory holding the sled database and the process lock.
pub const DATA_DIR: &str = "./data";

/// In-memory ring capacity for readings and inference results.
pub const MEMORY_RECORD_CAPACITY: usize = 10_000;

/// In-memory ring capacity for maintenance events.
pub const MEMORY_EVENT_CAPACITY: usize = 1_000;

// ============================================================================
// Read API
// ============================================================================

/// Default bind address for the HTTP server.
pub const SERVER_ADDR: &str = "0.0.0.0:8080";

/// History queries return this many rows when no limit is given.
pub const HISTORY_DEFAULT_LIMIT: usize = 100;

/// Upper bound on any history query.
pub const HISTORY_MAX_LIMIT: usize = 1_000;

// ============================================================================
// Replay
// ============================================================================

/// Delay between replayed readings (milliseconds).
pub const REPLAY_INTERVAL_MS: u64 = 1_000;

/// Delay before retrying the end-of-replay marker on a full queue (milliseconds).
pub const REPLAY_MARKER_RETRY_MS: u64 = 50;
