//! PUMPGUARD: Industrial Pump Monitoring
//!
//! Streaming anomaly detection over fixed-length sensor windows.
//!
//! ## Architecture
//!
//! - **Acquisition**: JSON ingestion payloads and CSV dataset replay
//! - **Pipeline**: bounded ingestion queue feeding a single stream processor
//!   (sequence window, inference, attribution, maintenance triggers)
//! - **ML Engine**: pluggable sequence-reconstruction models
//! - **Storage**: persistence sinks (sled, in-memory, degrading fallback)
//! - **API**: live state, history and admin endpoints over Axum

pub mod acquisition;
pub mod api;
pub mod config;
pub mod health;
pub mod ml_engine;
pub mod pipeline;
pub mod storage;
pub mod types;

// Re-export configuration
pub use config::PumpConfig;

// Re-export commonly used types
pub use types::{
    AnomalyCounters, Channel, InferenceResult, MaintenanceEvent, SensorReading, SensorState,
    Severity, SystemStatus, NUM_CHANNELS,
};

// Re-export pipeline entry points
pub use pipeline::{build_pipeline, AppState, IngestionQueue, ProcessingLoop, StreamProcessor};

// Re-export storage
pub use storage::{open_sink, PersistenceError, PersistenceSink};

// Re-export model loading
pub use ml_engine::{load_model, InferenceModel, LoadedModel};
