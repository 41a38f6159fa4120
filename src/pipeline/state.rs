//! Application state shared with API handlers.
//!
//! Everything here is a handle: producers submit through the queue, admin
//! actions go over the control channel, and reads come from the published
//! live snapshot or the persistence sink. Nothing in `AppState` lets a
//! handler mutate consumer-owned state directly.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;

use super::control::ControlHandle;
use super::live::LiveState;
use super::queue::IngestionQueue;
use super::replay::ReplayController;
use crate::config::PumpConfig;
use crate::ml_engine::{LoadedModel, ModelStatus};
use crate::storage::PersistenceSink;

/// Static description of the active model, for health output.
#[derive(Debug, Clone, Serialize)]
pub struct ModelInfo {
    pub name: String,
    pub status: ModelStatus,
    pub threshold: f64,
    pub window_size: usize,
}

impl ModelInfo {
    pub fn from_loaded(model: &LoadedModel, window_size: usize) -> Self {
        Self {
            name: model.model.name().to_string(),
            status: model.model.status(),
            threshold: model.threshold,
            window_size,
        }
    }
}

/// Shared application state handed to every API handler.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<PumpConfig>,
    pub queue: IngestionQueue,
    pub control: ControlHandle,
    pub live: Arc<LiveState>,
    pub sink: Arc<dyn PersistenceSink>,
    pub model: ModelInfo,
    pub replay: Arc<ReplayController>,
    pub started_at: DateTime<Utc>,
}

impl AppState {
    /// Seconds since the process started serving.
    pub fn uptime_secs(&self) -> i64 {
        (Utc::now() - self.started_at).num_seconds().max(0)
    }
}
