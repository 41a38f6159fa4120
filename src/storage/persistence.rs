//! PersistenceSink trait: pluggable storage backend
//!
//! The stream processor writes through this trait without knowing which
//! backend sits behind it:
//! - `SledSink`: durable embedded store (default)
//! - `InMemorySink`: bounded rings, used for memory-only runs and as the
//!   degraded fallback
//! - `FallbackSink`: primary sink plus an in-memory mirror
//!
//! Writes are append-only. The only in-place update is resolving a
//! maintenance event.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::config::defaults::{HISTORY_DEFAULT_LIMIT, HISTORY_MAX_LIMIT};
use crate::types::{
    InferenceResult, MaintenanceEvent, RecordId, SensorReading, StoredInference, StoredReading,
};

/// Trait for pluggable persistence backends
///
/// Implementations must be thread-safe (Send + Sync): the consumer task
/// writes while API handlers read.
pub trait PersistenceSink: Send + Sync {
    /// Append a raw reading, returning its id
    fn insert_reading(&self, reading: &SensorReading) -> Result<RecordId, PersistenceError>;

    /// Append an inference result (carries its reading back-reference)
    fn insert_inference(&self, result: &InferenceResult) -> Result<RecordId, PersistenceError>;

    /// Append a maintenance event; the stored copy carries the returned id
    fn insert_event(&self, event: &MaintenanceEvent) -> Result<RecordId, PersistenceError>;

    /// Mark an event resolved. Resolving twice is a no-op returning the
    /// already-resolved event.
    fn resolve_event(
        &self,
        id: RecordId,
        at: DateTime<Utc>,
    ) -> Result<MaintenanceEvent, PersistenceError>;

    fn get_event(&self, id: RecordId) -> Result<Option<MaintenanceEvent>, PersistenceError>;

    /// Readings matching the query, newest first
    fn list_readings(&self, query: &HistoryQuery) -> Result<Vec<StoredReading>, PersistenceError>;

    /// Inference results matching the query, newest first
    fn list_inferences(
        &self,
        query: &HistoryQuery,
    ) -> Result<Vec<StoredInference>, PersistenceError>;

    /// Events matching the query (including `resolved`), newest first
    fn list_events(&self, query: &HistoryQuery) -> Result<Vec<MaintenanceEvent>, PersistenceError>;

    fn stats(&self) -> Result<SinkStats, PersistenceError>;

    /// Backend name for logging and health output
    fn backend_name(&self) -> &'static str;

    /// True when writes are being absorbed by a fallback store
    fn is_degraded(&self) -> bool {
        false
    }
}

/// Persistence errors
#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    #[error("serialization error: {0}")]
    Serialization(String),
    #[error("storage error: {0}")]
    Storage(String),
    #[error("not found")]
    NotFound,
    #[error("persistence unavailable: {0}")]
    Unavailable(String),
}

impl From<serde_json::Error> for PersistenceError {
    fn from(err: serde_json::Error) -> Self {
        PersistenceError::Serialization(err.to_string())
    }
}

/// Record counts per kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SinkStats {
    pub readings: usize,
    pub inferences: usize,
    pub events: usize,
}

/// Time-ranged, limit-bounded history filter.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryQuery {
    /// Inclusive lower bound on the record timestamp
    pub from: Option<DateTime<Utc>>,
    /// Inclusive upper bound on the record timestamp
    pub to: Option<DateTime<Utc>>,
    pub limit: usize,
    pub source: Option<String>,
    /// Events only
    pub resolved: Option<bool>,
}

impl Default for HistoryQuery {
    fn default() -> Self {
        Self {
            from: None,
            to: None,
            limit: HISTORY_DEFAULT_LIMIT,
            source: None,
            resolved: None,
        }
    }
}

impl HistoryQuery {
    pub fn latest(limit: usize) -> Self {
        Self {
            limit,
            ..Self::default()
        }
    }

    /// Limit clamped to `1..=HISTORY_MAX_LIMIT`.
    pub fn effective_limit(&self) -> usize {
        self.limit.clamp(1, HISTORY_MAX_LIMIT)
    }

    pub fn matches(&self, source: &str, timestamp: DateTime<Utc>) -> bool {
        if let Some(from) = self.from {
            if timestamp < from {
                return false;
            }
        }
        if let Some(to) = self.to {
            if timestamp > to {
                return false;
            }
        }
        match &self.source {
            Some(s) => s == source,
            None => true,
        }
    }

    pub fn matches_event(&self, event: &MaintenanceEvent) -> bool {
        if let Some(resolved) = self.resolved {
            if event.resolved != resolved {
                return false;
            }
        }
        self.matches(&event.source, event.created_at)
    }
}
