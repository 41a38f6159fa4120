//! Published live state
//!
//! The stream processor builds an immutable [`LiveSnapshot`] after every item
//! and swaps it in atomically. Readers take an `Arc` to the current snapshot
//! and never block the consumer.

use arc_swap::ArcSwap;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::types::{AnomalyCounters, InferenceResult, MaintenanceEvent, SensorReading, SystemStatus};

/// Latest processed state for one pump source.
#[derive(Debug, Clone, Serialize)]
pub struct SourceSnapshot {
    pub source: String,
    pub status: SystemStatus,
    /// Readings currently held in the sequence window
    pub buffered: usize,
    pub window_size: usize,
    pub latest_reading: Option<SensorReading>,
    pub latest_result: Option<InferenceResult>,
    /// Unresolved maintenance events, oldest first
    pub open_events: Vec<MaintenanceEvent>,
    pub updated_at: DateTime<Utc>,
}

impl SourceSnapshot {
    pub fn idle(source: impl Into<String>, window_size: usize, at: DateTime<Utc>) -> Self {
        Self {
            source: source.into(),
            status: SystemStatus::Initializing,
            buffered: 0,
            window_size,
            latest_reading: None,
            latest_result: None,
            open_events: Vec::new(),
            updated_at: at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LiveSnapshot {
    /// Increments with every publication
    pub sequence: u64,
    pub published_at: DateTime<Utc>,
    pub sources: BTreeMap<String, SourceSnapshot>,
    pub counters: AnomalyCounters,
    pub last_latency_ms: Option<f64>,
    /// Source of the most recently processed item
    pub last_source: Option<String>,
}

impl LiveSnapshot {
    pub fn empty(at: DateTime<Utc>) -> Self {
        Self {
            sequence: 0,
            published_at: at,
            sources: BTreeMap::new(),
            counters: AnomalyCounters::new(at),
            last_latency_ms: None,
            last_source: None,
        }
    }

    /// Snapshot for `source`, or for the most recently active source.
    pub fn source(&self, source: Option<&str>) -> Option<&SourceSnapshot> {
        match source {
            Some(name) => self.sources.get(name),
            None => self
                .last_source
                .as_deref()
                .and_then(|name| self.sources.get(name)),
        }
    }

    /// Worst status across all sources.
    pub fn overall_status(&self) -> SystemStatus {
        let rank = |s: SystemStatus| match s {
            SystemStatus::Critical => 5,
            SystemStatus::Anomaly => 4,
            SystemStatus::Normal => 3,
            SystemStatus::Learning => 2,
            SystemStatus::Completed => 1,
            SystemStatus::Initializing => 0,
        };
        self.sources
            .values()
            .map(|s| s.status)
            .max_by_key(|s| rank(*s))
            .unwrap_or_default()
    }
}

/// Shared handle to the live snapshot plus consumer liveness.
#[derive(Debug)]
pub struct LiveState {
    current: ArcSwap<LiveSnapshot>,
    consumer_running: AtomicBool,
}

impl LiveState {
    pub fn new() -> Self {
        Self {
            current: ArcSwap::from_pointee(LiveSnapshot::empty(Utc::now())),
            consumer_running: AtomicBool::new(false),
        }
    }

    pub fn load(&self) -> Arc<LiveSnapshot> {
        self.current.load_full()
    }

    pub fn publish(&self, snapshot: LiveSnapshot) {
        self.current.store(Arc::new(snapshot));
    }

    pub fn set_consumer_running(&self, running: bool) {
        self.consumer_running.store(running, Ordering::Release);
    }

    pub fn consumer_running(&self) -> bool {
        self.consumer_running.load(Ordering::Acquire)
    }
}

impl Default for LiveState {
    fn default() -> Self {
        Self::new()
    }
}
