//! Degrading persistence wrapper
//!
//! Writes go to the primary sink. The first primary failure flips the
//! wrapper into degraded mode: from then on every write is also mirrored
//! into an in-memory store, and writes the primary rejects land there alone.
//! Reads prefer the primary and fall back to memory when it errors.
//! Ingestion never sees a persistence error through this wrapper.

use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{error, info, warn};

use super::memory::InMemorySink;
use super::persistence::{HistoryQuery, PersistenceError, PersistenceSink, SinkStats};
use crate::types::{
    InferenceResult, MaintenanceEvent, RecordId, SensorReading, StoredInference, StoredReading,
};

/// Ids assigned by the fallback store start here, clear of primary ids.
pub const FALLBACK_ID_BASE: RecordId = 1 << 48;

pub struct FallbackSink {
    primary: Arc<dyn PersistenceSink>,
    memory: InMemorySink,
    degraded: AtomicBool,
    primary_failures: AtomicU64,
}

impl FallbackSink {
    pub fn new(primary: Arc<dyn PersistenceSink>, max_records: usize, max_events: usize) -> Self {
        Self {
            primary,
            memory: InMemorySink::with_id_base(FALLBACK_ID_BASE, max_records, max_events),
            degraded: AtomicBool::new(false),
            primary_failures: AtomicU64::new(0),
        }
    }

    /// Primary write failures absorbed so far.
    pub fn primary_failures(&self) -> u64 {
        self.primary_failures.load(Ordering::Relaxed)
    }

    fn note_failure(&self, op: &str, e: &PersistenceError) {
        self.primary_failures.fetch_add(1, Ordering::Relaxed);
        if !self.degraded.swap(true, Ordering::AcqRel) {
            error!(
                backend = self.primary.backend_name(),
                op,
                error = %e,
                "⚠️ Primary persistence failed, switching to in-memory fallback"
            );
        } else {
            warn!(op, error = %e, "Primary persistence write failed (degraded)");
        }
    }

    /// Run a write against the primary; mirror or absorb into memory.
    fn write<P, M>(&self, op: &str, primary: P, mirror: M) -> Result<RecordId, PersistenceError>
    where
        P: FnOnce() -> Result<RecordId, PersistenceError>,
        M: FnOnce(Option<RecordId>) -> Result<RecordId, PersistenceError>,
    {
        match primary() {
            Ok(id) => {
                if self.degraded.load(Ordering::Acquire) {
                    if let Err(e) = mirror(Some(id)) {
                        warn!(op, id, error = %e, "Failed to mirror write into memory");
                    }
                }
                Ok(id)
            }
            Err(e) => {
                self.note_failure(op, &e);
                mirror(None)
            }
        }
    }

    fn read<T, P, M>(&self, primary: P, memory: M) -> Result<T, PersistenceError>
    where
        P: FnOnce() -> Result<T, PersistenceError>,
        M: FnOnce() -> Result<T, PersistenceError>,
    {
        match primary() {
            Ok(v) => Ok(v),
            Err(e) => {
                warn!(error = %e, "Primary persistence read failed, serving from memory");
                memory()
            }
        }
    }
}

impl PersistenceSink for FallbackSink {
    fn insert_reading(&self, reading: &SensorReading) -> Result<RecordId, PersistenceError> {
        self.write(
            "insert_reading",
            || self.primary.insert_reading(reading),
            |id| match id {
                Some(id) => self.memory.insert_reading_with_id(id, reading).map(|_| id),
                None => self.memory.insert_reading(reading),
            },
        )
    }

    fn insert_inference(&self, result: &InferenceResult) -> Result<RecordId, PersistenceError> {
        self.write(
            "insert_inference",
            || self.primary.insert_inference(result),
            |id| match id {
                Some(id) => self.memory.insert_inference_with_id(id, result).map(|_| id),
                None => self.memory.insert_inference(result),
            },
        )
    }

    fn insert_event(&self, event: &MaintenanceEvent) -> Result<RecordId, PersistenceError> {
        self.write(
            "insert_event",
            || self.primary.insert_event(event),
            |id| match id {
                Some(id) => self.memory.insert_event_with_id(id, event).map(|_| id),
                None => self.memory.insert_event(event),
            },
        )
    }

    fn resolve_event(
        &self,
        id: RecordId,
        at: DateTime<Utc>,
    ) -> Result<MaintenanceEvent, PersistenceError> {
        if id >= FALLBACK_ID_BASE {
            return self.memory.resolve_event(id, at);
        }
        match self.primary.resolve_event(id, at) {
            Ok(event) => {
                // Keep a mirrored copy in step; absence is fine
                if let Err(e) = self.memory.resolve_event(id, at) {
                    if !matches!(e, PersistenceError::NotFound) {
                        warn!(id, error = %e, "Failed to resolve mirrored event");
                    }
                }
                Ok(event)
            }
            Err(PersistenceError::NotFound) => Err(PersistenceError::NotFound),
            Err(e) => {
                self.note_failure("resolve_event", &e);
                self.memory.resolve_event(id, at)
            }
        }
    }

    fn get_event(&self, id: RecordId) -> Result<Option<MaintenanceEvent>, PersistenceError> {
        if id >= FALLBACK_ID_BASE {
            return self.memory.get_event(id);
        }
        self.read(|| self.primary.get_event(id), || self.memory.get_event(id))
    }

    fn list_readings(&self, query: &HistoryQuery) -> Result<Vec<StoredReading>, PersistenceError> {
        self.read(
            || self.primary.list_readings(query),
            || self.memory.list_readings(query),
        )
    }

    fn list_inferences(
        &self,
        query: &HistoryQuery,
    ) -> Result<Vec<StoredInference>, PersistenceError> {
        self.read(
            || self.primary.list_inferences(query),
            || self.memory.list_inferences(query),
        )
    }

    fn list_events(&self, query: &HistoryQuery) -> Result<Vec<MaintenanceEvent>, PersistenceError> {
        self.read(
            || self.primary.list_events(query),
            || self.memory.list_events(query),
        )
    }

    fn stats(&self) -> Result<SinkStats, PersistenceError> {
        self.read(|| self.primary.stats(), || self.memory.stats())
    }

    fn backend_name(&self) -> &'static str {
        self.primary.backend_name()
    }

    fn is_degraded(&self) -> bool {
        self.degraded.load(Ordering::Acquire)
    }
}

/// Build the configured sink: sled behind a fallback, or memory only.
///
/// A sled open failure is logged and degrades to memory; it is never fatal.
pub fn open_sink(config: &crate::config::StorageConfig, memory_only: bool) -> Arc<dyn PersistenceSink> {
    let memory = || -> Arc<dyn PersistenceSink> {
        Arc::new(InMemorySink::with_capacity(
            config.memory_record_capacity,
            config.memory_event_capacity,
        ))
    };

    if memory_only || !config.enabled {
        info!("💾 Persistence: in-memory only");
        return memory();
    }

    let path = config.sled_path();
    match super::SledSink::open(&path) {
        Ok(sled) => {
            info!(path = %path.display(), "💾 Persistence: sled with in-memory fallback");
            Arc::new(FallbackSink::new(
                Arc::new(sled),
                config.memory_record_capacity,
                config.memory_event_capacity,
            ))
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Failed to open sled store, running in-memory only");
            memory()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Channel, Severity, NUM_CHANNELS};

    /// Primary that fails every call.
    struct BrokenSink;

    impl PersistenceSink for BrokenSink {
        fn insert_reading(&self, _: &SensorReading) -> Result<RecordId, PersistenceError> {
            Err(PersistenceError::Unavailable("disk gone".into()))
        }
        fn insert_inference(&self, _: &InferenceResult) -> Result<RecordId, PersistenceError> {
            Err(PersistenceError::Unavailable("disk gone".into()))
        }
        fn insert_event(&self, _: &MaintenanceEvent) -> Result<RecordId, PersistenceError> {
            Err(PersistenceError::Unavailable("disk gone".into()))
        }
        fn resolve_event(&self, _: RecordId, _: DateTime<Utc>) -> Result<MaintenanceEvent, PersistenceError> {
            Err(PersistenceError::Unavailable("disk gone".into()))
        }
        fn get_event(&self, _: RecordId) -> Result<Option<MaintenanceEvent>, PersistenceError> {
            Err(PersistenceError::Unavailable("disk gone".into()))
        }
        fn list_readings(&self, _: &HistoryQuery) -> Result<Vec<StoredReading>, PersistenceError> {
            Err(PersistenceError::Unavailable("disk gone".into()))
        }
        fn list_inferences(&self, _: &HistoryQuery) -> Result<Vec<StoredInference>, PersistenceError> {
            Err(PersistenceError::Unavailable("disk gone".into()))
        }
        fn list_events(&self, _: &HistoryQuery) -> Result<Vec<MaintenanceEvent>, PersistenceError> {
            Err(PersistenceError::Unavailable("disk gone".into()))
        }
        fn stats(&self) -> Result<SinkStats, PersistenceError> {
            Err(PersistenceError::Unavailable("disk gone".into()))
        }
        fn backend_name(&self) -> &'static str {
            "Broken"
        }
    }

    fn event() -> MaintenanceEvent {
        MaintenanceEvent {
            id: 0,
            source: "pump-01".into(),
            event_type: "ANOMALY_DETECTED".into(),
            severity: Severity::Medium,
            sensor: Channel::OilPressure,
            description: "oil pressure low".into(),
            estimated_cost: 25_000.0,
            trigger_value: 0.8,
            trigger_version: 1,
            resolved: false,
            created_at: Utc::now(),
            resolved_at: None,
        }
    }

    #[test]
    fn test_broken_primary_degrades_without_error() {
        let sink = FallbackSink::new(Arc::new(BrokenSink), 100, 10);
        assert!(!sink.is_degraded());

        let id = sink
            .insert_reading(&SensorReading::new("pump-01", Utc::now(), [1.0; NUM_CHANNELS]))
            .unwrap();
        assert!(id >= FALLBACK_ID_BASE);
        assert!(sink.is_degraded());
        assert_eq!(sink.primary_failures(), 1);

        let rows = sink.list_readings(&HistoryQuery::default()).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].id, id);
    }

    #[test]
    fn test_events_resolvable_in_fallback() {
        let sink = FallbackSink::new(Arc::new(BrokenSink), 100, 10);
        let id = sink.insert_event(&event()).unwrap();
        let resolved = sink.resolve_event(id, Utc::now()).unwrap();
        assert!(resolved.resolved);
        assert!(sink.get_event(id).unwrap().unwrap().resolved);
    }

    #[test]
    fn test_healthy_primary_not_mirrored() {
        let sink = FallbackSink::new(Arc::new(InMemorySink::new()), 100, 10);
        sink.insert_reading(&SensorReading::new("pump-01", Utc::now(), [1.0; NUM_CHANNELS]))
            .unwrap();
        assert!(!sink.is_degraded());
        assert_eq!(sink.memory.stats().unwrap().readings, 0);
        assert_eq!(sink.backend_name(), "InMemory");
    }

    #[test]
    fn test_open_sink_memory_only() {
        let config = crate::config::StorageConfig::default();
        let sink = open_sink(&config, true);
        assert_eq!(sink.backend_name(), "InMemory");
    }

    #[test]
    fn test_open_sink_sled() {
        let dir = tempfile::tempdir().unwrap();
        let config = crate::config::StorageConfig {
            data_dir: dir.path().display().to_string(),
            ..crate::config::StorageConfig::default()
        };
        let sink = open_sink(&config, false);
        assert_eq!(sink.backend_name(), "Sled");
        assert!(!sink.is_degraded());
    }
}
