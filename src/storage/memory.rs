//! In-memory persistence
//!
//! Bounded rings guarded by `RwLock`. Not durable; data is lost on restart.
//! Oldest records are evicted once a ring is full.

use chrono::{DateTime, Utc};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

use super::persistence::{HistoryQuery, PersistenceError, PersistenceSink, SinkStats};
use crate::config::defaults::{MEMORY_EVENT_CAPACITY, MEMORY_RECORD_CAPACITY};
use crate::types::{
    InferenceResult, MaintenanceEvent, RecordId, SensorReading, StoredInference, StoredReading,
};

pub struct InMemorySink {
    readings: RwLock<VecDeque<StoredReading>>,
    inferences: RwLock<VecDeque<StoredInference>>,
    events: RwLock<VecDeque<MaintenanceEvent>>,
    next_id: AtomicU64,
    max_records: usize,
    max_events: usize,
}

impl InMemorySink {
    /// Create a store with default limits
    pub fn new() -> Self {
        Self::with_capacity(MEMORY_RECORD_CAPACITY, MEMORY_EVENT_CAPACITY)
    }

    pub fn with_capacity(max_records: usize, max_events: usize) -> Self {
        Self::with_id_base(1, max_records, max_events)
    }

    /// Ids handed out start at `base`, keeping them apart from another
    /// store's id range.
    pub fn with_id_base(base: RecordId, max_records: usize, max_events: usize) -> Self {
        Self {
            readings: RwLock::new(VecDeque::new()),
            inferences: RwLock::new(VecDeque::new()),
            events: RwLock::new(VecDeque::new()),
            next_id: AtomicU64::new(base.max(1)),
            max_records: max_records.max(1),
            max_events: max_events.max(1),
        }
    }

    fn allocate_id(&self) -> RecordId {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Store a reading under an id assigned elsewhere.
    pub fn insert_reading_with_id(
        &self,
        id: RecordId,
        reading: &SensorReading,
    ) -> Result<(), PersistenceError> {
        let mut store = self.readings.write().map_err(|e| PersistenceError::Storage(e.to_string()))?;
        push_bounded(&mut store, StoredReading { id, reading: reading.clone() }, self.max_records);
        Ok(())
    }

    pub fn insert_inference_with_id(
        &self,
        id: RecordId,
        result: &InferenceResult,
    ) -> Result<(), PersistenceError> {
        let mut store = self.inferences.write().map_err(|e| PersistenceError::Storage(e.to_string()))?;
        push_bounded(&mut store, StoredInference { id, result: result.clone() }, self.max_records);
        Ok(())
    }

    pub fn insert_event_with_id(
        &self,
        id: RecordId,
        event: &MaintenanceEvent,
    ) -> Result<(), PersistenceError> {
        let mut store = self.events.write().map_err(|e| PersistenceError::Storage(e.to_string()))?;
        let mut stored = event.clone();
        stored.id = id;
        push_bounded(&mut store, stored, self.max_events);
        Ok(())
    }
}

impl Default for InMemorySink {
    fn default() -> Self {
        Self::new()
    }
}

fn push_bounded<T>(store: &mut VecDeque<T>, item: T, max: usize) {
    store.push_back(item);
    while store.len() > max {
        store.pop_front();
    }
}

impl PersistenceSink for InMemorySink {
    fn insert_reading(&self, reading: &SensorReading) -> Result<RecordId, PersistenceError> {
        let id = self.allocate_id();
        self.insert_reading_with_id(id, reading)?;
        Ok(id)
    }

    fn insert_inference(&self, result: &InferenceResult) -> Result<RecordId, PersistenceError> {
        let id = self.allocate_id();
        self.insert_inference_with_id(id, result)?;
        Ok(id)
    }

    fn insert_event(&self, event: &MaintenanceEvent) -> Result<RecordId, PersistenceError> {
        let id = self.allocate_id();
        self.insert_event_with_id(id, event)?;
        Ok(id)
    }

    fn resolve_event(
        &self,
        id: RecordId,
        at: DateTime<Utc>,
    ) -> Result<MaintenanceEvent, PersistenceError> {
        let mut store = self.events.write().map_err(|e| PersistenceError::Storage(e.to_string()))?;
        let event = store
            .iter_mut()
            .find(|e| e.id == id)
            .ok_or(PersistenceError::NotFound)?;
        event.resolve(at);
        Ok(event.clone())
    }

    fn get_event(&self, id: RecordId) -> Result<Option<MaintenanceEvent>, PersistenceError> {
        let store = self.events.read().map_err(|e| PersistenceError::Storage(e.to_string()))?;
        Ok(store.iter().find(|e| e.id == id).cloned())
    }

    fn list_readings(&self, query: &HistoryQuery) -> Result<Vec<StoredReading>, PersistenceError> {
        let store = self.readings.read().map_err(|e| PersistenceError::Storage(e.to_string()))?;
        Ok(store
            .iter()
            .rev()
            .filter(|r| query.matches(&r.reading.source, r.reading.timestamp))
            .take(query.effective_limit())
            .cloned()
            .collect())
    }

    fn list_inferences(
        &self,
        query: &HistoryQuery,
    ) -> Result<Vec<StoredInference>, PersistenceError> {
        let store = self.inferences.read().map_err(|e| PersistenceError::Storage(e.to_string()))?;
        Ok(store
            .iter()
            .rev()
            .filter(|r| query.matches(&r.result.source, r.result.timestamp))
            .take(query.effective_limit())
            .cloned()
            .collect())
    }

    fn list_events(&self, query: &HistoryQuery) -> Result<Vec<MaintenanceEvent>, PersistenceError> {
        let store = self.events.read().map_err(|e| PersistenceError::Storage(e.to_string()))?;
        Ok(store
            .iter()
            .rev()
            .filter(|e| query.matches_event(e))
            .take(query.effective_limit())
            .cloned()
            .collect())
    }

    fn stats(&self) -> Result<SinkStats, PersistenceError> {
        let err = |e: String| PersistenceError::Storage(e);
        Ok(SinkStats {
            readings: self.readings.read().map_err(|e| err(e.to_string()))?.len(),
            inferences: self.inferences.read().map_err(|e| err(e.to_string()))?.len(),
            events: self.events.read().map_err(|e| err(e.to_string()))?.len(),
        })
    }

    fn backend_name(&self) -> &'static str {
        "InMemory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Channel, Severity, NUM_CHANNELS};
    use chrono::Duration;

    fn reading(ts: DateTime<Utc>) -> SensorReading {
        SensorReading::new("pump-01", ts, [1.0; NUM_CHANNELS])
    }

    fn event(resolved: bool) -> MaintenanceEvent {
        MaintenanceEvent {
            id: 0,
            source: "pump-01".into(),
            event_type: "ANOMALY_DETECTED".into(),
            severity: Severity::High,
            sensor: Channel::Vibration,
            description: "vibration high".into(),
            estimated_cost: 42_000.0,
            trigger_value: 8.4,
            trigger_version: 1,
            resolved,
            created_at: Utc::now(),
            resolved_at: None,
        }
    }

    #[test]
    fn test_ids_monotonic_and_newest_first() {
        let sink = InMemorySink::new();
        let t = Utc::now();
        let a = sink.insert_reading(&reading(t)).unwrap();
        let b = sink.insert_reading(&reading(t + Duration::seconds(1))).unwrap();
        assert!(b > a);
        let rows = sink.list_readings(&HistoryQuery::latest(10)).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].id, b);
    }

    #[test]
    fn test_eviction_at_capacity() {
        let sink = InMemorySink::with_capacity(3, 2);
        for i in 0..5 {
            sink.insert_reading(&reading(Utc::now() + Duration::seconds(i))).unwrap();
        }
        for _ in 0..3 {
            sink.insert_event(&event(false)).unwrap();
        }
        let stats = sink.stats().unwrap();
        assert_eq!(stats.readings, 3);
        assert_eq!(stats.events, 2);
    }

    #[test]
    fn test_time_range_filter() {
        let sink = InMemorySink::new();
        let t = Utc::now();
        for i in 0..10 {
            sink.insert_reading(&reading(t + Duration::seconds(i))).unwrap();
        }
        let q = HistoryQuery {
            from: Some(t + Duration::seconds(3)),
            to: Some(t + Duration::seconds(6)),
            ..HistoryQuery::default()
        };
        assert_eq!(sink.list_readings(&q).unwrap().len(), 4);
    }

    #[test]
    fn test_resolve_and_filter_events() {
        let sink = InMemorySink::new();
        let open = sink.insert_event(&event(false)).unwrap();
        sink.insert_event(&event(true)).unwrap();

        let unresolved = HistoryQuery {
            resolved: Some(false),
            ..HistoryQuery::default()
        };
        assert_eq!(sink.list_events(&unresolved).unwrap().len(), 1);

        let resolved = sink.resolve_event(open, Utc::now()).unwrap();
        assert!(resolved.resolved);
        assert_eq!(resolved.id, open);
        assert!(sink.list_events(&unresolved).unwrap().is_empty());

        // Second resolve keeps the original timestamp
        let again = sink.resolve_event(open, Utc::now() + Duration::hours(1)).unwrap();
        assert_eq!(again.resolved_at, resolved.resolved_at);

        assert!(matches!(sink.resolve_event(999, Utc::now()), Err(PersistenceError::NotFound)));
    }

    #[test]
    fn test_id_base() {
        let sink = InMemorySink::with_id_base(1 << 40, 10, 10);
        assert_eq!(sink.insert_reading(&reading(Utc::now())).unwrap(), 1 << 40);
    }
}
