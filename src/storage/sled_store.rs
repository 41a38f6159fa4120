//! Sled-backed persistence
//!
//! One tree per record kind. Keys are big-endian ids from
//! `Db::generate_id`, so key order is insertion order and reverse iteration
//! yields newest first. Values are JSON.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;

use super::persistence::{HistoryQuery, PersistenceError, PersistenceSink, SinkStats};
use crate::types::{
    InferenceResult, MaintenanceEvent, RecordId, SensorReading, StoredInference, StoredReading,
};

const READINGS_TREE: &str = "readings";
const INFERENCES_TREE: &str = "inferences";
const EVENTS_TREE: &str = "events";

impl From<sled::Error> for PersistenceError {
    fn from(err: sled::Error) -> Self {
        PersistenceError::Storage(err.to_string())
    }
}

#[derive(Clone)]
pub struct SledSink {
    db: Arc<sled::Db>,
    readings: sled::Tree,
    inferences: sled::Tree,
    events: sled::Tree,
}

impl SledSink {
    /// Open or create the database at `path`
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, PersistenceError> {
        let path = path.as_ref();
        let db = sled::open(path)?;
        let sink = Self {
            readings: db.open_tree(READINGS_TREE)?,
            inferences: db.open_tree(INFERENCES_TREE)?,
            events: db.open_tree(EVENTS_TREE)?,
            db: Arc::new(db),
        };
        tracing::info!(
            path = %path.display(),
            readings = sink.readings.len(),
            events = sink.events.len(),
            "Pump history storage opened"
        );
        Ok(sink)
    }

    /// Ids start at 1; 0 marks an unpersisted record.
    fn next_id(&self) -> Result<RecordId, PersistenceError> {
        Ok(self.db.generate_id()? + 1)
    }

    fn insert<T: Serialize>(&self, tree: &sled::Tree, id: RecordId, value: &T) -> Result<(), PersistenceError> {
        let bytes = serde_json::to_vec(value)?;
        tree.insert(id.to_be_bytes(), bytes)?;
        Ok(())
    }

    /// Newest-first scan applying `keep`, stopping at `limit` matches.
    fn scan<T, F>(&self, tree: &sled::Tree, limit: usize, keep: F) -> Result<Vec<T>, PersistenceError>
    where
        T: DeserializeOwned,
        F: Fn(&T) -> bool,
    {
        let mut out = Vec::new();
        for item in tree.iter().rev() {
            if out.len() >= limit {
                break;
            }
            let (_key, value) = item?;
            match serde_json::from_slice::<T>(&value) {
                Ok(record) if keep(&record) => out.push(record),
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!(error = %e, "Skipping undecodable stored record");
                }
            }
        }
        Ok(out)
    }

    pub fn flush(&self) -> Result<(), PersistenceError> {
        self.db.flush()?;
        Ok(())
    }
}

impl PersistenceSink for SledSink {
    fn insert_reading(&self, reading: &SensorReading) -> Result<RecordId, PersistenceError> {
        let id = self.next_id()?;
        self.insert(&self.readings, id, &StoredReading { id, reading: reading.clone() })?;
        Ok(id)
    }

    fn insert_inference(&self, result: &InferenceResult) -> Result<RecordId, PersistenceError> {
        let id = self.next_id()?;
        self.insert(&self.inferences, id, &StoredInference { id, result: result.clone() })?;
        Ok(id)
    }

    fn insert_event(&self, event: &MaintenanceEvent) -> Result<RecordId, PersistenceError> {
        let id = self.next_id()?;
        let mut stored = event.clone();
        stored.id = id;
        self.insert(&self.events, id, &stored)?;
        // Durable before the processor reports the event
        self.events.flush()?;
        Ok(id)
    }

    fn resolve_event(
        &self,
        id: RecordId,
        at: DateTime<Utc>,
    ) -> Result<MaintenanceEvent, PersistenceError> {
        let key = id.to_be_bytes();
        let bytes = self.events.get(key)?.ok_or(PersistenceError::NotFound)?;
        let mut event: MaintenanceEvent = serde_json::from_slice(&bytes)?;
        if event.resolve(at) {
            self.insert(&self.events, id, &event)?;
            self.events.flush()?;
        }
        Ok(event)
    }

    fn get_event(&self, id: RecordId) -> Result<Option<MaintenanceEvent>, PersistenceError> {
        match self.events.get(id.to_be_bytes())? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    fn list_readings(&self, query: &HistoryQuery) -> Result<Vec<StoredReading>, PersistenceError> {
        self.scan(&self.readings, query.effective_limit(), |r: &StoredReading| {
            query.matches(&r.reading.source, r.reading.timestamp)
        })
    }

    fn list_inferences(
        &self,
        query: &HistoryQuery,
    ) -> Result<Vec<StoredInference>, PersistenceError> {
        self.scan(&self.inferences, query.effective_limit(), |r: &StoredInference| {
            query.matches(&r.result.source, r.result.timestamp)
        })
    }

    fn list_events(&self, query: &HistoryQuery) -> Result<Vec<MaintenanceEvent>, PersistenceError> {
        self.scan(&self.events, query.effective_limit(), |e: &MaintenanceEvent| {
            query.matches_event(e)
        })
    }

    fn stats(&self) -> Result<SinkStats, PersistenceError> {
        Ok(SinkStats {
            readings: self.readings.len(),
            inferences: self.inferences.len(),
            events: self.events.len(),
        })
    }

    fn backend_name(&self) -> &'static str {
        "Sled"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Channel, SensorState, Severity, NUM_CHANNELS};
    use chrono::Duration;

    fn open_temp() -> (tempfile::TempDir, SledSink) {
        let dir = tempfile::tempdir().unwrap();
        let sink = SledSink::open(dir.path().join("db")).unwrap();
        (dir, sink)
    }

    fn event() -> MaintenanceEvent {
        MaintenanceEvent {
            id: 0,
            source: "pump-01".into(),
            event_type: "ANOMALY_DETECTED".into(),
            severity: Severity::Critical,
            sensor: Channel::BearingTemperature,
            description: "bearing overheat".into(),
            estimated_cost: 67_500.0,
            trigger_value: 86.2,
            trigger_version: 1,
            resolved: false,
            created_at: Utc::now(),
            resolved_at: None,
        }
    }

    #[test]
    fn test_reading_roundtrip_newest_first() {
        let (_dir, sink) = open_temp();
        let t = Utc::now();
        let mut ids = Vec::new();
        for i in 0..5 {
            let mut values = [0.0; NUM_CHANNELS];
            values[Channel::BearingTemperature.index()] = 40.0 + i as f64;
            ids.push(sink.insert_reading(&SensorReading::new("pump-01", t + Duration::seconds(i), values)).unwrap());
        }
        assert!(ids.iter().all(|id| *id > 0));
        let rows = sink.list_readings(&HistoryQuery::latest(3)).unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].id, ids[4]);
        assert_eq!(rows[0].reading.value(Channel::BearingTemperature), 44.0);
    }

    #[test]
    fn test_inference_keeps_back_reference() {
        let (_dir, sink) = open_temp();
        let reading_id = sink.insert_reading(&SensorReading::new("pump-01", Utc::now(), [1.0; NUM_CHANNELS])).unwrap();
        let result = InferenceResult {
            source: "pump-01".into(),
            timestamp: Utc::now(),
            reading_id: Some(reading_id),
            channel_deltas: [0.01; NUM_CHANNELS],
            reconstruction_error: 0.01,
            threshold: 0.05,
            is_anomaly: false,
            sensor_states: [SensorState::Normal; NUM_CHANNELS],
            latency_ms: 0.2,
            model: "profile-reconstructor".into(),
        };
        sink.insert_inference(&result).unwrap();
        let rows = sink.list_inferences(&HistoryQuery::default()).unwrap();
        assert_eq!(rows[0].result.reading_id, Some(reading_id));
    }

    #[test]
    fn test_event_resolve_persists() {
        let dir = tempfile::tempdir().unwrap();
        let id = {
            let sink = SledSink::open(dir.path().join("db")).unwrap();
            let id = sink.insert_event(&event()).unwrap();
            let resolved = sink.resolve_event(id, Utc::now()).unwrap();
            assert!(resolved.resolved);
            sink.flush().unwrap();
            id
        };
        let sink = SledSink::open(dir.path().join("db")).unwrap();
        let stored = sink.get_event(id).unwrap().unwrap();
        assert!(stored.resolved);
        assert_eq!(stored.id, id);
        assert!(matches!(sink.resolve_event(id + 100, Utc::now()), Err(PersistenceError::NotFound)));
    }

    #[test]
    fn test_event_resolved_filter() {
        let (_dir, sink) = open_temp();
        let a = sink.insert_event(&event()).unwrap();
        sink.insert_event(&event()).unwrap();
        sink.resolve_event(a, Utc::now()).unwrap();
        let open = sink
            .list_events(&HistoryQuery { resolved: Some(false), ..HistoryQuery::default() })
            .unwrap();
        assert_eq!(open.len(), 1);
        assert_ne!(open[0].id, a);
        assert_eq!(sink.stats().unwrap().events, 2);
    }
}
