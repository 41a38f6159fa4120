//! Stream Processor
//!
//! Per-item work of the single consumer:
//!
//! ```text
//! 1. persist raw reading (best effort)
//! 2. append to the source's sequence window
//! 3. window not full      -> LEARNING, stop
//! 4. infer on the normalized snapshot, measure latency
//! 5. is_anomaly = reconstruction_error > threshold
//! 6. per-sensor NORMAL / ANOMALY / CRITICAL
//! 7. update anomaly counters
//! 8. evaluate maintenance triggers (one open event per condition)
//! 9. persist inference result and new events
//! 10. publish the live snapshot
//! ```
//!
//! Everything here is synchronous and owned by one task; the async shell
//! lives in `processing_loop`.

use chrono::{DateTime, Duration, Utc};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

use super::attribution::SensorAttributor;
use super::control::{ControlCommand, ControlError};
use super::live::{LiveSnapshot, LiveState, SourceSnapshot};
use super::queue::QueueStats;
use super::sequence_buffer::SequenceBuffer;
use super::triggers::TriggerTable;
use crate::config::defaults::{HISTORY_MAX_LIMIT, RECENT_ANOMALY_WINDOW_SECS};
use crate::config::PumpConfig;
use crate::ml_engine::{InferenceModel, LoadedModel, MinMaxNormalizer};
use crate::storage::{HistoryQuery, PersistenceError, PersistenceSink};
use crate::types::{
    AnomalyCounters, InferenceResult, MaintenanceEvent, RecordId, SensorReading, SensorState,
    SystemStatus,
};

/// What happened to one dequeued reading.
#[derive(Debug, Clone, PartialEq)]
pub enum ItemOutcome {
    /// Window still filling; no inference attempted
    Learning { buffered: usize },
    Evaluated {
        is_anomaly: bool,
        status: SystemStatus,
        new_events: Vec<MaintenanceEvent>,
    },
    /// Inference failed; the window was discarded for this item
    InferenceFailed,
}

/// Per-source consumer state.
#[derive(Debug)]
struct SourceState {
    buffer: SequenceBuffer,
    status: SystemStatus,
    latest_reading: Option<SensorReading>,
    latest_result: Option<InferenceResult>,
    updated_at: DateTime<Utc>,
}

impl SourceState {
    fn new(window_size: usize, at: DateTime<Utc>) -> Self {
        Self {
            buffer: SequenceBuffer::new(window_size),
            status: SystemStatus::Initializing,
            latest_reading: None,
            latest_result: None,
            updated_at: at,
        }
    }
}

pub struct StreamProcessor {
    model: Arc<dyn InferenceModel>,
    normalizer: MinMaxNormalizer,
    threshold: f64,
    window_size: usize,
    attributor: SensorAttributor,
    triggers: TriggerTable,
    sink: Arc<dyn PersistenceSink>,
    live: Arc<LiveState>,
    queue_stats: Arc<QueueStats>,
    /// Queue rejections at the last counter reset
    rejected_baseline: u64,
    sources: HashMap<String, SourceState>,
    counters: AnomalyCounters,
    /// Processing times of anomalous windows inside the recent window
    recent: VecDeque<DateTime<Utc>>,
    last_latency_ms: Option<f64>,
    last_source: Option<String>,
    sequence: u64,
}

impl StreamProcessor {
    pub fn new(
        config: &PumpConfig,
        model: &LoadedModel,
        sink: Arc<dyn PersistenceSink>,
        live: Arc<LiveState>,
        queue_stats: Arc<QueueStats>,
    ) -> Self {
        let now = Utc::now();
        Self {
            model: Arc::clone(&model.model),
            normalizer: model.normalizer.clone(),
            threshold: model.threshold,
            window_size: config.pipeline.window_size,
            attributor: SensorAttributor::from_config(config, model.threshold),
            triggers: TriggerTable::new(&config.maintenance),
            sink,
            live,
            rejected_baseline: queue_stats.rejected(),
            queue_stats,
            sources: HashMap::new(),
            counters: AnomalyCounters::new(now),
            recent: VecDeque::new(),
            last_latency_ms: None,
            last_source: None,
            sequence: 0,
        }
    }

    /// Load unresolved events from the sink so a restart does not raise
    /// duplicates for conditions that are still open.
    pub fn seed_open_events(&mut self) -> usize {
        let query = HistoryQuery {
            resolved: Some(false),
            limit: HISTORY_MAX_LIMIT,
            ..HistoryQuery::default()
        };
        match self.sink.list_events(&query) {
            Ok(events) => {
                let count = events.len();
                for event in events {
                    self.triggers.mark_open(event);
                }
                if count > 0 {
                    info!(count, "Restored open maintenance events");
                }
                count
            }
            Err(e) => {
                warn!(error = %e, "Could not load open maintenance events");
                0
            }
        }
    }

    pub fn counters(&self) -> &AnomalyCounters {
        &self.counters
    }

    pub fn status(&self, source: &str) -> SystemStatus {
        self.sources
            .get(source)
            .map(|s| s.status)
            .unwrap_or_default()
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn open_event_count(&self) -> usize {
        self.triggers.open_count()
    }

    pub fn process(&mut self, reading: SensorReading) -> ItemOutcome {
        self.process_at(reading, Utc::now())
    }

    /// Run one reading through the pipeline with an explicit wall clock.
    pub fn process_at(&mut self, reading: SensorReading, now: DateTime<Utc>) -> ItemOutcome {
        self.counters.total_processed += 1;

        // 1. Raw reading
        let reading_id = match self.sink.insert_reading(&reading) {
            Ok(id) => Some(id),
            Err(e) => {
                self.record_persistence_failure("reading", &e);
                None
            }
        };

        // 2-3. Sequence window
        let window_size = self.window_size;
        let state = self
            .sources
            .entry(reading.source.clone())
            .or_insert_with(|| SourceState::new(window_size, now));
        state.buffer.append(reading.values);
        state.updated_at = now;

        if !state.buffer.is_ready() {
            state.status = SystemStatus::Learning;
            let buffered = state.buffer.len();
            state.latest_reading = Some(reading.clone());
            self.last_source = Some(reading.source);
            self.publish(now);
            return ItemOutcome::Learning { buffered };
        }

        // 4. Inference
        let window = state.buffer.snapshot(&self.normalizer);
        let started = Instant::now();
        let output = match self.model.infer(&window) {
            Ok(output) => output,
            Err(e) => {
                error!(source = %reading.source, error = %e, "Inference failed, discarding window");
                self.counters.inference_failures += 1;
                state.latest_reading = Some(reading.clone());
                state.latest_result = None;
                self.last_source = Some(reading.source);
                self.publish(now);
                return ItemOutcome::InferenceFailed;
            }
        };
        let latency_ms = started.elapsed().as_secs_f64() * 1000.0;

        // 5-6. Decision and attribution
        let is_anomaly = output.reconstruction_error > self.threshold;
        let sensor_states = self
            .attributor
            .classify(&output.channel_deltas, &reading.values);

        let result = InferenceResult {
            source: reading.source.clone(),
            timestamp: reading.timestamp,
            reading_id,
            channel_deltas: output.channel_deltas,
            reconstruction_error: output.reconstruction_error,
            threshold: self.threshold,
            is_anomaly,
            sensor_states,
            latency_ms,
            model: self.model.name().to_string(),
        };

        let status = if !is_anomaly {
            SystemStatus::Normal
        } else if result.worst_state() == SensorState::Critical {
            SystemStatus::Critical
        } else {
            SystemStatus::Anomaly
        };
        if status != state.status && state.status != SystemStatus::Learning {
            info!(source = %reading.source, from = %state.status, to = %status, "Status changed");
        }
        state.status = status;

        // 7. Counters
        self.counters.record_states(&sensor_states);
        if is_anomaly {
            self.counters.total_anomalies += 1;
            self.recent.push_back(now);
            debug!(
                source = %reading.source,
                error = result.reconstruction_error,
                threshold = self.threshold,
                "Anomalous window"
            );
        }
        self.prune_recent(now);

        // 8. Maintenance triggers
        let mut new_events = self
            .triggers
            .evaluate(&reading.source, &reading.values, &sensor_states, now);

        // 9. Persist result and events
        for event in new_events.iter_mut() {
            match self.sink.insert_event(event) {
                Ok(id) => event.id = id,
                Err(e) => {
                    // Left unregistered so the next sample raises it again
                    self.record_persistence_failure("maintenance event", &e);
                    continue;
                }
            }
            warn!(
                id = event.id,
                source = %event.source,
                sensor = %event.sensor,
                severity = %event.severity,
                cost = event.estimated_cost,
                "🔧 Maintenance event raised: {}",
                event.description
            );
            self.triggers.mark_open(event.clone());
        }
        new_events.retain(MaintenanceEvent::is_persisted);
        if let Err(e) = self.sink.insert_inference(&result) {
            self.record_persistence_failure("inference result", &e);
        }

        // 10. Publish
        if let Some(state) = self.sources.get_mut(&reading.source) {
            state.latest_result = Some(result);
            state.latest_reading = Some(reading.clone());
        }
        self.last_latency_ms = Some(latency_ms);
        self.last_source = Some(reading.source);
        self.publish(now);

        ItemOutcome::Evaluated {
            is_anomaly,
            status,
            new_events,
        }
    }

    /// A finite replay for `source` has been fully consumed.
    pub fn finish_replay(&mut self, source: &str) {
        self.finish_replay_at(source, Utc::now());
    }

    pub fn finish_replay_at(&mut self, source: &str, now: DateTime<Utc>) {
        let window_size = self.window_size;
        let state = self
            .sources
            .entry(source.to_string())
            .or_insert_with(|| SourceState::new(window_size, now));
        state.status = SystemStatus::Completed;
        state.updated_at = now;
        info!(source, "🏁 Replay completed");
        self.last_source = Some(source.to_string());
        self.publish(now);
    }

    pub fn handle_command(&mut self, command: ControlCommand) {
        let now = Utc::now();
        match command {
            ControlCommand::ResetCounters { reply } => {
                let counters = self.reset_counters_at(now);
                let _ = reply.send(counters);
            }
            ControlCommand::ResolveEvent { id, reply } => {
                let result = self.resolve_event_at(id, now);
                let _ = reply.send(result);
            }
            ControlCommand::ResetSource { source } => self.reset_source_at(&source, now),
        }
    }

    /// Start `source` over for a new dataset: empty window, LEARNING, and a
    /// fresh counting session. Open maintenance events are kept.
    pub fn reset_source_at(&mut self, source: &str, now: DateTime<Utc>) {
        let window_size = self.window_size;
        let state = self
            .sources
            .entry(source.to_string())
            .or_insert_with(|| SourceState::new(window_size, now));
        state.buffer.clear();
        state.status = SystemStatus::Learning;
        state.latest_reading = None;
        state.latest_result = None;
        state.updated_at = now;
        self.last_latency_ms = None;
        info!(source, "🔄 Source state reset for new dataset");
        self.reset_counters_at(now);
    }

    /// Zero all counters and start a new counting session.
    pub fn reset_counters_at(&mut self, now: DateTime<Utc>) -> AnomalyCounters {
        self.counters.reset(now);
        self.recent.clear();
        self.rejected_baseline = self.queue_stats.rejected();
        info!("🔄 Anomaly counters reset");
        self.publish(now);
        self.counters.clone()
    }

    /// Resolve an event so its condition may trigger a fresh one.
    pub fn resolve_event_at(
        &mut self,
        id: RecordId,
        now: DateTime<Utc>,
    ) -> Result<MaintenanceEvent, ControlError> {
        let outcome = match self.sink.resolve_event(id, now) {
            Ok(event) => {
                self.triggers.close(id);
                Ok(event)
            }
            Err(PersistenceError::NotFound) => match self.triggers.close(id) {
                Some(mut event) => {
                    event.resolve(now);
                    Ok(event)
                }
                None => Err(ControlError::NotFound(id)),
            },
            Err(e) => match self.triggers.close(id) {
                Some(mut event) => {
                    self.record_persistence_failure("event resolution", &e);
                    event.resolve(now);
                    Ok(event)
                }
                None => Err(ControlError::Storage(e.to_string())),
            },
        };
        if let Ok(event) = &outcome {
            info!(id, sensor = %event.sensor, "✅ Maintenance event resolved");
            self.publish(now);
        }
        outcome
    }

    fn record_persistence_failure(&mut self, what: &str, e: &PersistenceError) {
        self.counters.persistence_failures += 1;
        warn!(error = %e, "Failed to persist {}", what);
    }

    fn prune_recent(&mut self, now: DateTime<Utc>) {
        let cutoff = now - Duration::seconds(RECENT_ANOMALY_WINDOW_SECS);
        while self.recent.front().is_some_and(|t| *t < cutoff) {
            self.recent.pop_front();
        }
        self.counters.recent_anomalies = self.recent.len() as u64;
    }

    fn publish(&mut self, now: DateTime<Utc>) {
        self.prune_recent(now);
        self.counters.total_rejected = self
            .queue_stats
            .rejected()
            .saturating_sub(self.rejected_baseline);
        self.sequence += 1;

        let sources = self
            .sources
            .iter()
            .map(|(name, state)| {
                let snapshot = SourceSnapshot {
                    source: name.clone(),
                    status: state.status,
                    buffered: state.buffer.len(),
                    window_size: state.buffer.capacity(),
                    latest_reading: state.latest_reading.clone(),
                    latest_result: state.latest_result.clone(),
                    open_events: self.triggers.open_for(name),
                    updated_at: state.updated_at,
                };
                (name.clone(), snapshot)
            })
            .collect();

        self.live.publish(LiveSnapshot {
            sequence: self.sequence,
            published_at: now,
            sources,
            counters: self.counters.clone(),
            last_latency_ms: self.last_latency_ms,
            last_source: self.last_source.clone(),
        });
    }
}
