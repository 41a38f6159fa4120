//! Maintenance trigger evaluation
//!
//! A versioned table of `{sensor, comparison, threshold, severity, base cost}`
//! rules. A rule fires only while its sensor is ANOMALY or CRITICAL, and at
//! most one event exists per `(source, sensor, event_type)` until resolved.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tracing::debug;

use crate::config::{MaintenanceConfig, SeverityMultipliers, TriggerRule};
use crate::types::{Channel, MaintenanceEvent, RecordId, SensorState, Severity, NUM_CHANNELS};

type OpenKey = (String, Channel, String);

#[derive(Debug, Clone)]
pub struct TriggerTable {
    version: u32,
    rules: Vec<TriggerRule>,
    multipliers: SeverityMultipliers,
    /// Unresolved events by condition key
    open: HashMap<OpenKey, MaintenanceEvent>,
}

impl TriggerTable {
    pub fn new(config: &MaintenanceConfig) -> Self {
        Self {
            version: config.version,
            rules: config.triggers.clone(),
            multipliers: config.severity_multipliers.clone(),
            open: HashMap::new(),
        }
    }

    /// Rules that fire for this sample and have no open event yet.
    ///
    /// Returned events are unpersisted (`id == 0`); the caller stores them
    /// and then registers each with [`TriggerTable::mark_open`].
    pub fn evaluate(
        &self,
        source: &str,
        raw: &[f64; NUM_CHANNELS],
        states: &[SensorState; NUM_CHANNELS],
        now: DateTime<Utc>,
    ) -> Vec<MaintenanceEvent> {
        let mut fired: Vec<MaintenanceEvent> = Vec::new();
        for rule in &self.rules {
            let i = rule.sensor.index();
            if !states[i].is_abnormal() || !rule.op.holds(raw[i], rule.threshold) {
                continue;
            }
            let key = (source.to_string(), rule.sensor, rule.event_type.clone());
            if self.open.contains_key(&key) {
                debug!(source, sensor = %rule.sensor, "Trigger already has an open event");
                continue;
            }
            // Two rules on the same condition key fire once per sample.
            if fired
                .iter()
                .any(|e| e.sensor == rule.sensor && e.event_type == rule.event_type)
            {
                continue;
            }
            fired.push(self.build_event(rule, source, raw[i], states[i], now));
        }
        fired
    }

    fn build_event(
        &self,
        rule: &TriggerRule,
        source: &str,
        value: f64,
        state: SensorState,
        now: DateTime<Utc>,
    ) -> MaintenanceEvent {
        let severity = match rule.critical_ratio {
            Some(ratio) if rule.op.exceedance_ratio(value, rule.threshold) > ratio => Severity::Critical,
            _ => rule.severity,
        };
        let unit = rule.sensor.unit();
        MaintenanceEvent {
            id: 0,
            source: source.to_string(),
            event_type: rule.event_type.clone(),
            severity,
            sensor: rule.sensor,
            description: format!(
                "{} at {:.2} {} {} {} {} while {}",
                rule.sensor,
                value,
                unit,
                rule.op.symbol(),
                rule.threshold,
                unit,
                state
            ),
            estimated_cost: rule.base_cost * self.multipliers.get(severity),
            trigger_value: value,
            trigger_version: self.version,
            resolved: false,
            created_at: now,
            resolved_at: None,
        }
    }

    /// Register a stored event as the open instance of its condition.
    ///
    /// Unpersisted events (`id == 0`) are ignored: nothing could resolve
    /// them, so they would suppress the condition for good.
    pub fn mark_open(&mut self, event: MaintenanceEvent) {
        if event.resolved || !event.is_persisted() {
            return;
        }
        let key = (event.source.clone(), event.sensor, event.event_type.clone());
        self.open.insert(key, event);
    }

    /// Forget the open event with this id. Returns it if it was open.
    pub fn close(&mut self, id: RecordId) -> Option<MaintenanceEvent> {
        let key = self
            .open
            .iter()
            .find(|(_, e)| e.id == id && e.is_persisted())
            .map(|(k, _)| k.clone())?;
        self.open.remove(&key)
    }

    /// Open events for one source, oldest first.
    pub fn open_for(&self, source: &str) -> Vec<MaintenanceEvent> {
        let mut events: Vec<MaintenanceEvent> = self
            .open
            .values()
            .filter(|e| e.source == source)
            .cloned()
            .collect();
        events.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        events
    }

    pub fn open_count(&self) -> usize {
        self.open.len()
    }
}
