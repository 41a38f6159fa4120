//! Inference results

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::channels::{channel_array, Channel, NUM_CHANNELS};
use super::reading::RecordId;
use super::status::SensorState;

/// Outcome of evaluating one complete sequence window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InferenceResult {
    pub source: String,
    /// Timestamp of the reading that completed the window
    pub timestamp: DateTime<Utc>,
    /// Back-reference to the stored reading that completed the window
    /// (`None` when that reading could not be persisted)
    pub reading_id: Option<RecordId>,
    /// Mean absolute reconstruction error per channel (normalized space)
    #[serde(with = "channel_array")]
    pub channel_deltas: [f64; NUM_CHANNELS],
    pub reconstruction_error: f64,
    pub threshold: f64,
    pub is_anomaly: bool,
    #[serde(with = "channel_array")]
    pub sensor_states: [SensorState; NUM_CHANNELS],
    pub latency_ms: f64,
    /// Name of the model that produced the result
    pub model: String,
}

impl InferenceResult {
    pub fn state(&self, channel: Channel) -> SensorState {
        self.sensor_states[channel.index()]
    }

    pub fn delta(&self, channel: Channel) -> f64 {
        self.channel_deltas[channel.index()]
    }

    /// Worst per-sensor state in this result.
    pub fn worst_state(&self) -> SensorState {
        self.sensor_states
            .iter()
            .copied()
            .max()
            .unwrap_or_default()
    }
}

/// An inference result as stored by a persistence sink.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredInference {
    pub id: RecordId,
    pub result: InferenceResult,
}
