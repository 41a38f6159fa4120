//! Session anomaly counters

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::channels::{channel_array, Channel, NUM_CHANNELS};
use super::status::SensorState;

/// Per-sensor anomaly counts plus session totals.
///
/// Owned and mutated only by the stream processor; everyone else sees
/// copies inside published snapshots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnomalyCounters {
    /// Samples on which each sensor was ANOMALY or CRITICAL
    #[serde(with = "channel_array")]
    pub per_sensor: [u64; NUM_CHANNELS],
    /// Windows flagged `is_anomaly`
    pub total_anomalies: u64,
    /// Windows flagged `is_anomaly` in the last hour
    pub recent_anomalies: u64,
    pub total_processed: u64,
    /// Submissions rejected by the ingestion queue
    pub total_rejected: u64,
    pub inference_failures: u64,
    pub persistence_failures: u64,
    /// Start of the current counting session
    pub since: DateTime<Utc>,
}

impl AnomalyCounters {
    pub fn new(since: DateTime<Utc>) -> Self {
        Self {
            per_sensor: [0; NUM_CHANNELS],
            total_anomalies: 0,
            recent_anomalies: 0,
            total_processed: 0,
            total_rejected: 0,
            inference_failures: 0,
            persistence_failures: 0,
            since,
        }
    }

    pub fn count(&self, channel: Channel) -> u64 {
        self.per_sensor[channel.index()]
    }

    /// Increment every sensor currently ANOMALY or CRITICAL.
    pub fn record_states(&mut self, states: &[SensorState; NUM_CHANNELS]) {
        for (count, state) in self.per_sensor.iter_mut().zip(states.iter()) {
            if state.is_abnormal() {
                *count += 1;
            }
        }
    }

    /// Zero everything and start a new session.
    pub fn reset(&mut self, since: DateTime<Utc>) {
        *self = Self::new(since);
    }

    /// Sum of per-sensor counts.
    pub fn sensor_total(&self) -> u64 {
        self.per_sensor.iter().sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_states_counts_abnormal_only() {
        let mut c = AnomalyCounters::new(Utc::now());
        let mut states = [SensorState::Normal; NUM_CHANNELS];
        states[Channel::BearingTemperature.index()] = SensorState::Critical;
        states[Channel::Vibration.index()] = SensorState::Anomaly;

        c.record_states(&states);
        c.record_states(&states);

        assert_eq!(c.count(Channel::BearingTemperature), 2);
        assert_eq!(c.count(Channel::Vibration), 2);
        assert_eq!(c.count(Channel::MotorRpm), 0);
        assert_eq!(c.sensor_total(), 4);
    }

    #[test]
    fn test_reset_zeroes_everything() {
        let mut c = AnomalyCounters::new(Utc::now());
        c.per_sensor = [7; NUM_CHANNELS];
        c.total_anomalies = 3;
        c.total_processed = 99;
        c.reset(Utc::now());
        assert_eq!(c.sensor_total(), 0);
        assert_eq!(c.total_anomalies, 0);
        assert_eq!(c.total_processed, 0);
    }
}
