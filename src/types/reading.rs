//! Raw sensor readings

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::channels::{channel_array, Channel, NUM_CHANNELS};

/// Identifier assigned by a persistence sink to a stored record.
pub type RecordId = u64;

/// One timestamped sample of all ten pump channels.
///
/// Values are kept in engineering units; normalization happens only when a
/// sequence window is snapshotted for inference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorReading {
    /// Logical pump source this sample belongs to
    pub source: String,
    pub timestamp: DateTime<Utc>,
    #[serde(with = "channel_array")]
    pub values: [f64; NUM_CHANNELS],
    /// Operator label carried through verbatim (NORMAL / BROKEN / RECOVERING)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub machine_status: Option<String>,
}

impl SensorReading {
    pub fn new(source: impl Into<String>, timestamp: DateTime<Utc>, values: [f64; NUM_CHANNELS]) -> Self {
        Self {
            source: source.into(),
            timestamp,
            values,
            machine_status: None,
        }
    }

    pub fn value(&self, channel: Channel) -> f64 {
        self.values[channel.index()]
    }
}

/// A reading as stored by a persistence sink.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredReading {
    pub id: RecordId,
    pub reading: SensorReading,
}
