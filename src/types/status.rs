//! System and per-sensor status labels

use serde::{Deserialize, Serialize};

/// Overall status of one pump source as seen by the stream processor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SystemStatus {
    /// No reading processed yet
    #[default]
    Initializing,
    /// Sequence window still filling
    Learning,
    /// Window full, no anomaly
    Normal,
    /// Window full, anomaly detected
    Anomaly,
    /// Window full, at least one sensor critical
    Critical,
    /// Finite replay exhausted
    Completed,
}

impl SystemStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SystemStatus::Initializing => "INITIALIZING",
            SystemStatus::Learning => "LEARNING",
            SystemStatus::Normal => "NORMAL",
            SystemStatus::Anomaly => "ANOMALY",
            SystemStatus::Critical => "CRITICAL",
            SystemStatus::Completed => "COMPLETED",
        }
    }
}

impl std::fmt::Display for SystemStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-sensor condition, ordered by escalation.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SensorState {
    #[default]
    Normal,
    Anomaly,
    Critical,
}

impl SensorState {
    /// True for ANOMALY and CRITICAL.
    pub fn is_abnormal(&self) -> bool {
        !matches!(self, SensorState::Normal)
    }
}

impl std::fmt::Display for SensorState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SensorState::Normal => write!(f, "NORMAL"),
            SensorState::Anomaly => write!(f, "ANOMALY"),
            SensorState::Critical => write!(f, "CRITICAL"),
        }
    }
}
