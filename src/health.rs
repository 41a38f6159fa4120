//! Risk bucket and process health
//!
//! Presentation-level derivations: a pure function of the anomaly counters
//! and the `[health]` cut-points, plus resident memory for the health
//! endpoint.

use serde::Serialize;

use crate::config::HealthConfig;
use crate::types::{channel_array, AnomalyCounters, Channel, NUM_CHANNELS};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskLevel {
    Healthy,
    Watch,
    Unstable,
    Critical,
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RiskLevel::Healthy => "HEALTHY",
            RiskLevel::Watch => "WATCH",
            RiskLevel::Unstable => "UNSTABLE",
            RiskLevel::Critical => "CRITICAL",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RiskAssessment {
    pub level: RiskLevel,
    /// Sensor with the highest anomaly count, if any has one
    pub worst_sensor: Option<Channel>,
    pub max_sensor_count: u64,
    #[serde(with = "channel_array")]
    pub per_sensor: [u64; NUM_CHANNELS],
    pub total_anomalies: u64,
    /// Remaining-useful-life estimate in hours
    pub rul_hours: f64,
}

/// Bucket the counters against the configured cut-points.
pub fn assess_risk(counters: &AnomalyCounters, config: &HealthConfig) -> RiskAssessment {
    let (worst_sensor, max_sensor_count) = Channel::ALL
        .into_iter()
        .map(|ch| (ch, counters.count(ch)))
        .filter(|(_, n)| *n > 0)
        .max_by(|a, b| a.1.cmp(&b.1).then(b.0.cmp(&a.0)))
        .map_or((None, 0), |(ch, n)| (Some(ch), n));

    let level = if max_sensor_count >= config.critical_at {
        RiskLevel::Critical
    } else if max_sensor_count >= config.unstable_at {
        RiskLevel::Unstable
    } else if max_sensor_count >= config.watch_at {
        RiskLevel::Watch
    } else {
        RiskLevel::Healthy
    };

    let rul_hours = (config.rul_base_hours - max_sensor_count as f64 * config.rul_hours_per_anomaly).max(0.0);

    RiskAssessment {
        level,
        worst_sensor,
        max_sensor_count,
        per_sensor: counters.per_sensor,
        total_anomalies: counters.total_anomalies,
        rul_hours,
    }
}

/// Resident set size of this process in MB (Linux only).
pub fn process_memory_mb() -> Option<f64> {
    let status = std::fs::read_to_string("/proc/self/status").ok()?;
    parse_vm_rss_kb(&status).map(|kb| kb as f64 / 1024.0)
}

fn parse_vm_rss_kb(status: &str) -> Option<u64> {
    status
        .lines()
        .find(|l| l.starts_with("VmRSS:"))?
        .split_whitespace()
        .nth(1)?
        .parse()
        .ok()
}
