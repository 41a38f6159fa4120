//! Maintenance events and the vocabulary of trigger rules

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::channels::Channel;
use super::reading::RecordId;

/// Maintenance urgency, ordered LOW < MEDIUM < HIGH < CRITICAL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Low => write!(f, "LOW"),
            Severity::Medium => write!(f, "MEDIUM"),
            Severity::High => write!(f, "HIGH"),
            Severity::Critical => write!(f, "CRITICAL"),
        }
    }
}

/// Comparison operator used by a trigger rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Comparison {
    #[serde(rename = ">", alias = "gt")]
    Above,
    #[serde(rename = ">=", alias = "ge")]
    AtOrAbove,
    #[serde(rename = "<", alias = "lt")]
    Below,
    #[serde(rename = "<=", alias = "le")]
    AtOrBelow,
}

impl Comparison {
    pub fn holds(self, value: f64, threshold: f64) -> bool {
        match self {
            Comparison::Above => value > threshold,
            Comparison::AtOrAbove => value >= threshold,
            Comparison::Below => value < threshold,
            Comparison::AtOrBelow => value <= threshold,
        }
    }

    /// How far past the threshold `value` is, as a ratio (>= 1.0 once the
    /// rule holds). Used to escalate severity on gross exceedances.
    pub fn exceedance_ratio(self, value: f64, threshold: f64) -> f64 {
        match self {
            Comparison::Above | Comparison::AtOrAbove => {
                if threshold.abs() < f64::EPSILON {
                    f64::INFINITY
                } else {
                    value / threshold
                }
            }
            Comparison::Below | Comparison::AtOrBelow => {
                if value.abs() < f64::EPSILON {
                    f64::INFINITY
                } else {
                    threshold / value
                }
            }
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            Comparison::Above => ">",
            Comparison::AtOrAbove => ">=",
            Comparison::Below => "<",
            Comparison::AtOrBelow => "<=",
        }
    }
}

/// A maintenance work order raised by the stream processor.
///
/// Never deleted; the only mutation after creation is resolution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaintenanceEvent {
    /// Assigned by the persistence sink; `0` until stored
    pub id: RecordId,
    pub source: String,
    pub event_type: String,
    pub severity: Severity,
    pub sensor: Channel,
    pub description: String,
    pub estimated_cost: f64,
    /// Raw value that fired the trigger
    pub trigger_value: f64,
    /// Version of the trigger table that produced the event
    pub trigger_version: u32,
    pub resolved: bool,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_at: Option<DateTime<Utc>>,
}

impl MaintenanceEvent {
    pub fn is_persisted(&self) -> bool {
        self.id != 0
    }

    /// Mark resolved. Returns false if it already was.
    pub fn resolve(&mut self, at: DateTime<Utc>) -> bool {
        if self.resolved {
            return false;
        }
        self.resolved = true;
        self.resolved_at = Some(at);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_comparison_holds() {
        assert!(Comparison::Above.holds(85.1, 85.0));
        assert!(!Comparison::Above.holds(85.0, 85.0));
        assert!(Comparison::AtOrAbove.holds(85.0, 85.0));
        assert!(Comparison::Below.holds(0.9, 1.0));
        assert!(!Comparison::Below.holds(1.0, 1.0));
        assert!(Comparison::AtOrBelow.holds(1.0, 1.0));
    }

    #[test]
    fn test_comparison_serde_symbols() {
        let op: Comparison = serde_json::from_str("\">\"").unwrap();
        assert_eq!(op, Comparison::Above);
        let op: Comparison = serde_json::from_str("\"lt\"").unwrap();
        assert_eq!(op, Comparison::Below);
        assert_eq!(serde_json::to_string(&Comparison::AtOrBelow).unwrap(), "\"<=\"");
    }

    #[test]
    fn test_exceedance_ratio() {
        assert!((Comparison::Above.exceedance_ratio(9.6, 8.0) - 1.2).abs() < 1e-9);
        assert!((Comparison::Below.exceedance_ratio(0.5, 1.0) - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::Critical > Severity::High);
        assert!(Severity::Medium > Severity::Low);
        assert_eq!(Severity::High.to_string(), "HIGH");
    }

    #[test]
    fn test_resolve_once() {
        let mut ev = MaintenanceEvent {
            id: 3,
            source: "pump-01".into(),
            event_type: "BEARING_OVERHEAT".into(),
            severity: Severity::Critical,
            sensor: Channel::BearingTemperature,
            description: String::new(),
            estimated_cost: 67_500.0,
            trigger_value: 86.0,
            trigger_version: 1,
            resolved: false,
            created_at: Utc::now(),
            resolved_at: None,
        };
        assert!(ev.resolve(Utc::now()));
        assert!(ev.resolved_at.is_some());
        assert!(!ev.resolve(Utc::now()));
    }
}
