//! Per-sensor state attribution
//!
//! Two policies run side by side and the worse verdict wins:
//! - contribution: each channel's reconstruction delta against escalating
//!   multiples of its share of the model threshold (`threshold / 10`)
//! - operating limits: the raw engineering value against fixed bounds

use crate::config::{AttributionConfig, OperatingLimit, PumpConfig};
use crate::types::{Channel, SensorState, NUM_CHANNELS};

#[derive(Debug, Clone)]
pub struct SensorAttributor {
    anomaly_bound: f64,
    critical_bound: f64,
    limits: [OperatingLimit; NUM_CHANNELS],
}

impl SensorAttributor {
    pub fn new(threshold: f64, attribution: &AttributionConfig, limits: [OperatingLimit; NUM_CHANNELS]) -> Self {
        let share = threshold / NUM_CHANNELS as f64;
        Self {
            anomaly_bound: share * attribution.anomaly_factor,
            critical_bound: share * attribution.critical_factor,
            limits,
        }
    }

    pub fn from_config(config: &PumpConfig, threshold: f64) -> Self {
        Self::new(threshold, &config.attribution, config.operating_limits())
    }

    /// Classify every channel from its delta and raw value.
    pub fn classify(
        &self,
        deltas: &[f64; NUM_CHANNELS],
        raw: &[f64; NUM_CHANNELS],
    ) -> [SensorState; NUM_CHANNELS] {
        let mut states = [SensorState::Normal; NUM_CHANNELS];
        for ch in Channel::ALL {
            let i = ch.index();
            states[i] = self
                .contribution_state(deltas[i])
                .max(limit_state(&self.limits[i], raw[i]));
        }
        states
    }

    fn contribution_state(&self, delta: f64) -> SensorState {
        if delta > self.critical_bound {
            SensorState::Critical
        } else if delta > self.anomaly_bound {
            SensorState::Anomaly
        } else {
            SensorState::Normal
        }
    }
}

fn limit_state(limit: &OperatingLimit, value: f64) -> SensorState {
    let critical = limit.critical_above.is_some_and(|b| value > b)
        || limit.critical_below.is_some_and(|b| value < b);
    if critical {
        return SensorState::Critical;
    }
    let anomalous = limit.anomaly_above.is_some_and(|b| value > b)
        || limit.anomaly_below.is_some_and(|b| value < b);
    if anomalous {
        SensorState::Anomaly
    } else {
        SensorState::Normal
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attributor() -> SensorAttributor {
        SensorAttributor::from_config(&PumpConfig::default(), 0.05)
    }

    fn normal_raw() -> [f64; NUM_CHANNELS] {
        let mut raw = [0.0; NUM_CHANNELS];
        for fit in PumpConfig::default().channel_fits() {
            raw[fit.sensor.index()] = fit.normal;
        }
        raw
    }

    #[test]
    fn test_all_normal() {
        let states = attributor().classify(&[0.0; NUM_CHANNELS], &normal_raw());
        assert!(states.iter().all(|s| *s == SensorState::Normal));
    }

    #[test]
    fn test_contribution_escalates() {
        let a = attributor();
        let raw = normal_raw();
        let mut deltas = [0.0; NUM_CHANNELS];
        deltas[Channel::FlowRate.index()] = 0.01; // > 0.0075
        deltas[Channel::MotorRpm.index()] = 0.06; // > 0.05
        deltas[Channel::Vibration.index()] = 0.007;
        let states = a.classify(&deltas, &raw);
        assert_eq!(states[Channel::FlowRate.index()], SensorState::Anomaly);
        assert_eq!(states[Channel::MotorRpm.index()], SensorState::Critical);
        assert_eq!(states[Channel::Vibration.index()], SensorState::Normal);
    }

    #[test]
    fn test_bound_is_per_channel_share_of_threshold() {
        let a = attributor();
        let raw = normal_raw();
        let mut deltas = [0.0; NUM_CHANNELS];
        // One channel carrying more than the whole window threshold is CRITICAL
        deltas[Channel::FlowRate.index()] = 0.051;
        // Its 1.5x share alone is already ANOMALY
        deltas[Channel::SuctionPressure.index()] = 0.0076;
        let states = a.classify(&deltas, &raw);
        assert_eq!(states[Channel::FlowRate.index()], SensorState::Critical);
        assert_eq!(states[Channel::SuctionPressure.index()], SensorState::Anomaly);

        let relaxed = AttributionConfig {
            critical_factor: 20.0,
            ..PumpConfig::default().attribution
        };
        let a = SensorAttributor::new(0.05, &relaxed, PumpConfig::default().operating_limits());
        deltas[Channel::FlowRate.index()] = 0.05;
        let states = a.classify(&deltas, &raw);
        assert_eq!(states[Channel::FlowRate.index()], SensorState::Anomaly);
        assert_eq!(states[Channel::SuctionPressure.index()], SensorState::Anomaly);
    }

    #[test]
    fn test_operating_limits() {
        let a = attributor();
        let mut raw = normal_raw();
        raw[Channel::BearingTemperature.index()] = 86.0;
        raw[Channel::Vibration.index()] = 7.0;
        raw[Channel::OilPressure.index()] = 0.8;
        let states = a.classify(&[0.0; NUM_CHANNELS], &raw);
        assert_eq!(states[Channel::BearingTemperature.index()], SensorState::Critical);
        assert_eq!(states[Channel::Vibration.index()], SensorState::Anomaly);
        assert_eq!(states[Channel::OilPressure.index()], SensorState::Critical);
    }

    #[test]
    fn test_worse_policy_wins() {
        let a = attributor();
        let mut raw = normal_raw();
        raw[Channel::BearingTemperature.index()] = 75.0;
        let mut deltas = [0.0; NUM_CHANNELS];
        deltas[Channel::BearingTemperature.index()] = 0.9;
        let states = a.classify(&deltas, &raw);
        assert_eq!(states[Channel::BearingTemperature.index()], SensorState::Critical);
    }
}
