//! Pump sensor channel catalogue
//!
//! The ten channels every reading carries, in the fixed order used for
//! windows, normalization bounds and model weights.

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize};

/// Number of sensor channels per reading.
pub const NUM_CHANNELS: usize = 10;

/// A named pump sensor channel.
///
/// Serializes as the snake_case id (`bearing_temperature`). The original
/// dataset column names (`Bearing_Temperature_C`) are accepted as aliases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    #[serde(alias = "Motor_RPM")]
    MotorRpm,
    #[serde(alias = "Bearing_Temperature_C")]
    BearingTemperature,
    #[serde(alias = "Oil_Pressure_bar")]
    OilPressure,
    #[serde(alias = "Vibration_mm_s")]
    Vibration,
    #[serde(alias = "Flow_Rate_L_min")]
    FlowRate,
    #[serde(alias = "Suction_Pressure_bar")]
    SuctionPressure,
    #[serde(alias = "Discharge_Pressure_bar")]
    DischargePressure,
    #[serde(alias = "Motor_Current_A")]
    MotorCurrent,
    #[serde(alias = "Casing_Temperature_C")]
    CasingTemperature,
    #[serde(alias = "Ambient_Temperature_C")]
    AmbientTemperature,
}

impl Channel {
    /// All channels in window/model order.
    pub const ALL: [Channel; NUM_CHANNELS] = [
        Channel::MotorRpm,
        Channel::BearingTemperature,
        Channel::OilPressure,
        Channel::Vibration,
        Channel::FlowRate,
        Channel::SuctionPressure,
        Channel::DischargePressure,
        Channel::MotorCurrent,
        Channel::CasingTemperature,
        Channel::AmbientTemperature,
    ];

    /// Position of this channel inside fixed-size channel arrays.
    pub fn index(self) -> usize {
        self as usize
    }

    /// Canonical snake_case identifier.
    pub fn id(self) -> &'static str {
        match self {
            Channel::MotorRpm => "motor_rpm",
            Channel::BearingTemperature => "bearing_temperature",
            Channel::OilPressure => "oil_pressure",
            Channel::Vibration => "vibration",
            Channel::FlowRate => "flow_rate",
            Channel::SuctionPressure => "suction_pressure",
            Channel::DischargePressure => "discharge_pressure",
            Channel::MotorCurrent => "motor_current",
            Channel::CasingTemperature => "casing_temperature",
            Channel::AmbientTemperature => "ambient_temperature",
        }
    }

    /// Column name used by the plant's CSV exports.
    pub fn column_name(self) -> &'static str {
        match self {
            Channel::MotorRpm => "Motor_RPM",
            Channel::BearingTemperature => "Bearing_Temperature_C",
            Channel::OilPressure => "Oil_Pressure_bar",
            Channel::Vibration => "Vibration_mm_s",
            Channel::FlowRate => "Flow_Rate_L_min",
            Channel::SuctionPressure => "Suction_Pressure_bar",
            Channel::DischargePressure => "Discharge_Pressure_bar",
            Channel::MotorCurrent => "Motor_Current_A",
            Channel::CasingTemperature => "Casing_Temperature_C",
            Channel::AmbientTemperature => "Ambient_Temperature_C",
        }
    }

    /// Engineering unit.
    pub fn unit(self) -> &'static str {
        match self {
            Channel::MotorRpm => "rpm",
            Channel::BearingTemperature
            | Channel::CasingTemperature
            | Channel::AmbientTemperature => "°C",
            Channel::OilPressure | Channel::SuctionPressure | Channel::DischargePressure => "bar",
            Channel::Vibration => "mm/s",
            Channel::FlowRate => "L/min",
            Channel::MotorCurrent => "A",
        }
    }

    /// Resolve a channel from its id or CSV column name (case-insensitive).
    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.trim();
        Self::ALL.into_iter().find(|ch| {
            ch.id().eq_ignore_ascii_case(name) || ch.column_name().eq_ignore_ascii_case(name)
        })
    }
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.id())
    }
}

/// Serde adapter: `[T; NUM_CHANNELS]` <-> `{ "motor_rpm": T, ... }`.
///
/// Deserialization requires every channel to be present.
pub mod channel_array {
    use super::{Channel, NUM_CHANNELS};
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::collections::BTreeMap;

    pub fn serialize<S, T>(values: &[T; NUM_CHANNELS], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
        T: Serialize,
    {
        super::serialize_channel_map(values, serializer)
    }

    pub fn deserialize<'de, D, T>(deserializer: D) -> Result<[T; NUM_CHANNELS], D::Error>
    where
        D: Deserializer<'de>,
        T: Deserialize<'de> + Copy + Default,
    {
        let map: BTreeMap<String, T> = BTreeMap::deserialize(deserializer)?;
        let mut out = [T::default(); NUM_CHANNELS];
        let mut seen = [false; NUM_CHANNELS];
        for (name, value) in map {
            let ch = Channel::from_name(&name)
                .ok_or_else(|| D::Error::custom(format!("unknown channel '{name}'")))?;
            out[ch.index()] = value;
            seen[ch.index()] = true;
        }
        if let Some(ch) = Channel::ALL.into_iter().find(|ch| !seen[ch.index()]) {
            return Err(D::Error::custom(format!("missing channel '{}'", ch.id())));
        }
        Ok(out)
    }
}

fn serialize_channel_map<S, T>(values: &[T; NUM_CHANNELS], serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
    T: Serialize,
{
    let mut map = serializer.serialize_map(Some(NUM_CHANNELS))?;
    for ch in Channel::ALL {
        map.serialize_entry(ch.id(), &values[ch.index()])?;
    }
    map.end()
}
