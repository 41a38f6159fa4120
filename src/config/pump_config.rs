//! Pump Configuration
//!
//! TOML-backed configuration for one monitoring deployment. Every section
//! carries `#[serde(default)]` so a partial file only overrides what it names.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use super::defaults;
use crate::types::{Channel, Comparison, Severity, NUM_CHANNELS};

/// Environment variable naming an explicit config file.
pub const CONFIG_ENV_VAR: &str = "PUMPGUARD_CONFIG";

/// Config file looked up in the working directory.
pub const LOCAL_CONFIG_FILE: &str = "pump_config.toml";

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PumpConfig {
    #[serde(default)]
    pub pump: PumpInfo,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub attribution: AttributionConfig,
    #[serde(default)]
    pub maintenance: MaintenanceConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub replay: ReplayConfig,
    #[serde(default)]
    pub health: HealthConfig,
}

impl PumpConfig {
    /// Load configuration using the standard search order:
    /// 1. `$PUMPGUARD_CONFIG` environment variable
    /// 2. `./pump_config.toml` in the current working directory
    /// 3. Built-in defaults
    pub fn load() -> Self {
        if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
            let p = PathBuf::from(&path);
            if p.exists() {
                match Self::load_from_file(&p) {
                    Ok(config) => {
                        info!(path = %p.display(), pump = %config.pump.name, "Loaded pump config from PUMPGUARD_CONFIG");
                        return config;
                    }
                    Err(e) => {
                        warn!(path = %p.display(), error = %e, "Failed to load config from PUMPGUARD_CONFIG, falling back");
                    }
                }
            } else {
                warn!(path = %path, "PUMPGUARD_CONFIG points to non-existent file, falling back");
            }
        }

        let local = PathBuf::from(LOCAL_CONFIG_FILE);
        if local.exists() {
            match Self::load_from_file(&local) {
                Ok(config) => {
                    info!(pump = %config.pump.name, "Loaded pump config from ./pump_config.toml");
                    return config;
                }
                Err(e) => {
                    warn!(error = %e, "Failed to load ./pump_config.toml, using defaults");
                }
            }
        }

        info!("No pump_config.toml found, using built-in defaults");
        Self::default()
    }

    /// Load from a specific TOML file and validate it.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents =
            std::fs::read_to_string(path).map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;
        let config: Self =
            toml::from_str(&contents).map_err(|e| ConfigError::Parse(path.to_path_buf(), e))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(ConfigError::Serialize)
    }

    pub fn save_to_file(&self, path: &Path) -> Result<(), ConfigError> {
        let contents = self.to_toml()?;
        std::fs::write(path, contents).map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;
        info!(path = %path.display(), "Saved pump config");
        Ok(())
    }

    /// Check the configuration for internal consistency.
    ///
    /// Collects every violation rather than stopping at the first:
    /// - pipeline capacity and window size must be positive
    /// - every channel must have exactly one fit entry with max > min
    /// - escalating bounds (anomaly -> critical) must escalate
    /// - severity multipliers must be >= 1
    /// - risk cut-points must be ordered
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors: Vec<String> = Vec::new();

        if self.pipeline.queue_capacity == 0 {
            errors.push("pipeline.queue_capacity must be > 0".to_string());
        }
        if self.pipeline.window_size == 0 {
            errors.push("pipeline.window_size must be > 0".to_string());
        }
        if self.pump.default_source.trim().is_empty() {
            errors.push("pump.default_source must not be empty".to_string());
        }

        // Model
        let m = &self.model;
        if !m.threshold.is_finite() || m.threshold <= 0.0 {
            errors.push(format!("model.threshold must be finite and > 0 (got {})", m.threshold));
        }
        let mut seen = [0usize; NUM_CHANNELS];
        for fit in &m.channels {
            seen[fit.sensor.index()] += 1;
            if !fit.min.is_finite() || !fit.max.is_finite() || !fit.normal.is_finite() {
                errors.push(format!("model.channels.{}: values must be finite", fit.sensor));
            } else if fit.max <= fit.min {
                errors.push(format!(
                    "model.channels.{}: max ({:.3}) must be > min ({:.3})",
                    fit.sensor, fit.max, fit.min
                ));
            }
        }
        for ch in Channel::ALL {
            match seen[ch.index()] {
                1 => {}
                0 => errors.push(format!("model.channels: missing fit for {ch}")),
                n => errors.push(format!("model.channels: {ch} listed {n} times")),
            }
        }

        // Attribution
        let a = &self.attribution;
        if a.anomaly_factor <= 0.0 {
            errors.push(format!(
                "attribution.anomaly_factor must be > 0 (got {})",
                a.anomaly_factor
            ));
        }
        Self::check_escalation(
            a.anomaly_factor,
            a.critical_factor,
            "attribution.factor",
            &mut errors,
        );
        for limit in &a.limits {
            if let (Some(anomaly), Some(critical)) = (limit.anomaly_above, limit.critical_above) {
                Self::check_escalation(
                    anomaly,
                    critical,
                    &format!("attribution.limits.{}.above", limit.sensor),
                    &mut errors,
                );
            }
            if let (Some(anomaly), Some(critical)) = (limit.anomaly_below, limit.critical_below) {
                // Lower bounds escalate downwards
                Self::check_escalation(
                    -anomaly,
                    -critical,
                    &format!("attribution.limits.{}.below", limit.sensor),
                    &mut errors,
                );
            }
        }

        // Maintenance
        let mt = &self.maintenance;
        if mt.version == 0 {
            errors.push("maintenance.version must be >= 1".to_string());
        }
        for (i, rule) in mt.triggers.iter().enumerate() {
            if !rule.threshold.is_finite() {
                errors.push(format!("maintenance.triggers[{i}] ({}): threshold must be finite", rule.sensor));
            }
            if !rule.base_cost.is_finite() || rule.base_cost < 0.0 {
                errors.push(format!(
                    "maintenance.triggers[{i}] ({}): base_cost must be finite and >= 0",
                    rule.sensor
                ));
            }
            if let Some(ratio) = rule.critical_ratio {
                if ratio.is_nan() || ratio < 1.0 {
                    errors.push(format!(
                        "maintenance.triggers[{i}] ({}): critical_ratio must be >= 1.0 (got {ratio})",
                        rule.sensor
                    ));
                }
            }
            if rule.event_type.trim().is_empty() {
                errors.push(format!("maintenance.triggers[{i}] ({}): event_type must not be empty", rule.sensor));
            }
        }
        let sm = &mt.severity_multipliers;
        for (name, value) in [
            ("low", sm.low),
            ("medium", sm.medium),
            ("high", sm.high),
            ("critical", sm.critical),
        ] {
            if !value.is_finite() || value < 1.0 {
                errors.push(format!(
                    "maintenance.severity_multipliers.{name} must be >= 1.0 (got {value})"
                ));
            }
        }

        // Storage
        if self.storage.memory_record_capacity == 0 || self.storage.memory_event_capacity == 0 {
            errors.push("storage memory capacities must be > 0".to_string());
        }

        // Health
        let h = &self.health;
        if !(h.watch_at <= h.unstable_at && h.unstable_at <= h.critical_at) {
            errors.push(format!(
                "health cut-points must satisfy watch_at <= unstable_at <= critical_at (got {}, {}, {})",
                h.watch_at, h.unstable_at, h.critical_at
            ));
        }
        if !h.rul_base_hours.is_finite() || h.rul_base_hours < 0.0 {
            errors.push("health.rul_base_hours must be finite and >= 0".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors))
        }
    }

    fn check_escalation(anomaly: f64, critical: f64, name: &str, errors: &mut Vec<String>) {
        // NaN slips through ordinary comparisons
        if !anomaly.is_finite() || !critical.is_finite() {
            errors.push(format!(
                "{name}: values must be finite (got anomaly={anomaly}, critical={critical})"
            ));
            return;
        }
        if critical < anomaly {
            errors.push(format!(
                "{name}: critical ({critical:.3}) must escalate past anomaly ({anomaly:.3})"
            ));
        }
    }

    /// Per-channel fit entries laid out in channel order.
    ///
    /// Missing channels fall back to the built-in fit; duplicates keep the
    /// last entry. `validate()` reports both.
    pub fn channel_fits(&self) -> [ChannelFit; NUM_CHANNELS] {
        let mut fits = default_channel_fits_array();
        for fit in &self.model.channels {
            fits[fit.sensor.index()] = *fit;
        }
        fits
    }

    /// Operating limits laid out in channel order.
    pub fn operating_limits(&self) -> [OperatingLimit; NUM_CHANNELS] {
        let mut limits = Channel::ALL.map(OperatingLimit::unbounded);
        for limit in &self.attribution.limits {
            limits[limit.sensor.index()] = *limit;
        }
        limits
    }

    /// Address the HTTP server binds, honoring `PUMPGUARD_SERVER_ADDR`.
    pub fn server_addr(&self) -> String {
        std::env::var("PUMPGUARD_SERVER_ADDR").unwrap_or_else(|_| self.server.addr.clone())
    }
}

// ============================================================================
// Error Type
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Config I/O error ({0:?}): {1}")]
    Io(PathBuf, #[source] std::io::Error),

    #[error("Config parse error ({0:?}): {1}")]
    Parse(PathBuf, #[source] toml::de::Error),

    #[error("Config serialization error: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Config validation failed:\n  - {}", .0.join("\n  - "))]
    Validation(Vec<String>),
}

// ============================================================================
// Pump Info
// ============================================================================

/// Identification metadata; appears in logs and health output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PumpInfo {
    #[serde(default = "default_pump_name")]
    pub name: String,

    #[serde(default)]
    pub site: String,

    /// Source id used when a reading does not name one
    #[serde(default = "default_source")]
    pub default_source: String,
}

fn default_pump_name() -> String {
    "PUMP-01".to_string()
}
fn default_source() -> String {
    "pump-01".to_string()
}

impl Default for PumpInfo {
    fn default() -> Self {
        Self {
            name: default_pump_name(),
            site: String::new(),
            default_source: default_source(),
        }
    }
}

// ============================================================================
// Server
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_server_addr")]
    pub addr: String,
}

fn default_server_addr() -> String {
    defaults::SERVER_ADDR.to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: default_server_addr(),
        }
    }
}

// ============================================================================
// Pipeline
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    #[serde(default = "default_window_size")]
    pub window_size: usize,

    /// Log a progress line every N processed readings (0 disables)
    #[serde(default = "default_progress_interval")]
    pub progress_log_interval: u64,
}

fn default_queue_capacity() -> usize { defaults::QUEUE_CAPACITY }
fn default_window_size() -> usize { defaults::WINDOW_SIZE }
fn default_progress_interval() -> u64 { defaults::PROGRESS_LOG_INTERVAL }

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            queue_capacity: default_queue_capacity(),
            window_size: default_window_size(),
            progress_log_interval: default_progress_interval(),
        }
    }
}

// ============================================================================
// Model
// ============================================================================

/// Fit-time statistics for one channel.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChannelFit {
    pub sensor: Channel,
    /// Normalization lower bound (maps to 0.0)
    pub min: f64,
    /// Normalization upper bound (maps to 1.0)
    pub max: f64,
    /// Typical healthy value in engineering units
    pub normal: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// JSON model artifact; empty disables loading
    #[serde(default = "default_artifact_path")]
    pub artifact_path: String,

    /// Reconstruction-error threshold (an artifact threshold takes precedence)
    #[serde(default = "default_threshold")]
    pub threshold: f64,

    #[serde(default = "default_channel_fits")]
    pub channels: Vec<ChannelFit>,
}

fn default_artifact_path() -> String { defaults::MODEL_ARTIFACT_PATH.to_string() }
fn default_threshold() -> f64 { defaults::ANOMALY_THRESHOLD }

fn default_channel_fits_array() -> [ChannelFit; NUM_CHANNELS] {
    Channel::ALL.map(|sensor| {
        let (min, max, normal) = match sensor {
            Channel::MotorRpm => (1_400.0, 1_600.0, 1_480.0),
            Channel::BearingTemperature => (30.0, 80.0, 40.0),
            Channel::OilPressure => (1.0, 4.0, 2.5),
            Channel::Vibration => (0.5, 10.0, 2.5),
            Channel::FlowRate => (200.0, 600.0, 450.0),
            Channel::SuctionPressure => (0.5, 3.0, 1.5),
            Channel::DischargePressure => (4.0, 12.0, 8.0),
            Channel::MotorCurrent => (20.0, 50.0, 32.0),
            Channel::CasingTemperature => (25.0, 75.0, 40.0),
            Channel::AmbientTemperature => (10.0, 45.0, 25.0),
        };
        ChannelFit { sensor, min, max, normal }
    })
}

fn default_channel_fits() -> Vec<ChannelFit> {
    default_channel_fits_array().to_vec()
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            artifact_path: default_artifact_path(),
            threshold: default_threshold(),
            channels: default_channel_fits(),
        }
    }
}

// ============================================================================
// Attribution
// ============================================================================

/// Raw-value operating envelope for one channel.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OperatingLimit {
    pub sensor: Channel,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub anomaly_above: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub critical_above: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub anomaly_below: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub critical_below: Option<f64>,
}

impl OperatingLimit {
    pub fn unbounded(sensor: Channel) -> Self {
        Self {
            sensor,
            anomaly_above: None,
            critical_above: None,
            anomaly_below: None,
            critical_below: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttributionConfig {
    /// Channel delta above `threshold / NUM_CHANNELS * anomaly_factor` is ANOMALY
    #[serde(default = "default_anomaly_factor")]
    pub anomaly_factor: f64,

    /// Channel delta above `threshold / NUM_CHANNELS * critical_factor` is CRITICAL
    #[serde(default = "default_critical_factor")]
    pub critical_factor: f64,

    #[serde(default = "default_operating_limits")]
    pub limits: Vec<OperatingLimit>,
}

fn default_anomaly_factor() -> f64 { defaults::CONTRIBUTION_ANOMALY_FACTOR }
fn default_critical_factor() -> f64 { defaults::CONTRIBUTION_CRITICAL_FACTOR }

fn default_operating_limits() -> Vec<OperatingLimit> {
    vec![
        OperatingLimit {
            anomaly_above: Some(70.0),
            critical_above: Some(85.0),
            ..OperatingLimit::unbounded(Channel::BearingTemperature)
        },
        OperatingLimit {
            anomaly_above: Some(6.0),
            critical_above: Some(8.0),
            ..OperatingLimit::unbounded(Channel::Vibration)
        },
        OperatingLimit {
            anomaly_above: Some(40.0),
            critical_above: Some(45.0),
            ..OperatingLimit::unbounded(Channel::MotorCurrent)
        },
        OperatingLimit {
            anomaly_below: Some(1.5),
            critical_below: Some(1.0),
            ..OperatingLimit::unbounded(Channel::OilPressure)
        },
    ]
}

impl Default for AttributionConfig {
    fn default() -> Self {
        Self {
            anomaly_factor: default_anomaly_factor(),
            critical_factor: default_critical_factor(),
            limits: default_operating_limits(),
        }
    }
}

// ============================================================================
// Maintenance
// ============================================================================

/// One row of the versioned maintenance trigger table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriggerRule {
    pub sensor: Channel,
    pub op: Comparison,
    pub threshold: f64,
    pub severity: Severity,
    pub base_cost: f64,
    /// Escalate to CRITICAL once the value passes `threshold * ratio`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub critical_ratio: Option<f64>,
    #[serde(default = "default_event_type")]
    pub event_type: String,
}

fn default_event_type() -> String {
    "ANOMALY_DETECTED".to_string()
}

/// Cost multiplier per severity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeverityMultipliers {
    #[serde(default = "default_low_multiplier")]
    pub low: f64,
    #[serde(default = "default_medium_multiplier")]
    pub medium: f64,
    #[serde(default = "default_high_multiplier")]
    pub high: f64,
    #[serde(default = "default_critical_multiplier")]
    pub critical: f64,
}

fn default_low_multiplier() -> f64 { 1.0 }
fn default_medium_multiplier() -> f64 { 1.0 }
fn default_high_multiplier() -> f64 { 1.2 }
fn default_critical_multiplier() -> f64 { 1.5 }

impl Default for SeverityMultipliers {
    fn default() -> Self {
        Self {
            low: default_low_multiplier(),
            medium: default_medium_multiplier(),
            high: default_high_multiplier(),
            critical: default_critical_multiplier(),
        }
    }
}

impl SeverityMultipliers {
    pub fn get(&self, severity: Severity) -> f64 {
        match severity {
            Severity::Low => self.low,
            Severity::Medium => self.medium,
            Severity::High => self.high,
            Severity::Critical => self.critical,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MaintenanceConfig {
    /// Bumped whenever the trigger table changes; stamped on every event
    #[serde(default = "default_trigger_version")]
    pub version: u32,

    #[serde(default = "default_triggers")]
    pub triggers: Vec<TriggerRule>,

    #[serde(default)]
    pub severity_multipliers: SeverityMultipliers,
}

fn default_trigger_version() -> u32 { 1 }

fn default_triggers() -> Vec<TriggerRule> {
    vec![
        TriggerRule {
            sensor: Channel::BearingTemperature,
            op: Comparison::Above,
            threshold: 85.0,
            severity: Severity::Critical,
            base_cost: 45_000.0,
            critical_ratio: None,
            event_type: default_event_type(),
        },
        TriggerRule {
            sensor: Channel::Vibration,
            op: Comparison::Above,
            threshold: 8.0,
            severity: Severity::High,
            base_cost: 35_000.0,
            critical_ratio: Some(1.2),
            event_type: default_event_type(),
        },
        TriggerRule {
            sensor: Channel::MotorCurrent,
            op: Comparison::Above,
            threshold: 45.0,
            severity: Severity::High,
            base_cost: 60_000.0,
            critical_ratio: Some(1.2),
            event_type: default_event_type(),
        },
        TriggerRule {
            sensor: Channel::OilPressure,
            op: Comparison::Below,
            threshold: 1.0,
            severity: Severity::Medium,
            base_cost: 25_000.0,
            critical_ratio: None,
            event_type: default_event_type(),
        },
    ]
}

impl Default for MaintenanceConfig {
    fn default() -> Self {
        Self {
            version: default_trigger_version(),
            triggers: default_triggers(),
            severity_multipliers: SeverityMultipliers::default(),
        }
    }
}

// ============================================================================
// Storage
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Use the sled store; false runs purely in memory
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_data_dir")]
    pub data_dir: String,

    /// sled database directory, relative to `data_dir`
    #[serde(default = "default_sled_dir")]
    pub sled_dir: String,

    #[serde(default = "default_memory_records")]
    pub memory_record_capacity: usize,

    #[serde(default = "default_memory_events")]
    pub memory_event_capacity: usize,
}

fn default_true() -> bool { true }
fn default_data_dir() -> String { defaults::DATA_DIR.to_string() }
fn default_sled_dir() -> String { "pump_history.db".to_string() }
fn default_memory_records() -> usize { defaults::MEMORY_RECORD_CAPACITY }
fn default_memory_events() -> usize { defaults::MEMORY_EVENT_CAPACITY }

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            data_dir: default_data_dir(),
            sled_dir: default_sled_dir(),
            memory_record_capacity: default_memory_records(),
            memory_event_capacity: default_memory_events(),
        }
    }
}

impl StorageConfig {
    pub fn sled_path(&self) -> PathBuf {
        Path::new(&self.data_dir).join(&self.sled_dir)
    }
}

// ============================================================================
// Replay
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplayConfig {
    /// CSV replayed at startup when set
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub csv_path: Option<String>,

    #[serde(default = "default_replay_interval")]
    pub interval_ms: u64,
}

fn default_replay_interval() -> u64 { defaults::REPLAY_INTERVAL_MS }

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            csv_path: None,
            interval_ms: default_replay_interval(),
        }
    }
}

// ============================================================================
// Health / Risk
// ============================================================================

/// Cut-points for the risk bucket, compared against the highest per-sensor
/// anomaly count, plus the remaining-life heuristic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthConfig {
    #[serde(default = "default_watch_at")]
    pub watch_at: u64,
    #[serde(default = "default_unstable_at")]
    pub unstable_at: u64,
    #[serde(default = "default_critical_at")]
    pub critical_at: u64,
    /// Remaining life with a clean record (hours)
    #[serde(default = "default_rul_base_hours")]
    pub rul_base_hours: f64,
    /// Hours of remaining life consumed per anomalous sample
    #[serde(default = "default_rul_hours_per_anomaly")]
    pub rul_hours_per_anomaly: f64,
}

fn default_watch_at() -> u64 { 5 }
fn default_unstable_at() -> u64 { 20 }
fn default_critical_at() -> u64 { 50 }
fn default_rul_base_hours() -> f64 { 2_000.0 }
fn default_rul_hours_per_anomaly() -> f64 { 10.0 }

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            watch_at: default_watch_at(),
            unstable_at: default_unstable_at(),
            critical_at: default_critical_at(),
            rul_base_hours: default_rul_base_hours(),
            rul_hours_per_anomaly: default_rul_hours_per_anomaly(),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
