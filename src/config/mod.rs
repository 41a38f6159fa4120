//! Pump Configuration Module
//!
//! Per-deployment configuration loaded from TOML, replacing inline business
//! constants (thresholds, trigger table, cost multipliers) with
//! operator-tunable values.
//!
//! ## Loading Order
//!
//! 1. `PUMPGUARD_CONFIG` environment variable (path to TOML file)
//! 2. `pump_config.toml` in the current working directory
//! 3. Built-in defaults
//!
//! The loaded config is wrapped in an `Arc` at startup and handed to every
//! component that needs it; there is no process-global instance.

mod pump_config;
pub mod defaults;

pub use pump_config::*;
