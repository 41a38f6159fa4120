//! Shared data structures for pump condition monitoring
//!
//! This module defines the core types flowing through the pipeline:
//! - Channels: the ten named pump sensors and their fixed ordering
//! - SensorReading: one timestamped raw sample from a pump source
//! - InferenceResult: one evaluated sequence window
//! - MaintenanceEvent: a work order raised by a trigger rule
//! - Status: system and per-sensor state labels

mod channels;
mod counters;
mod inference;
mod maintenance;
mod reading;
mod status;

pub use channels::*;
pub use counters::*;
pub use inference::*;
pub use maintenance::*;
pub use reading::*;
pub use status::*;
