//! API route handlers
//!
//! - `live`: latest published snapshot, anomaly status and counts, risk
//! - `ingest`: reading submission
//! - `history`: time-ranged reads from the persistence sink
//! - `admin`: counter reset, event resolution, replay control
//! - `system`: health and liveness
//! - `legacy`: flat polling contract of the original dashboard

mod admin;
mod history;
mod ingest;
mod legacy;
mod live;
mod system;

pub use admin::*;
pub use history::*;
pub use ingest::*;
pub use legacy::*;
pub use live::*;
pub use system::*;

use std::collections::BTreeMap;

use crate::types::{Channel, NUM_CHANNELS};

/// `{channel_id: value}` view of a channel array.
pub(crate) fn channel_map<T: Copy>(values: &[T; NUM_CHANNELS]) -> BTreeMap<&'static str, T> {
    Channel::ALL
        .into_iter()
        .map(|ch| (ch.id(), values[ch.index()]))
        .collect()
}

/// Same as [`channel_map`] keyed by the dataset column names.
pub(crate) fn column_map<T: Copy>(values: &[T; NUM_CHANNELS]) -> BTreeMap<&'static str, T> {
    Channel::ALL
        .into_iter()
        .map(|ch| (ch.column_name(), values[ch.index()]))
        .collect()
}
