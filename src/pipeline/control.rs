//! Administrative commands for the stream processor.
//!
//! Counters, sequence buffers and the open-event index belong to the consumer
//! task. Admin endpoints send a [`ControlCommand`] and await the reply instead
//! of touching that state themselves.

use tokio::sync::{mpsc, oneshot};

use crate::types::{AnomalyCounters, MaintenanceEvent, RecordId};

#[derive(Debug, thiserror::Error)]
pub enum ControlError {
    #[error("maintenance event {0} not found")]
    NotFound(RecordId),

    #[error("persistence error: {0}")]
    Storage(String),

    #[error("stream processor is not running")]
    Unavailable,
}

#[derive(Debug)]
pub enum ControlCommand {
    ResetCounters {
        reply: oneshot::Sender<AnomalyCounters>,
    },
    ResolveEvent {
        id: RecordId,
        reply: oneshot::Sender<Result<MaintenanceEvent, ControlError>>,
    },
    /// A new dataset is about to be replayed for `source`
    ResetSource { source: String },
}

/// Sending side used by API handlers. Cheap to clone.
#[derive(Debug, Clone)]
pub struct ControlHandle {
    tx: mpsc::Sender<ControlCommand>,
}

pub fn control_channel(capacity: usize) -> (ControlHandle, mpsc::Receiver<ControlCommand>) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (ControlHandle { tx }, rx)
}

impl ControlHandle {
    /// Zero every counter. Returns the counters as they are after the reset.
    pub async fn reset_counters(&self) -> Result<AnomalyCounters, ControlError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(ControlCommand::ResetCounters { reply })
            .await
            .map_err(|_| ControlError::Unavailable)?;
        rx.await.map_err(|_| ControlError::Unavailable)
    }

    /// Mark a maintenance event resolved so its condition can trigger again.
    pub async fn resolve_event(&self, id: RecordId) -> Result<MaintenanceEvent, ControlError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(ControlCommand::ResolveEvent { id, reply })
            .await
            .map_err(|_| ControlError::Unavailable)?;
        rx.await.map_err(|_| ControlError::Unavailable)?
    }

    /// Drop the source's window and counters before new data arrives.
    ///
    /// Does not wait for the consumer. Commands are served ahead of queued
    /// readings, so anything submitted after this returns sees the reset.
    pub async fn reset_source(&self, source: &str) -> Result<(), ControlError> {
        self.tx
            .send(ControlCommand::ResetSource {
                source: source.to_string(),
            })
            .await
            .map_err(|_| ControlError::Unavailable)
    }
}
