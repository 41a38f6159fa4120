//! Bounded ingestion queue
//!
//! Many producers (HTTP handlers, the replay driver) submit; exactly one
//! consumer takes. `submit` never waits: a full queue rejects immediately
//! and the rejection is counted, so overflow is always observable.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::types::SensorReading;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum QueueError {
    #[error("ingestion queue is full")]
    Full,
    #[error("ingestion queue is closed")]
    Closed,
}

/// Item travelling from producers to the stream processor.
#[derive(Debug, Clone, PartialEq)]
pub enum QueueItem {
    Reading(SensorReading),
    /// A finite replay for `source` has submitted its last reading
    EndOfReplay { source: String },
}

/// Submission counters shared by all producer handles.
#[derive(Debug, Default)]
pub struct QueueStats {
    accepted: AtomicU64,
    rejected: AtomicU64,
}

impl QueueStats {
    pub fn accepted(&self) -> u64 {
        self.accepted.load(Ordering::Relaxed)
    }

    pub fn rejected(&self) -> u64 {
        self.rejected.load(Ordering::Relaxed)
    }
}

/// Producer handle. Cheap to clone.
#[derive(Debug, Clone)]
pub struct IngestionQueue {
    tx: mpsc::Sender<QueueItem>,
    capacity: usize,
    stats: Arc<QueueStats>,
}

/// Consumer end; owned by the processing loop.
#[derive(Debug)]
pub struct QueueReceiver {
    rx: mpsc::Receiver<QueueItem>,
}

/// Create a queue holding at most `capacity` pending items.
///
/// Panics if `capacity` is zero; config validation rejects that first.
pub fn ingestion_queue(capacity: usize) -> (IngestionQueue, QueueReceiver) {
    let (tx, rx) = mpsc::channel(capacity);
    let stats = Arc::new(QueueStats::default());
    (
        IngestionQueue {
            tx,
            capacity,
            stats,
        },
        QueueReceiver { rx },
    )
}

impl IngestionQueue {
    /// Enqueue a reading without waiting.
    pub fn submit(&self, reading: SensorReading) -> Result<(), QueueError> {
        match self.tx.try_send(QueueItem::Reading(reading)) {
            Ok(()) => {
                self.stats.accepted.fetch_add(1, Ordering::Relaxed);
                Ok(())
            }
            Err(mpsc::error::TrySendError::Full(_)) => {
                self.stats.rejected.fetch_add(1, Ordering::Relaxed);
                Err(QueueError::Full)
            }
            Err(mpsc::error::TrySendError::Closed(_)) => Err(QueueError::Closed),
        }
    }

    /// Enqueue the end-of-replay marker. Not counted as a reading.
    pub fn submit_end_of_replay(&self, source: &str) -> Result<(), QueueError> {
        self.tx
            .try_send(QueueItem::EndOfReplay {
                source: source.to_string(),
            })
            .map_err(|e| match e {
                mpsc::error::TrySendError::Full(_) => QueueError::Full,
                mpsc::error::TrySendError::Closed(_) => QueueError::Closed,
            })
    }

    /// Items currently waiting.
    pub fn depth(&self) -> usize {
        self.capacity.saturating_sub(self.tx.capacity())
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn stats(&self) -> Arc<QueueStats> {
        Arc::clone(&self.stats)
    }
}

impl QueueReceiver {
    /// Wait for the next item, or `None` once cancelled or every producer
    /// handle is gone.
    pub async fn take(&mut self, cancel: &CancellationToken) -> Option<QueueItem> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            item = self.rx.recv() => item,
        }
    }

    /// Stop accepting and discard whatever is still queued.
    pub fn close_and_discard(&mut self) -> usize {
        self.rx.close();
        let mut discarded = 0;
        while self.rx.try_recv().is_ok() {
            discarded += 1;
        }
        discarded
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::NUM_CHANNELS;
    use chrono::Utc;

    fn reading(i: usize) -> SensorReading {
        SensorReading::new(format!("pump-{i}"), Utc::now(), [i as f64; NUM_CHANNELS])
    }

    #[tokio::test]
    async fn test_overflow_rejected_not_blocked() {
        let (queue, _rx) = ingestion_queue(1000);
        let mut rejected = 0;
        for i in 0..1001 {
            if let Err(e) = queue.submit(reading(i)) {
                assert_eq!(e, QueueError::Full);
                rejected += 1;
            }
        }
        assert_eq!(rejected, 1);
        assert_eq!(queue.depth(), 1000);
        assert_eq!(queue.stats().accepted(), 1000);
        assert_eq!(queue.stats().rejected(), 1);
    }

    #[tokio::test]
    async fn test_fifo_order() {
        let (queue, mut rx) = ingestion_queue(8);
        for i in 0..3 {
            queue.submit(reading(i)).unwrap();
        }
        let cancel = CancellationToken::new();
        for i in 0..3 {
            match rx.take(&cancel).await {
                Some(QueueItem::Reading(r)) => assert_eq!(r.source, format!("pump-{i}")),
                other => panic!("unexpected {other:?}"),
            }
        }
        assert_eq!(queue.depth(), 0);
    }

    #[tokio::test]
    async fn test_take_returns_none_on_cancel() {
        let (_queue, mut rx) = ingestion_queue(4);
        let cancel = CancellationToken::new();
        cancel.cancel();
        assert!(rx.take(&cancel).await.is_none());
    }

    #[tokio::test]
    async fn test_closed_after_receiver_drop() {
        let (queue, rx) = ingestion_queue(4);
        drop(rx);
        assert_eq!(queue.submit(reading(0)), Err(QueueError::Closed));
        assert_eq!(queue.stats().rejected(), 0);
    }

    #[tokio::test]
    async fn test_close_and_discard() {
        let (queue, mut rx) = ingestion_queue(4);
        queue.submit(reading(0)).unwrap();
        queue.submit_end_of_replay("pump-0").unwrap();
        assert_eq!(rx.close_and_discard(), 2);
        assert_eq!(queue.submit(reading(1)), Err(QueueError::Closed));
    }
}
