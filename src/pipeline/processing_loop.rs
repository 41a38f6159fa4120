//! The single consumer task.
//!
//! Wraps the synchronous [`StreamProcessor`] in an async loop that takes from
//! the ingestion queue, serves control commands, and stops on cancellation.

use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::info;

use super::control::ControlCommand;
use super::live::LiveState;
use super::processor::{ItemOutcome, StreamProcessor};
use super::queue::{QueueItem, QueueReceiver};
use crate::types::SensorReading;

/// Totals reported when the loop exits.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PipelineStats {
    pub readings_processed: u64,
    pub inferences: u64,
    pub anomalous_windows: u64,
    pub events_raised: u64,
    pub inference_failures: u64,
    /// Items still queued at shutdown
    pub discarded_on_shutdown: usize,
}

// ============================================================================
// Processing Loop
// ============================================================================

/// Owns everything the consumer needs. Built once and consumed by
/// [`run()`](ProcessingLoop::run).
pub struct ProcessingLoop {
    processor: StreamProcessor,
    queue: QueueReceiver,
    control: mpsc::Receiver<ControlCommand>,
    live: Arc<LiveState>,
    cancel_token: CancellationToken,
    progress_interval: u64,
}

impl ProcessingLoop {
    pub fn new(
        processor: StreamProcessor,
        queue: QueueReceiver,
        control: mpsc::Receiver<ControlCommand>,
        live: Arc<LiveState>,
        cancel_token: CancellationToken,
        progress_interval: u64,
    ) -> Self {
        Self {
            processor,
            queue,
            control,
            live,
            cancel_token,
            progress_interval,
        }
    }

    /// Run until cancelled or every producer handle is dropped.
    ///
    /// Items still queued when the loop stops are discarded.
    pub async fn run(mut self) -> PipelineStats {
        let mut stats = PipelineStats::default();
        self.live.set_consumer_running(true);

        info!("📊 Stream processor started");
        info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

        let mut control_open = true;
        loop {
            tokio::select! {
                biased;

                _ = self.cancel_token.cancelled() => {
                    info!("Shutdown signal received, stopping stream processor");
                    break;
                }

                command = self.control.recv(), if control_open => {
                    match command {
                        Some(command) => self.processor.handle_command(command),
                        None => control_open = false,
                    }
                }

                item = self.queue.take(&self.cancel_token) => {
                    match item {
                        Some(QueueItem::Reading(reading)) => {
                            self.handle_reading(reading, &mut stats);
                        }
                        Some(QueueItem::EndOfReplay { source }) => {
                            self.processor.finish_replay(&source);
                        }
                        None => break,
                    }
                }
            }
        }

        stats.discarded_on_shutdown = self.queue.close_and_discard();
        self.live.set_consumer_running(false);

        info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
        info!(
            processed = stats.readings_processed,
            inferences = stats.inferences,
            anomalous = stats.anomalous_windows,
            events = stats.events_raised,
            discarded = stats.discarded_on_shutdown,
            "✅ Stream processor stopped"
        );

        stats
    }

    fn handle_reading(&mut self, reading: SensorReading, stats: &mut PipelineStats) {
        stats.readings_processed += 1;
        match self.processor.process(reading) {
            ItemOutcome::Learning { .. } => {}
            ItemOutcome::Evaluated {
                is_anomaly,
                new_events,
                ..
            } => {
                stats.inferences += 1;
                if is_anomaly {
                    stats.anomalous_windows += 1;
                }
                stats.events_raised += new_events.len() as u64;
            }
            ItemOutcome::InferenceFailed => stats.inference_failures += 1,
        }

        if self.progress_interval > 0 && stats.readings_processed % self.progress_interval == 0 {
            let counters = self.processor.counters();
            info!(
                "📊 Processed {} readings | {} anomalous windows | {} open events | {} rejected",
                stats.readings_processed,
                counters.total_anomalies,
                self.processor.open_event_count(),
                counters.total_rejected
            );
        }
    }
}
