//! Processing Pipeline Module
//!
//! ```text
//! HTTP ingest ─┐
//!              ├─> IngestionQueue (bounded, try_send) ─> ProcessingLoop (one task)
//! replay ──────┘                                            │
//!                     SequenceBuffer ─> InferenceModel ─────┤
//!                     SensorAttributor ─> TriggerTable ─────┤
//!                     PersistenceSink <─────────────────────┤
//!                     LiveState (ArcSwap) <─────────────────┘
//! ```
//!
//! The queue is the only synchronization point between producers and the
//! consumer. Admin actions reach the consumer over the control channel.

pub mod attribution;
pub mod control;
pub mod live;
pub mod processing_loop;
pub mod processor;
pub mod queue;
pub mod replay;
pub mod sequence_buffer;
pub mod source;
mod state;
pub mod triggers;

pub use attribution::SensorAttributor;
pub use control::{control_channel, ControlCommand, ControlError, ControlHandle};
pub use live::{LiveSnapshot, LiveState, SourceSnapshot};
pub use processing_loop::{PipelineStats, ProcessingLoop};
pub use processor::{ItemOutcome, StreamProcessor};
pub use queue::{ingestion_queue, IngestionQueue, QueueError, QueueItem, QueueReceiver, QueueStats};
pub use replay::{ReplayController, ReplayError, ReplayProgress, ReplayState};
pub use sequence_buffer::SequenceBuffer;
pub use source::{CsvSource, ReadingSource, SourceEvent};
pub use state::*;
pub use triggers::TriggerTable;

use chrono::Utc;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::config::defaults::CONTROL_CHANNEL_CAPACITY;
use crate::config::PumpConfig;
use crate::ml_engine::LoadedModel;
use crate::storage::PersistenceSink;

/// Wire queue, control channel, live state and processor together.
///
/// Returns the handles for the API and the consumer loop, which the caller
/// spawns exactly once.
pub fn build_pipeline(
    config: Arc<PumpConfig>,
    model: LoadedModel,
    sink: Arc<dyn PersistenceSink>,
    cancel: CancellationToken,
) -> (AppState, ProcessingLoop) {
    let (queue, receiver) = ingestion_queue(config.pipeline.queue_capacity);
    let (control, control_rx) = control_channel(CONTROL_CHANNEL_CAPACITY);
    let live = Arc::new(LiveState::new());

    let mut processor = StreamProcessor::new(
        &config,
        &model,
        Arc::clone(&sink),
        Arc::clone(&live),
        queue.stats(),
    );
    processor.seed_open_events();

    let replay = Arc::new(ReplayController::new(
        queue.clone(),
        control.clone(),
        cancel.clone(),
        config.pump.default_source.clone(),
        config.replay.csv_path.as_ref().map(PathBuf::from),
        config.replay.interval_ms,
    ));

    let processing_loop = ProcessingLoop::new(
        processor,
        receiver,
        control_rx,
        Arc::clone(&live),
        cancel,
        config.pipeline.progress_log_interval,
    );

    let state = AppState {
        model: ModelInfo::from_loaded(&model, config.pipeline.window_size),
        config,
        queue,
        control,
        live,
        sink,
        replay,
        started_at: Utc::now(),
    };

    (state, processing_loop)
}
