//! Finite replay driver
//!
//! Pushes a bounded dataset through the ingestion queue at a fixed pace.
//! Each run first asks the consumer to reset the source, so the new dataset
//! starts from an empty window and fresh counters. Rejected submissions are counted and never retried. When the source is
//! exhausted an end-of-replay marker follows the last reading, and the
//! consumer marks the source COMPLETED on reaching it.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use super::control::ControlHandle;
use super::queue::{IngestionQueue, QueueError};
use super::source::{CsvSource, ReadingSource, SourceEvent};
use crate::config::defaults::REPLAY_MARKER_RETRY_MS;

#[derive(Debug, thiserror::Error)]
pub enum ReplayError {
    #[error("a replay is already running")]
    AlreadyRunning,

    #[error("no replay file given and none configured")]
    NoSource,

    #[error("replay file {0} contains no readings")]
    Empty(PathBuf),

    #[error("failed to load replay: {0}")]
    Load(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReplayState {
    Running,
    /// Every reading submitted and the end marker enqueued
    Finished,
    /// Stopped by an operator or shutdown before exhaustion
    Stopped,
}

impl ReplayState {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => ReplayState::Running,
            1 => ReplayState::Finished,
            _ => ReplayState::Stopped,
        }
    }

    fn as_u8(self) -> u8 {
        match self {
            ReplayState::Running => 0,
            ReplayState::Finished => 1,
            ReplayState::Stopped => 2,
        }
    }
}

/// Point-in-time view of a replay run.
#[derive(Debug, Clone, Serialize)]
pub struct ReplayProgress {
    pub state: ReplayState,
    pub source: String,
    pub path: String,
    /// Readings submitted so far, accepted or rejected
    pub current: u64,
    pub total: u64,
    pub rejected: u64,
    pub interval_ms: u64,
    pub started_at: DateTime<Utc>,
}

/// Shared bookkeeping for one replay run.
#[derive(Debug)]
pub struct ReplayRun {
    source: String,
    path: String,
    total: u64,
    interval_ms: u64,
    started_at: DateTime<Utc>,
    current: AtomicU64,
    rejected: AtomicU64,
    state: AtomicU8,
    cancel: CancellationToken,
}

impl ReplayRun {
    fn new(source: &str, path: &str, total: u64, interval_ms: u64, cancel: CancellationToken) -> Self {
        Self {
            source: source.to_string(),
            path: path.to_string(),
            total,
            interval_ms,
            started_at: Utc::now(),
            current: AtomicU64::new(0),
            rejected: AtomicU64::new(0),
            state: AtomicU8::new(ReplayState::Running.as_u8()),
            cancel,
        }
    }

    pub fn state(&self) -> ReplayState {
        ReplayState::from_u8(self.state.load(Ordering::Acquire))
    }

    fn set_state(&self, state: ReplayState) {
        self.state.store(state.as_u8(), Ordering::Release);
    }

    pub fn progress(&self) -> ReplayProgress {
        ReplayProgress {
            state: self.state(),
            source: self.source.clone(),
            path: self.path.clone(),
            current: self.current.load(Ordering::Relaxed),
            total: self.total,
            rejected: self.rejected.load(Ordering::Relaxed),
            interval_ms: self.interval_ms,
            started_at: self.started_at,
        }
    }
}

/// Starts, stops and reports on replay runs. At most one runs at a time.
#[derive(Debug)]
pub struct ReplayController {
    queue: IngestionQueue,
    control: ControlHandle,
    /// Parent token; each run gets a child so stopping one run leaves the
    /// rest of the process alone
    shutdown: CancellationToken,
    default_source: String,
    default_path: Option<PathBuf>,
    default_interval_ms: u64,
    active: Mutex<Option<Arc<ReplayRun>>>,
}

impl ReplayController {
    pub fn new(
        queue: IngestionQueue,
        control: ControlHandle,
        shutdown: CancellationToken,
        default_source: impl Into<String>,
        default_path: Option<PathBuf>,
        default_interval_ms: u64,
    ) -> Self {
        Self {
            queue,
            control,
            shutdown,
            default_source: default_source.into(),
            default_path,
            default_interval_ms,
            active: Mutex::new(None),
        }
    }

    /// Load a CSV dataset and start replaying it.
    pub async fn start(
        &self,
        path: Option<&Path>,
        interval_ms: Option<u64>,
    ) -> Result<ReplayProgress, ReplayError> {
        let path = path
            .map(Path::to_path_buf)
            .or_else(|| self.default_path.clone())
            .ok_or(ReplayError::NoSource)?;
        let interval_ms = interval_ms.unwrap_or(self.default_interval_ms);

        let mut active = self.active.lock().await;
        if active.as_ref().is_some_and(|run| run.state() == ReplayState::Running) {
            return Err(ReplayError::AlreadyRunning);
        }

        let source = CsvSource::open(&path, &self.default_source, interval_ms)
            .map_err(|e| ReplayError::Load(format!("{e:#}")))?;
        if source.is_empty() {
            return Err(ReplayError::Empty(path));
        }

        if let Err(e) = self.control.reset_source(&self.default_source).await {
            warn!(source = %self.default_source, error = %e, "Could not reset source before replay");
        }

        let run = Arc::new(ReplayRun::new(
            &self.default_source,
            &path.display().to_string(),
            source.total().unwrap_or(0),
            interval_ms,
            self.shutdown.child_token(),
        ));
        info!(
            path = %path.display(),
            total = run.total,
            interval_ms,
            source = %self.default_source,
            "▶️ Replay started"
        );
        tokio::spawn(drive(source, Arc::clone(&run), self.queue.clone()));
        let progress = run.progress();
        *active = Some(run);
        Ok(progress)
    }

    /// Stop the running replay. Returns its frozen progress, or `None` when
    /// nothing was running.
    pub async fn stop(&self) -> Option<ReplayProgress> {
        let active = self.active.lock().await;
        let run = active.as_ref()?;
        if run.state() != ReplayState::Running {
            return None;
        }
        run.cancel.cancel();
        run.set_state(ReplayState::Stopped);
        info!(path = %run.path, "⏹️ Replay stopped");
        Some(run.progress())
    }

    /// Progress of the current or most recent run.
    pub async fn progress(&self) -> Option<ReplayProgress> {
        self.active.lock().await.as_ref().map(|run| run.progress())
    }
}

/// Feed `source` into the queue until exhausted or cancelled.
pub async fn drive<S: ReadingSource>(mut source: S, run: Arc<ReplayRun>, queue: IngestionQueue) {
    loop {
        let event = tokio::select! {
            _ = run.cancel.cancelled() => {
                run.set_state(ReplayState::Stopped);
                return;
            }
            event = source.next_reading() => event,
        };

        match event {
            Ok(SourceEvent::Reading(reading)) => {
                match queue.submit(reading) {
                    Ok(()) => {}
                    Err(QueueError::Full) => {
                        let rejected = run.rejected.fetch_add(1, Ordering::Relaxed) + 1;
                        if rejected == 1 || rejected % 100 == 0 {
                            warn!(rejected, "Replay reading rejected, ingestion queue full");
                        }
                    }
                    Err(QueueError::Closed) => {
                        run.set_state(ReplayState::Stopped);
                        return;
                    }
                }
                run.current.fetch_add(1, Ordering::Relaxed);
            }
            Ok(SourceEvent::Eof) => break,
            Err(e) => {
                error!(source = source.source_name(), error = %e, "Replay source failed");
                run.set_state(ReplayState::Stopped);
                return;
            }
        }
    }

    // The marker must land behind the last reading; wait for room.
    loop {
        match queue.submit_end_of_replay(&run.source) {
            Ok(()) => break,
            Err(QueueError::Full) => {
                tokio::select! {
                    _ = run.cancel.cancelled() => {
                        run.set_state(ReplayState::Stopped);
                        return;
                    }
                    _ = tokio::time::sleep(tokio::time::Duration::from_millis(REPLAY_MARKER_RETRY_MS)) => {}
                }
            }
            Err(QueueError::Closed) => {
                run.set_state(ReplayState::Stopped);
                return;
            }
        }
    }

    run.set_state(ReplayState::Finished);
    info!(
        total = run.total,
        rejected = run.rejected.load(Ordering::Relaxed),
        "Replay source exhausted"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::control::{control_channel, ControlCommand};
    use crate::pipeline::queue::{ingestion_queue, QueueItem};
    use crate::types::{SensorReading, NUM_CHANNELS};

    fn readings(n: usize) -> Vec<SensorReading> {
        (0..n)
            .map(|i| SensorReading::new("pump-01", Utc::now(), [i as f64; NUM_CHANNELS]))
            .collect()
    }

    #[tokio::test]
    async fn test_drive_submits_all_then_marker() {
        let (queue, mut rx) = ingestion_queue(16);
        let run = Arc::new(ReplayRun::new("pump-01", "mem", 3, 0, CancellationToken::new()));
        drive(CsvSource::new("mem", readings(3), 0), Arc::clone(&run), queue.clone()).await;

        let progress = run.progress();
        assert_eq!(progress.state, ReplayState::Finished);
        assert_eq!(progress.current, 3);
        assert_eq!(progress.rejected, 0);

        assert_eq!(queue.depth(), 4);
        let cancel = CancellationToken::new();
        let mut items = Vec::new();
        for _ in 0..4 {
            items.extend(rx.take(&cancel).await);
        }
        assert_eq!(items.len(), 4);
        assert_eq!(queue.depth(), 0);
        assert!(matches!(items[3], QueueItem::EndOfReplay { ref source } if source == "pump-01"));
    }

    #[tokio::test]
    async fn test_drive_counts_rejections() {
        let (queue, mut rx) = ingestion_queue(2);
        let run = Arc::new(ReplayRun::new("pump-01", "mem", 5, 0, CancellationToken::new()));
        let handle = tokio::spawn(drive(CsvSource::new("mem", readings(5), 0), Arc::clone(&run), queue));

        // Marker waits for room; draining lets it through
        let cancel = CancellationToken::new();
        let mut seen_marker = false;
        while !seen_marker {
            if let Some(QueueItem::EndOfReplay { .. }) = rx.take(&cancel).await {
                seen_marker = true;
            }
        }
        handle.await.unwrap();
        let progress = run.progress();
        assert_eq!(progress.current, 5);
        assert_eq!(progress.rejected, 3);
        assert_eq!(progress.state, ReplayState::Finished);
    }

    #[tokio::test]
    async fn test_stop_cancels_run() {
        let (queue, _rx) = ingestion_queue(1000);
        let run = Arc::new(ReplayRun::new("pump-01", "mem", 100, 1000, CancellationToken::new()));
        let handle = tokio::spawn(drive(CsvSource::new("mem", readings(100), 1000), Arc::clone(&run), queue));
        tokio::time::sleep(tokio::time::Duration::from_millis(50)).await;
        run.cancel.cancel();
        handle.await.unwrap();
        let progress = run.progress();
        assert_eq!(progress.state, ReplayState::Stopped);
        assert_eq!(progress.current, 1);
    }

    #[tokio::test]
    async fn test_controller_without_source() {
        let (queue, _rx) = ingestion_queue(4);
        let (control, mut control_rx) = control_channel(4);
        let controller =
            ReplayController::new(queue, control, CancellationToken::new(), "pump-01", None, 0);
        assert!(matches!(controller.start(None, None).await, Err(ReplayError::NoSource)));
        // A rejected start leaves the source alone
        assert!(control_rx.try_recv().is_err());
        assert!(controller.stop().await.is_none());
        assert!(controller.progress().await.is_none());
    }

    #[tokio::test]
    async fn test_controller_start_and_stop() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pump.csv");
        let mut file = std::fs::File::create(&path).unwrap();
        crate::acquisition::write_csv_readings(&mut file, &readings(50)).unwrap();
        drop(file);

        let (queue, _rx) = ingestion_queue(1000);
        let (control, mut control_rx) = control_channel(4);
        let controller =
            ReplayController::new(queue, control, CancellationToken::new(), "pump-01", None, 1000);
        let started = controller.start(Some(&path), None).await.unwrap();
        assert_eq!(started.total, 50);
        assert_eq!(started.state, ReplayState::Running);
        match control_rx.try_recv() {
            Ok(ControlCommand::ResetSource { source }) => assert_eq!(source, "pump-01"),
            other => panic!("expected a source reset, got {other:?}"),
        }
        assert!(matches!(
            controller.start(Some(&path), None).await,
            Err(ReplayError::AlreadyRunning)
        ));

        let stopped = controller.stop().await.unwrap();
        assert_eq!(stopped.state, ReplayState::Stopped);
        assert!(controller.stop().await.is_none());
        assert_eq!(controller.progress().await.unwrap().state, ReplayState::Stopped);
    }
}
