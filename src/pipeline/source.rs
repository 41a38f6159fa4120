//! Reading source abstraction for finite replays.
//!
//! The replay driver pulls readings from a [`ReadingSource`] and submits them
//! through the same ingestion path HTTP producers use.

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::Path;

use crate::acquisition::read_csv_readings;
use crate::types::SensorReading;

/// Events produced by a reading source.
#[derive(Debug)]
pub enum SourceEvent {
    Reading(SensorReading),
    /// Source exhausted; a replay never loops.
    Eof,
}

/// Trait abstracting where replayed readings come from.
///
/// Implementations handle pacing internally. The replay driver calls
/// [`next_reading`](ReadingSource::next_reading) in a `select!` with
/// cancellation.
#[async_trait]
pub trait ReadingSource: Send + 'static {
    async fn next_reading(&mut self) -> Result<SourceEvent>;

    /// Human-readable name for logging.
    fn source_name(&self) -> &str;

    /// Number of readings this source will yield, when known up front.
    fn total(&self) -> Option<u64> {
        None
    }
}

// ============================================================================
// CSV Source (dataset replay)
// ============================================================================

/// Replays pre-loaded readings with a fixed inter-reading delay.
pub struct CsvSource {
    name: String,
    readings: std::vec::IntoIter<SensorReading>,
    total: u64,
    delay_ms: u64,
    yielded_first: bool,
}

impl CsvSource {
    pub fn new(name: impl Into<String>, readings: Vec<SensorReading>, delay_ms: u64) -> Self {
        Self {
            name: name.into(),
            total: readings.len() as u64,
            readings: readings.into_iter(),
            delay_ms,
            yielded_first: false,
        }
    }

    /// Load an entire dataset export up front, stamping every row with `source`.
    pub fn open(path: &Path, source: &str, delay_ms: u64) -> Result<Self> {
        let readings = read_csv_readings(path, source)
            .with_context(|| format!("loading replay CSV {}", path.display()))?;
        Ok(Self::new(path.display().to_string(), readings, delay_ms))
    }

    pub fn is_empty(&self) -> bool {
        self.total == 0
    }
}

#[async_trait]
impl ReadingSource for CsvSource {
    async fn next_reading(&mut self) -> Result<SourceEvent> {
        // No delay before the first reading
        if self.yielded_first && self.delay_ms > 0 {
            tokio::time::sleep(tokio::time::Duration::from_millis(self.delay_ms)).await;
        }
        match self.readings.next() {
            Some(r) => {
                self.yielded_first = true;
                Ok(SourceEvent::Reading(r))
            }
            None => Ok(SourceEvent::Eof),
        }
    }

    fn source_name(&self) -> &str {
        &self.name
    }

    fn total(&self) -> Option<u64> {
        Some(self.total)
    }
}
