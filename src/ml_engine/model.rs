//! Inference model interface.

use serde::Serialize;
use thiserror::Error;

use crate::types::NUM_CHANNELS;

/// A normalized, time-ordered sequence window (oldest first).
#[derive(Debug, Clone, PartialEq)]
pub struct SequenceWindow {
    rows: Vec<[f64; NUM_CHANNELS]>,
}

impl SequenceWindow {
    pub fn new(rows: Vec<[f64; NUM_CHANNELS]>) -> Self {
        Self { rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn rows(&self) -> &[[f64; NUM_CHANNELS]] {
        &self.rows
    }
}

/// Reconstruction error for one window.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelOutput {
    /// Mean absolute error over the whole window
    pub reconstruction_error: f64,
    /// Mean absolute error per channel
    pub channel_deltas: [f64; NUM_CHANNELS],
}

/// Whether the active model came from a trained artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ModelStatus {
    /// Trained artifact loaded
    Loaded,
    /// Built-in profile model in use
    Simulated,
}

#[derive(Debug, Error)]
pub enum InferenceError {
    #[error("window has {actual} rows, model expects {expected}")]
    WindowShape { expected: usize, actual: usize },

    #[error("window contains a non-finite value at row {row}, channel {channel}")]
    NonFinite { row: usize, channel: usize },

    #[error("model produced a non-finite reconstruction error")]
    NonFiniteOutput,

    #[error("model artifact error: {0}")]
    Artifact(String),

    #[error("model artifact I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A sequence-reconstruction model.
///
/// Implementations must be pure: the same window always yields the same
/// output, and `infer` never mutates model state.
pub trait InferenceModel: Send + Sync {
    fn infer(&self, window: &SequenceWindow) -> Result<ModelOutput, InferenceError>;

    fn name(&self) -> &str;

    /// True when backed by trained parameters rather than the built-in profile.
    fn is_trained(&self) -> bool;

    fn status(&self) -> ModelStatus {
        if self.is_trained() {
            ModelStatus::Loaded
        } else {
            ModelStatus::Simulated
        }
    }
}

/// Reject windows of the wrong length or carrying NaN/inf.
pub(crate) fn check_window(window: &SequenceWindow, expected: usize) -> Result<(), InferenceError> {
    if window.len() != expected {
        return Err(InferenceError::WindowShape {
            expected,
            actual: window.len(),
        });
    }
    for (row, values) in window.rows().iter().enumerate() {
        if let Some(channel) = values.iter().position(|v| !v.is_finite()) {
            return Err(InferenceError::NonFinite { row, channel });
        }
    }
    Ok(())
}

/// Mean absolute error between each row and its reconstruction.
pub(crate) fn mean_absolute_error<F>(window: &SequenceWindow, mut reconstruct: F) -> Result<ModelOutput, InferenceError>
where
    F: FnMut(&[f64; NUM_CHANNELS]) -> [f64; NUM_CHANNELS],
{
    let mut sums = [0.0; NUM_CHANNELS];
    for row in window.rows() {
        let recon = reconstruct(row);
        for i in 0..NUM_CHANNELS {
            sums[i] += (row[i] - recon[i]).abs();
        }
    }
    let n = window.len().max(1) as f64;
    let channel_deltas = sums.map(|s| s / n);
    let reconstruction_error = channel_deltas.iter().sum::<f64>() / NUM_CHANNELS as f64;
    if !reconstruction_error.is_finite() {
        return Err(InferenceError::NonFiniteOutput);
    }
    Ok(ModelOutput {
        reconstruction_error,
        channel_deltas,
    })
}
