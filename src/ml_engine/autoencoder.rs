//! Linear autoencoder loaded from a JSON artifact.
//!
//! Each time step is encoded to a latent vector and decoded back:
//! `x̂ = D·(E·x + b_e) + b_d`. The artifact is produced offline by the
//! training pipeline; this module only evaluates it.

use serde::{Deserialize, Serialize};
use std::path::Path;

use super::model::{check_window, mean_absolute_error, InferenceError, InferenceModel, ModelOutput, SequenceWindow};
use crate::types::NUM_CHANNELS;

/// On-disk model artifact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelArtifact {
    #[serde(default = "default_artifact_name")]
    pub name: String,
    pub window_size: usize,
    /// Threshold calibrated at training time; overrides the configured one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threshold: Option<f64>,
    /// latent × channels
    pub encoder: Vec<Vec<f64>>,
    pub encoder_bias: Vec<f64>,
    /// channels × latent
    pub decoder: Vec<Vec<f64>>,
    pub decoder_bias: Vec<f64>,
}

fn default_artifact_name() -> String {
    "linear-autoencoder".to_string()
}

#[derive(Debug, Clone)]
pub struct LinearAutoencoder {
    name: String,
    window_size: usize,
    threshold: Option<f64>,
    encoder: Vec<[f64; NUM_CHANNELS]>,
    encoder_bias: Vec<f64>,
    decoder: [Vec<f64>; NUM_CHANNELS],
    decoder_bias: [f64; NUM_CHANNELS],
}

impl LinearAutoencoder {
    /// Read and validate an artifact file.
    pub fn load(path: &Path) -> Result<Self, InferenceError> {
        let contents = std::fs::read_to_string(path)?;
        let artifact: ModelArtifact = serde_json::from_str(&contents)
            .map_err(|e| InferenceError::Artifact(format!("{}: {e}", path.display())))?;
        Self::from_artifact(artifact)
    }

    pub fn from_artifact(artifact: ModelArtifact) -> Result<Self, InferenceError> {
        let latent = artifact.encoder.len();
        if latent == 0 {
            return Err(InferenceError::Artifact("encoder has no rows".into()));
        }
        if artifact.window_size == 0 {
            return Err(InferenceError::Artifact("window_size must be > 0".into()));
        }
        if let Some(t) = artifact.threshold {
            if !t.is_finite() || t <= 0.0 {
                return Err(InferenceError::Artifact(format!("threshold must be > 0 (got {t})")));
            }
        }

        let mut encoder = Vec::with_capacity(latent);
        for (i, row) in artifact.encoder.iter().enumerate() {
            let row: [f64; NUM_CHANNELS] = row.as_slice().try_into().map_err(|_| {
                InferenceError::Artifact(format!(
                    "encoder row {i} has {} columns, expected {NUM_CHANNELS}",
                    row.len()
                ))
            })?;
            encoder.push(row);
        }
        if artifact.encoder_bias.len() != latent {
            return Err(InferenceError::Artifact(format!(
                "encoder_bias has {} entries, expected {latent}",
                artifact.encoder_bias.len()
            )));
        }
        if artifact.decoder.len() != NUM_CHANNELS {
            return Err(InferenceError::Artifact(format!(
                "decoder has {} rows, expected {NUM_CHANNELS}",
                artifact.decoder.len()
            )));
        }
        if let Some((i, row)) = artifact.decoder.iter().enumerate().find(|(_, r)| r.len() != latent) {
            return Err(InferenceError::Artifact(format!(
                "decoder row {i} has {} columns, expected {latent}",
                row.len()
            )));
        }
        let decoder_bias: [f64; NUM_CHANNELS] =
            artifact.decoder_bias.as_slice().try_into().map_err(|_| {
                InferenceError::Artifact(format!(
                    "decoder_bias has {} entries, expected {NUM_CHANNELS}",
                    artifact.decoder_bias.len()
                ))
            })?;

        let all_finite = encoder.iter().flatten().all(|v| v.is_finite())
            && artifact.encoder_bias.iter().all(|v| v.is_finite())
            && artifact.decoder.iter().flatten().all(|v| v.is_finite())
            && decoder_bias.iter().all(|v| v.is_finite());
        if !all_finite {
            return Err(InferenceError::Artifact("weights contain NaN or infinity".into()));
        }

        let mut rows = artifact.decoder.into_iter();
        let decoder: [Vec<f64>; NUM_CHANNELS] = std::array::from_fn(|_| rows.next().unwrap_or_default());

        Ok(Self {
            name: artifact.name,
            window_size: artifact.window_size,
            threshold: artifact.threshold,
            encoder,
            encoder_bias: artifact.encoder_bias,
            decoder,
            decoder_bias,
        })
    }

    pub fn window_size(&self) -> usize {
        self.window_size
    }

    /// Threshold carried by the artifact, if any.
    pub fn threshold(&self) -> Option<f64> {
        self.threshold
    }

    pub fn latent_dim(&self) -> usize {
        self.encoder.len()
    }

    fn reconstruct(&self, x: &[f64; NUM_CHANNELS]) -> [f64; NUM_CHANNELS] {
        let z: Vec<f64> = self
            .encoder
            .iter()
            .zip(&self.encoder_bias)
            .map(|(row, b)| row.iter().zip(x).map(|(w, v)| w * v).sum::<f64>() + b)
            .collect();
        let mut out = self.decoder_bias;
        for (o, row) in out.iter_mut().zip(&self.decoder) {
            *o += row.iter().zip(&z).map(|(w, v)| w * v).sum::<f64>();
        }
        out
    }
}

impl InferenceModel for LinearAutoencoder {
    fn infer(&self, window: &SequenceWindow) -> Result<ModelOutput, InferenceError> {
        check_window(window, self.window_size)?;
        mean_absolute_error(window, |row| self.reconstruct(row))
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn is_trained(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Identity through a full-rank latent space.
    fn identity_artifact() -> ModelArtifact {
        let mut eye = vec![vec![0.0; NUM_CHANNELS]; NUM_CHANNELS];
        for (i, row) in eye.iter_mut().enumerate() {
            row[i] = 1.0;
        }
        ModelArtifact {
            name: "identity".into(),
            window_size: 30,
            threshold: Some(0.08),
            encoder: eye.clone(),
            encoder_bias: vec![0.0; NUM_CHANNELS],
            decoder: eye,
            decoder_bias: vec![0.0; NUM_CHANNELS],
        }
    }

    #[test]
    fn test_identity_reconstructs_perfectly() {
        let model = LinearAutoencoder::from_artifact(identity_artifact()).unwrap();
        let window = SequenceWindow::new(vec![[0.3; NUM_CHANNELS]; 30]);
        let out = model.infer(&window).unwrap();
        assert!(out.reconstruction_error.abs() < 1e-12);
        assert_eq!(model.threshold(), Some(0.08));
        assert!(model.is_trained());
    }

    #[test]
    fn test_bias_shows_up_as_error() {
        let mut artifact = identity_artifact();
        artifact.decoder_bias[0] = 0.5;
        let model = LinearAutoencoder::from_artifact(artifact).unwrap();
        let out = model.infer(&SequenceWindow::new(vec![[0.3; NUM_CHANNELS]; 30])).unwrap();
        assert!((out.channel_deltas[0] - 0.5).abs() < 1e-12);
        assert!((out.reconstruction_error - 0.05).abs() < 1e-12);
    }

    #[test]
    fn test_bottleneck_shape() {
        let artifact = ModelArtifact {
            name: "bottleneck".into(),
            window_size: 30,
            threshold: None,
            encoder: vec![vec![0.1; NUM_CHANNELS]; 3],
            encoder_bias: vec![0.0; 3],
            decoder: vec![vec![0.2; 3]; NUM_CHANNELS],
            decoder_bias: vec![0.0; NUM_CHANNELS],
        };
        let model = LinearAutoencoder::from_artifact(artifact).unwrap();
        assert_eq!(model.latent_dim(), 3);
        assert!(model.infer(&SequenceWindow::new(vec![[0.5; NUM_CHANNELS]; 30])).is_ok());
    }

    #[test]
    fn test_rejects_bad_shapes() {
        let mut a = identity_artifact();
        a.encoder[2].pop();
        assert!(matches!(LinearAutoencoder::from_artifact(a), Err(InferenceError::Artifact(_))));

        let mut a = identity_artifact();
        a.decoder.pop();
        assert!(matches!(LinearAutoencoder::from_artifact(a), Err(InferenceError::Artifact(_))));

        let mut a = identity_artifact();
        a.encoder_bias.push(1.0);
        assert!(matches!(LinearAutoencoder::from_artifact(a), Err(InferenceError::Artifact(_))));

        let mut a = identity_artifact();
        a.decoder_bias[3] = f64::NAN;
        assert!(matches!(LinearAutoencoder::from_artifact(a), Err(InferenceError::Artifact(_))));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.json");
        std::fs::write(&path, serde_json::to_string(&identity_artifact()).unwrap()).unwrap();
        let model = LinearAutoencoder::load(&path).unwrap();
        assert_eq!(model.name(), "identity");
        assert_eq!(model.window_size(), 30);

        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(LinearAutoencoder::load(&path), Err(InferenceError::Artifact(_))));
    }
}
