//! Inference engine
//!
//! Turns a normalized sequence window into a reconstruction error.
//!
//! ## Architecture
//! - `normalizer`: fixed min/max scaling established at fit time
//! - `model`: the `InferenceModel` trait, window type and errors
//! - `profile`: built-in reconstructor against the healthy profile
//! - `autoencoder`: linear autoencoder evaluated from a JSON artifact
//!
//! `load_model` picks the artifact when one is configured and valid, and
//! otherwise falls back to the profile model (reported as SIMULATED).

pub mod autoencoder;
pub mod model;
pub mod normalizer;
pub mod profile;

pub use autoencoder::{LinearAutoencoder, ModelArtifact};
pub use model::{InferenceError, InferenceModel, ModelOutput, ModelStatus, SequenceWindow};
pub use normalizer::MinMaxNormalizer;
pub use profile::ProfileReconstructor;

use std::path::Path;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::config::PumpConfig;

/// The model chosen at startup plus the parameters the processor needs.
#[derive(Clone)]
pub struct LoadedModel {
    pub model: Arc<dyn InferenceModel>,
    pub normalizer: MinMaxNormalizer,
    /// Effective anomaly threshold (artifact threshold wins over config)
    pub threshold: f64,
}

impl std::fmt::Debug for LoadedModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadedModel")
            .field("model", &self.model.name())
            .field("status", &self.model.status())
            .field("threshold", &self.threshold)
            .finish()
    }
}

/// Load the configured model, falling back to the built-in profile model.
pub fn load_model(config: &PumpConfig) -> LoadedModel {
    let fits = config.channel_fits();
    let normalizer = MinMaxNormalizer::from_fits(&fits);
    let window_size = config.pipeline.window_size;
    let path = config.model.artifact_path.trim();

    if !path.is_empty() {
        let path = Path::new(path);
        if path.exists() {
            match LinearAutoencoder::load(path) {
                Ok(model) if model.window_size() == window_size => {
                    let threshold = model.threshold().unwrap_or(config.model.threshold);
                    info!(
                        path = %path.display(),
                        model = %model.name(),
                        latent = model.latent_dim(),
                        threshold,
                        "🧠 Loaded model artifact"
                    );
                    return LoadedModel {
                        model: Arc::new(model),
                        normalizer,
                        threshold,
                    };
                }
                Ok(model) => {
                    error!(
                        path = %path.display(),
                        artifact_window = model.window_size(),
                        window_size,
                        "Model artifact window size does not match pipeline, using profile model"
                    );
                }
                Err(e) => {
                    error!(path = %path.display(), error = %e, "Failed to load model artifact, using profile model");
                }
            }
        } else {
            warn!(path = %path.display(), "Model artifact not found, using profile model (SIMULATED)");
        }
    }

    profile_model(config, normalizer)
}

fn profile_model(config: &PumpConfig, normalizer: MinMaxNormalizer) -> LoadedModel {
    let model = ProfileReconstructor::from_fits(
        &config.channel_fits(),
        &normalizer,
        config.pipeline.window_size,
    );
    LoadedModel {
        model: Arc::new(model),
        normalizer,
        threshold: config.model.threshold,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::NUM_CHANNELS;

    #[test]
    fn test_missing_artifact_falls_back() {
        let mut config = PumpConfig::default();
        config.model.artifact_path = "/nonexistent/model.json".into();
        let loaded = load_model(&config);
        assert_eq!(loaded.model.status(), ModelStatus::Simulated);
        assert_eq!(loaded.threshold, 0.05);
    }

    #[test]
    fn test_malformed_artifact_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.json");
        std::fs::write(&path, r#"{"window_size": 30, "encoder": [], "encoder_bias": [], "decoder": [], "decoder_bias": []}"#).unwrap();
        let mut config = PumpConfig::default();
        config.model.artifact_path = path.display().to_string();
        assert_eq!(load_model(&config).model.status(), ModelStatus::Simulated);
    }

    #[test]
    fn test_valid_artifact_threshold_wins() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.json");
        let artifact = ModelArtifact {
            name: "ae-v3".into(),
            window_size: 30,
            threshold: Some(0.07),
            encoder: vec![vec![0.1; NUM_CHANNELS]; 4],
            encoder_bias: vec![0.0; 4],
            decoder: vec![vec![0.1; 4]; NUM_CHANNELS],
            decoder_bias: vec![0.0; NUM_CHANNELS],
        };
        std::fs::write(&path, serde_json::to_string(&artifact).unwrap()).unwrap();
        let mut config = PumpConfig::default();
        config.model.artifact_path = path.display().to_string();
        let loaded = load_model(&config);
        assert_eq!(loaded.model.status(), ModelStatus::Loaded);
        assert_eq!(loaded.model.name(), "ae-v3");
        assert_eq!(loaded.threshold, 0.07);
    }

    #[test]
    fn test_window_mismatch_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.json");
        let artifact = ModelArtifact {
            name: "short".into(),
            window_size: 10,
            threshold: None,
            encoder: vec![vec![0.1; NUM_CHANNELS]; 2],
            encoder_bias: vec![0.0; 2],
            decoder: vec![vec![0.1; 2]; NUM_CHANNELS],
            decoder_bias: vec![0.0; NUM_CHANNELS],
        };
        std::fs::write(&path, serde_json::to_string(&artifact).unwrap()).unwrap();
        let mut config = PumpConfig::default();
        config.model.artifact_path = path.display().to_string();
        assert_eq!(load_model(&config).model.status(), ModelStatus::Simulated);
    }
}
