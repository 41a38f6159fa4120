//! Built-in profile reconstructor.
//!
//! Reconstructs every time step as the healthy operating profile. The error
//! is the distance of the window from normal operation, which is what the
//! trained autoencoder approximates for this pump class.

use super::model::{check_window, mean_absolute_error, InferenceError, InferenceModel, ModelOutput, SequenceWindow};
use super::normalizer::MinMaxNormalizer;
use crate::config::ChannelFit;
use crate::types::NUM_CHANNELS;

#[derive(Debug, Clone)]
pub struct ProfileReconstructor {
    /// Normal profile in normalized space
    profile: [f64; NUM_CHANNELS],
    window_size: usize,
}

impl ProfileReconstructor {
    pub fn new(profile: [f64; NUM_CHANNELS], window_size: usize) -> Self {
        Self {
            profile,
            window_size,
        }
    }

    /// Normalize each channel's `normal` value with the fit bounds.
    pub fn from_fits(fits: &[ChannelFit; NUM_CHANNELS], normalizer: &MinMaxNormalizer, window_size: usize) -> Self {
        Self::new(normalizer.normalize(&fits.map(|f| f.normal)), window_size)
    }

    pub fn profile(&self) -> &[f64; NUM_CHANNELS] {
        &self.profile
    }
}

impl InferenceModel for ProfileReconstructor {
    fn infer(&self, window: &SequenceWindow) -> Result<ModelOutput, InferenceError> {
        check_window(window, self.window_size)?;
        mean_absolute_error(window, |_| self.profile)
    }

    fn name(&self) -> &str {
        "profile-reconstructor"
    }

    fn is_trained(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PumpConfig;
    use crate::types::Channel;

    fn model() -> (ProfileReconstructor, MinMaxNormalizer, [f64; NUM_CHANNELS]) {
        let fits = PumpConfig::default().channel_fits();
        let normalizer = MinMaxNormalizer::from_fits(&fits);
        let model = ProfileReconstructor::from_fits(&fits, &normalizer, 30);
        (model, normalizer, fits.map(|f| f.normal))
    }

    #[test]
    fn test_normal_window_has_zero_error() {
        let (model, normalizer, normal) = model();
        let window = SequenceWindow::new(vec![normalizer.normalize(&normal); 30]);
        let out = model.infer(&window).unwrap();
        assert!(out.reconstruction_error.abs() < 1e-12);
        assert!(out.channel_deltas.iter().all(|d| d.abs() < 1e-12));
    }

    #[test]
    fn test_single_channel_deviation() {
        let (model, normalizer, normal) = model();
        let mut hot = normal;
        // 65°C is 0.5 above the 40°C profile in normalized units
        hot[Channel::BearingTemperature.index()] = 65.0;
        let window = SequenceWindow::new(vec![normalizer.normalize(&hot); 30]);
        let out = model.infer(&window).unwrap();
        assert!((out.channel_deltas[Channel::BearingTemperature.index()] - 0.5).abs() < 1e-9);
        assert!((out.reconstruction_error - 0.05).abs() < 1e-9);
    }

    #[test]
    fn test_deterministic() {
        let (model, normalizer, normal) = model();
        let rows: Vec<_> = (0..30)
            .map(|i| {
                let mut r = normal;
                r[Channel::Vibration.index()] += i as f64 * 0.1;
                normalizer.normalize(&r)
            })
            .collect();
        let window = SequenceWindow::new(rows);
        let a = model.infer(&window).unwrap();
        let b = model.infer(&window).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_rejects_short_window() {
        let (model, normalizer, normal) = model();
        let window = SequenceWindow::new(vec![normalizer.normalize(&normal); 29]);
        assert!(matches!(
            model.infer(&window),
            Err(InferenceError::WindowShape { expected: 30, actual: 29 })
        ));
    }

    #[test]
    fn test_rejects_non_finite() {
        let (model, normalizer, normal) = model();
        let mut rows = vec![normalizer.normalize(&normal); 30];
        rows[4][2] = f64::NAN;
        assert!(matches!(
            model.infer(&SequenceWindow::new(rows)),
            Err(InferenceError::NonFinite { row: 4, channel: 2 })
        ));
    }
}
