//! Fixed min/max channel normalization.
//!
//! Bounds are established when the model is fitted and never change at
//! runtime. Values outside the fitted range map outside [0, 1]; they are not
//! clipped, so an out-of-range excursion still shows up as reconstruction
//! error.

use crate::config::ChannelFit;
use crate::types::NUM_CHANNELS;

#[derive(Debug, Clone, PartialEq)]
pub struct MinMaxNormalizer {
    min: [f64; NUM_CHANNELS],
    span: [f64; NUM_CHANNELS],
}

impl MinMaxNormalizer {
    /// Build from per-channel bounds. A degenerate span maps the channel to 0.
    pub fn new(min: [f64; NUM_CHANNELS], max: [f64; NUM_CHANNELS]) -> Self {
        let mut span = [0.0; NUM_CHANNELS];
        for i in 0..NUM_CHANNELS {
            span[i] = max[i] - min[i];
        }
        Self { min, span }
    }

    pub fn from_fits(fits: &[ChannelFit; NUM_CHANNELS]) -> Self {
        Self::new(fits.map(|f| f.min), fits.map(|f| f.max))
    }

    pub fn normalize(&self, raw: &[f64; NUM_CHANNELS]) -> [f64; NUM_CHANNELS] {
        let mut out = [0.0; NUM_CHANNELS];
        for i in 0..NUM_CHANNELS {
            if self.span[i].abs() > f64::EPSILON {
                out[i] = (raw[i] - self.min[i]) / self.span[i];
            }
        }
        out
    }
}
