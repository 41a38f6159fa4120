//! Sliding sequence window for one pump source.
//!
//! Holds raw readings in engineering units. Normalization is applied only
//! when a snapshot is taken, so stored readings keep their original units.

use std::collections::VecDeque;

use crate::ml_engine::{MinMaxNormalizer, SequenceWindow};
use crate::types::NUM_CHANNELS;

#[derive(Debug, Clone)]
pub struct SequenceBuffer {
    rows: VecDeque<[f64; NUM_CHANNELS]>,
    capacity: usize,
}

impl SequenceBuffer {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            rows: VecDeque::with_capacity(capacity + 1),
            capacity,
        }
    }

    /// Push the newest reading, evicting at most the single oldest one.
    pub fn append(&mut self, values: [f64; NUM_CHANNELS]) -> Option<[f64; NUM_CHANNELS]> {
        self.rows.push_back(values);
        if self.rows.len() > self.capacity {
            self.rows.pop_front()
        } else {
            None
        }
    }

    /// True once the window holds exactly `capacity` readings.
    pub fn is_ready(&self) -> bool {
        self.rows.len() == self.capacity
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.rows.clear();
    }

    /// Raw rows, oldest first.
    pub fn raw(&self) -> impl Iterator<Item = &[f64; NUM_CHANNELS]> {
        self.rows.iter()
    }

    /// Normalized copy of the retained rows, oldest first.
    pub fn snapshot(&self, normalizer: &MinMaxNormalizer) -> SequenceWindow {
        SequenceWindow::new(self.rows.iter().map(|r| normalizer.normalize(r)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(v: f64) -> [f64; NUM_CHANNELS] {
        [v; NUM_CHANNELS]
    }

    #[test]
    fn test_not_ready_before_thirty() {
        let mut buf = SequenceBuffer::new(30);
        for i in 0..29 {
            assert!(buf.append(row(i as f64)).is_none());
            assert!(!buf.is_ready());
        }
        buf.append(row(29.0));
        assert!(buf.is_ready());
        assert_eq!(buf.len(), 30);
    }

    #[test]
    fn test_evicts_exactly_oldest() {
        let mut buf = SequenceBuffer::new(30);
        for i in 0..30 {
            buf.append(row(i as f64));
        }
        for i in 30..45 {
            let evicted = buf.append(row(i as f64)).unwrap();
            assert_eq!(evicted, row((i - 30) as f64));
            assert_eq!(buf.len(), 30);
            assert!(buf.is_ready());
        }
        let first = buf.raw().next().unwrap();
        assert_eq!(*first, row(15.0));
    }

    #[test]
    fn test_clear_resets_readiness() {
        let mut buf = SequenceBuffer::new(3);
        for i in 0..3 {
            buf.append(row(i as f64));
        }
        assert!(buf.is_ready());
        buf.clear();
        assert!(!buf.is_ready());
        assert!(buf.is_empty());
    }

    #[test]
    fn test_snapshot_normalizes_without_touching_raw() {
        let normalizer = MinMaxNormalizer::new([0.0; NUM_CHANNELS], [100.0; NUM_CHANNELS]);
        let mut buf = SequenceBuffer::new(2);
        buf.append(row(25.0));
        buf.append(row(50.0));
        let window = buf.snapshot(&normalizer);
        assert_eq!(window.rows(), &[row(0.25), row(0.5)]);
        assert_eq!(*buf.raw().next().unwrap(), row(25.0));
    }
}
