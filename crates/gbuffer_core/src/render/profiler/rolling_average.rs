//! Fixed-window moving average

use std::collections::VecDeque;

/// Mean of the most recent `capacity` samples
#[derive(Debug, Clone)]
pub struct RollingAverage {
    samples: VecDeque<f64>,
    capacity: usize,
    sum: f64,
}

impl RollingAverage {
    /// Empty average over a window of `capacity` samples (at least 1)
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: VecDeque::with_capacity(capacity + 1),
            capacity,
            sum: 0.0,
        }
    }

    /// Add a sample, evicting the oldest once the window is full
    pub fn push(&mut self, sample: f64) {
        self.samples.push_back(sample);
        self.sum += sample;
        if self.samples.len() > self.capacity {
            if let Some(oldest) = self.samples.pop_front() {
                self.sum -= oldest;
            }
        }
    }

    /// Current mean, 0 when empty
    pub fn value(&self) -> f64 {
        if self.samples.is_empty() {
            0.0
        } else {
            self.sum / self.samples.len() as f64
        }
    }

    /// Samples in the window
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// No samples yet
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Drop every sample
    pub fn clear(&mut self) {
        self.samples.clear();
        self.sum = 0.0;
    }
}
