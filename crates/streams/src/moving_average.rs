//! Trailing moving-average accumulator.
//!
//! Keeps the last `window` samples and their running sum. No average is
//! produced until the window has filled, so a stream of N samples yields
//! `max(0, N - window + 1)` averages.
//!
//! The queue grows with the data rather than with the window, so an
//! arbitrarily large window costs nothing until samples arrive.

use std::collections::VecDeque;
use std::num::NonZeroUsize;

/// Upper bound on the queue capacity reserved at construction
const INITIAL_CAPACITY_LIMIT: usize = 1024;

/// Subtracting a value this many times larger than the remaining sum has
/// cancelled away at least half of the sum's significant bits.
const CANCELLATION_RATIO: f64 = (1u64 << 26) as f64;

/// Per-stream moving-average state
#[derive(Debug, Clone)]
pub struct MovingAverage {
    window: NonZeroUsize,
    queue: VecDeque<f64>,
    running_sum: f64,
    /// Recompute `running_sum` from `queue` every this many samples (0 = never)
    resum_interval: u64,
    since_resum: u64,
}

impl MovingAverage {
    pub fn new(window: NonZeroUsize) -> Self {
        Self::with_resum_interval(window, 0)
    }

    /// Create an engine that periodically rebuilds its running sum from the
    /// window contents, bounding floating-point drift on long streams.
    pub fn with_resum_interval(window: NonZeroUsize, resum_interval: u64) -> Self {
        Self {
            window,
            queue: VecDeque::with_capacity(window.get().min(INITIAL_CAPACITY_LIMIT) + 1),
            running_sum: 0.0,
            resum_interval,
            since_resum: 0,
        }
    }

    /// Feed one sample; returns the window mean once the window is full.
    ///
    /// The running sum is rebuilt from the window whenever evicting the oldest
    /// sample cancelled most of it, so a single large outlier leaving the
    /// window does not leave a permanent offset behind.
    pub fn observe(&mut self, value: f64) -> Option<f64> {
        self.queue.push_back(value);
        self.running_sum += value;

        if self.queue.len() > self.window.get() {
            if let Some(oldest) = self.queue.pop_front() {
                self.running_sum -= oldest;
                if !self.running_sum.is_finite()
                    || oldest.abs() > self.running_sum.abs() * CANCELLATION_RATIO
                {
                    self.resum();
                }
            }
        }

        if self.queue.len() == 1 {
            // exact for a one-sample window
            self.running_sum = value;
        }

        if self.resum_interval > 0 {
            self.since_resum += 1;
            if self.since_resum >= self.resum_interval {
                self.resum();
            }
        }

        if self.queue.len() < self.window.get() {
            None
        } else {
            Some(self.running_sum / self.window.get() as f64)
        }
    }

    fn resum(&mut self) {
        self.running_sum = self.queue.iter().sum();
        self.since_resum = 0;
    }

    pub fn window(&self) -> usize {
        self.window.get()
    }

    /// Number of samples currently held.
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.queue.len() == self.window.get()
    }

    pub fn running_sum(&self) -> f64 {
        self.running_sum
    }
}

/// Run a whole slice through a fresh engine.
pub fn moving_average(values: &[f64], window: NonZeroUsize) -> Vec<f64> {
    let mut engine = MovingAverage::new(window);
    values.iter().filter_map(|v| engine.observe(*v)).collect()
}
