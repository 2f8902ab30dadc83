//! Recent availability history for trend and rate reporting.

use std::collections::VecDeque;

use sitewatch_types::Trend;

/// Maximum number of samples to keep.
const MAX_HISTORY_SIZE: usize = 60;

/// Available counts of recent live snapshots.
#[derive(Debug, Clone, Default)]
pub struct History {
    /// `(timestamp_ms, available)` samples, oldest first.
    samples: VecDeque<(u64, u32)>,
}

impl History {
    /// Create an empty history.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a sample.
    pub fn record(&mut self, timestamp_ms: u64, available: u32) {
        self.samples.push_back((timestamp_ms, available));
        if self.samples.len() > MAX_HISTORY_SIZE {
            self.samples.pop_front();
        }
    }

    /// Number of samples held.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Whether no samples are held.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Forget all samples.
    pub fn clear(&mut self) {
        self.samples.clear();
    }

    fn last_two(&self) -> Option<((u64, u32), (u64, u32))> {
        let len = self.samples.len();
        if len < 2 {
            return None;
        }
        Some((*self.samples.get(len - 2)?, *self.samples.get(len - 1)?))
    }

    /// Direction of the last change.
    pub fn trend(&self) -> Trend {
        match self.last_two() {
            Some(((_, before), (_, after))) if after > before => Trend::Rising,
            Some(((_, before), (_, after))) if after < before => Trend::Falling,
            _ => Trend::Steady,
        }
    }

    /// Change in available count per second over the last two samples.
    ///
    /// Returns None if there's not enough history or no time elapsed.
    pub fn rate_per_sec(&self) -> Option<f64> {
        let ((t0, before), (t1, after)) = self.last_two()?;
        let elapsed = t1.checked_sub(t0)? as f64 / 1000.0;
        if elapsed > 0.0 {
            Some((after as f64 - before as f64) / elapsed)
        } else {
            None
        }
    }
}
