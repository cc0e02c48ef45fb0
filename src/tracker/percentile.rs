//! Reservoir-based approximate percentiles.
//!
//! A fixed-capacity ring of raw samples plus a pre-allocated sort scratch.
//! Ingestion is constant-time; the sorted pass only runs when the cached
//! (P50, P95, P99) triple has gone stale, which is bounded at ~10% reservoir
//! turnover.

use std::time::Duration;

pub(crate) struct PercentileState {
    samples: Vec<i64>,
    capacity: usize,
    /// Next write slot; advances through the fill phase and wraps once full.
    write_index: usize,
    scratch: Vec<i64>,
    cached: (i64, i64, i64),
    last_calc_index: usize,
    cache_valid: bool,
}

impl PercentileState {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            samples: Vec::with_capacity(capacity),
            capacity,
            write_index: 0,
            scratch: vec![0; capacity],
            cached: (0, 0, 0),
            last_calc_index: 0,
            cache_valid: false,
        }
    }

    /// Store one raw sample and invalidate the cache once turnover since the
    /// last computation reaches a tenth of the reservoir.
    pub(crate) fn record(&mut self, value: i64) {
        if self.samples.len() < self.capacity {
            self.samples.push(value);
        } else {
            self.samples[self.write_index] = value;
        }
        self.write_index = (self.write_index + 1) % self.capacity;

        let since_last_calc =
            (self.write_index + self.capacity - self.last_calc_index) % self.capacity;
        if since_last_calc >= self.capacity / 10 {
            self.cache_valid = false;
        }
    }

    /// Return (P50, P95, P99), refreshing the cache if needed.
    ///
    /// Fewer than ten samples yields all zeros.
    pub(crate) fn percentiles(&mut self) -> (Duration, Duration, Duration) {
        if self.cache_valid {
            return as_durations(self.cached);
        }

        let count = self.samples.len();
        if count < 10 {
            return (Duration::ZERO, Duration::ZERO, Duration::ZERO);
        }

        self.scratch[..count].copy_from_slice(&self.samples);
        let sorted = &mut self.scratch[..count];
        sorted.sort_unstable();

        let index = |p: usize| ((count * p) / 100).min(count - 1);
        self.cached = (sorted[index(50)], sorted[index(95)], sorted[index(99)]);
        self.last_calc_index = self.write_index;
        self.cache_valid = true;

        as_durations(self.cached)
    }
}

fn as_durations((p50, p95, p99): (i64, i64, i64)) -> (Duration, Duration, Duration) {
    (
        Duration::from_nanos(p50.max(0) as u64),
        Duration::from_nanos(p95.max(0) as u64),
        Duration::from_nanos(p99.max(0) as u64),
    )
}
