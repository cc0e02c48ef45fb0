//! Per-endpoint latency statistics.
//!
//! # Responsibilities
//! - Maintain a fixed-point exponential moving average of observed latency
//! - Keep a sliding window of EMA values for slope/drift trend detection
//! - Optionally keep a reservoir of raw samples for P50/P95/P99
//! - Produce cheap value-copy snapshots for the classifier
//!
//! `process` is called by the dispatcher worker; `value` is called on the
//! admission path. The two sides synchronize through two small independent
//! locks that are never held at the same time.

mod percentile;

use std::time::Duration;

use parking_lot::{Mutex, RwLock};

use percentile::PercentileState;

/// Fixed-point scale for the EMA smoothing factor.
const SCALE: i64 = 1024;

/// Trend is recomputed once per this many samples.
const TREND_STRIDE: u64 = 8;

/// Snapshot of an endpoint's latency statistics.
///
/// Slope and drift are signed nanoseconds: latency can fall as well as rise.
/// Percentiles are zero when percentile tracking is disabled or fewer than
/// ten samples have been observed.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Stats {
    /// Exponential moving average of latency.
    pub ema: Duration,
    /// Mean per-step change of the EMA across the trend window.
    pub slope_ns: i64,
    /// Newer-half mean minus older-half mean of the trend window.
    pub drift_ns: i64,
    /// Drift relative to the older-half mean, in percent.
    pub percent_drift: f64,
    pub p50: Duration,
    pub p95: Duration,
    pub p99: Duration,
}

/// Construction options for a [`LatencyTracker`].
///
/// Out-of-range values are clamped, never rejected: alpha to `[0.01, 0.99]`,
/// window size to at least 4, reservoir size to at least 10.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackerOptions {
    /// EMA smoothing factor. Lower is smoother, higher is more responsive.
    pub alpha: f32,
    /// Number of EMA values retained for trend analysis.
    pub window_size: usize,
    /// Raw-sample reservoir size for percentiles; `None` disables them.
    pub sample_size: Option<usize>,
}

impl Default for TrackerOptions {
    fn default() -> Self {
        Self {
            alpha: 0.25,
            window_size: 20,
            sample_size: None,
        }
    }
}

impl TrackerOptions {
    /// Enable percentile tracking with the core default reservoir size.
    pub fn with_percentiles(mut self) -> Self {
        self.sample_size = Some(1000);
        self
    }
}

struct EmaState {
    ema_nanos: i64,
    window: Vec<i64>,
    process_count: u64,
    slope: i64,
    drift: i64,
    percent_drift: f64,
}

impl EmaState {
    /// Recompute slope and drift from the EMA window. Called every
    /// [`TREND_STRIDE`] samples under the write lock; the classifier
    /// tolerates the staleness.
    fn calculate_trend(&mut self) {
        let n = self.window.len();
        if n < 4 {
            self.slope = 0;
            self.drift = 0;
            self.percent_drift = 0.0;
            return;
        }

        let mut slope_sum = 0i64;
        for i in 1..n {
            slope_sum += self.window[i] - self.window[i - 1];
        }
        self.slope = slope_sum / (n as i64 - 1);

        let mid = n >> 1;
        let old_sum: i64 = self.window[..mid].iter().sum();
        let new_sum: i64 = self.window[mid..].iter().sum();

        let historical_avg = old_sum / mid as i64;
        let recent_avg = new_sum / (n - mid) as i64;
        self.drift = recent_avg - historical_avg;

        self.percent_drift = if historical_avg != 0 {
            self.drift as f64 / historical_avg as f64 * 100.0
        } else {
            0.0
        };
    }
}

/// Latency tracker for a single endpoint.
///
/// Shared between the registry (which hands out `Arc` clones to the
/// admission path) and the dispatcher worker (the sole writer).
pub struct LatencyTracker {
    alpha: i64,
    alpha_comp: i64,
    window_size: usize,
    ema: RwLock<EmaState>,
    percentile: Option<Mutex<PercentileState>>,
}

impl LatencyTracker {
    pub fn new(options: TrackerOptions) -> Self {
        let alpha = options.alpha.clamp(0.01, 0.99);
        let alpha_fixed = (alpha * SCALE as f32).round() as i64;
        let window_size = options.window_size.max(4);

        Self {
            alpha: alpha_fixed,
            alpha_comp: SCALE - alpha_fixed,
            window_size,
            ema: RwLock::new(EmaState {
                ema_nanos: 0,
                window: Vec::with_capacity(window_size),
                process_count: 0,
                slope: 0,
                drift: 0,
                percent_drift: 0.0,
            }),
            percentile: options
                .sample_size
                .map(|size| Mutex::new(PercentileState::new(size.max(10)))),
        }
    }

    /// Record one latency sample. Never fails, never blocks on the reader
    /// side for longer than the constant-time critical sections below.
    pub fn process(&self, sample: Duration) {
        let new_value = sample.as_nanos().min(i64::MAX as u128) as i64;

        {
            let mut state = self.ema.write();

            state.ema_nanos = if state.window.is_empty() {
                new_value
            } else {
                (self.alpha * new_value + self.alpha_comp * state.ema_nanos) >> 10
            };

            if state.window.len() < self.window_size {
                let ema = state.ema_nanos;
                state.window.push(ema);
            } else {
                state.window.rotate_left(1);
                let ema = state.ema_nanos;
                *state.window.last_mut().expect("window is non-empty") = ema;
            }

            state.process_count += 1;
            if state.process_count % TREND_STRIDE == 0 {
                state.calculate_trend();
            }
        }

        if let Some(percentile) = &self.percentile {
            percentile.lock().record(new_value);
        }
    }

    /// Snapshot the current statistics.
    ///
    /// Takes the EMA read lock briefly, releases it, then consults the
    /// percentile state (which may refresh its cache). Samples still queued
    /// in the dispatcher are not yet visible.
    pub fn value(&self) -> Stats {
        let mut stats = {
            let state = self.ema.read();
            Stats {
                ema: Duration::from_nanos(state.ema_nanos.max(0) as u64),
                slope_ns: state.slope,
                drift_ns: state.drift,
                percent_drift: state.percent_drift,
                p50: Duration::ZERO,
                p95: Duration::ZERO,
                p99: Duration::ZERO,
            }
        };

        if let Some(percentile) = &self.percentile {
            let (p50, p95, p99) = percentile.lock().percentiles();
            stats.p50 = p50;
            stats.p95 = p95;
            stats.p99 = p99;
        }

        stats
    }
}
