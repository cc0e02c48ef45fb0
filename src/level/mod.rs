//! Load severity classification.
//!
//! Maps a tracker snapshot plus a set of thresholds to a [`Level`]. The
//! classifier is a pure function: no locks, no allocation, first matching
//! rule wins.

use std::fmt;
use std::time::Duration;

use crate::tracker::Stats;

/// Severity of the load on an endpoint, ordered from calm to on-fire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Level {
    Normal,
    Warning,
    Moderate,
    Critical,
    Emergency,
}

impl Level {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Level::Normal => "normal",
            Level::Warning => "warning",
            Level::Moderate => "moderate",
            Level::Critical => "critical",
            Level::Emergency => "emergency",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Latency thresholds that drive classification.
///
/// All values compare against tracker statistics; a request is rejected only
/// at [`Level::Critical`] and above.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Thresholds {
    /// P99 above this is an emergency.
    pub p99_emergency: Duration,
    /// P95 above this, combined with a critical EMA, is critical.
    pub p95_critical: Duration,
    /// EMA component of the critical rule.
    pub ema_critical: Duration,
    /// P95 above this alone is moderate.
    pub p95_moderate: Duration,
    /// EMA above this is a warning.
    pub ema_warning: Duration,
    /// EMA slope (per-step growth) above this is a warning.
    pub slope_warning: Duration,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            p99_emergency: Duration::from_secs(10),
            p95_critical: Duration::from_secs(2),
            ema_critical: Duration::from_millis(500),
            p95_moderate: Duration::from_secs(1),
            ema_warning: Duration::from_millis(300),
            slope_warning: Duration::from_millis(10),
        }
    }
}

impl Stats {
    /// Classify this snapshot with the default thresholds.
    pub fn level(&self) -> Level {
        self.level_with(&Thresholds::default())
    }

    /// Classify this snapshot against custom thresholds.
    ///
    /// When both P95 and P99 are populated the percentile rules apply; with
    /// percentiles disabled (or the reservoir still warming up) we fall back
    /// to slope-only detection. Rule order matters.
    pub fn level_with(&self, thresholds: &Thresholds) -> Level {
        let slope_warning = thresholds.slope_warning.as_nanos() as i64;

        if self.p95 > Duration::ZERO && self.p99 > Duration::ZERO {
            if self.p99 > thresholds.p99_emergency {
                Level::Emergency
            } else if self.p95 > thresholds.p95_critical && self.ema > thresholds.ema_critical {
                Level::Critical
            } else if self.p95 > thresholds.p95_moderate {
                Level::Moderate
            } else if self.ema > thresholds.ema_warning || self.slope_ns > slope_warning {
                Level::Warning
            } else {
                Level::Normal
            }
        } else if self.slope_ns > 5 * slope_warning / 10 {
            Level::Critical
        } else if self.slope_ns > 3 * slope_warning / 10 {
            Level::Moderate
        } else if self.slope_ns > slope_warning / 10 {
            Level::Warning
        } else {
            Level::Normal
        }
    }
}
