//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the
//! admission gate. All types derive Serde traits for deserialization from
//! config files; every field has a default so minimal configs work.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::level::Thresholds;
use crate::tracker::TrackerOptions;

/// Root configuration for an admission gate.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GateConfig {
    /// Maximum number of per-endpoint trackers kept in the registry.
    pub cache_size: usize,

    /// Idle time after which a tracker is considered stale, in seconds.
    pub cache_ttl_secs: u64,

    /// Event buffer between the admission path and the tracker worker.
    pub dispatcher_buffer_size: usize,

    /// Latency thresholds that drive classification.
    pub thresholds: ThresholdConfig,

    /// Endpoint-key prefixes that bypass admission control entirely.
    pub skip_keys: Vec<String>,

    /// Enable the periodic registry/dispatcher report.
    pub enable_metrics: bool,

    /// Reporting interval in seconds.
    pub metrics_interval_secs: u64,

    /// Circuit breaker settings.
    pub circuit_breaker: CircuitBreakerConfig,

    /// Per-endpoint tracker settings.
    pub tracker: TrackerConfig,

    /// Retry-after hints attached to rejections, in seconds.
    pub retry_after: RetryAfterConfig,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            cache_size: 512,
            cache_ttl_secs: 120,
            dispatcher_buffer_size: 1024,
            thresholds: ThresholdConfig::default(),
            skip_keys: vec![
                "/health".to_string(),
                "/metrics".to_string(),
                "/readiness".to_string(),
            ],
            enable_metrics: true,
            metrics_interval_secs: 60,
            circuit_breaker: CircuitBreakerConfig::default(),
            tracker: TrackerConfig::default(),
            retry_after: RetryAfterConfig::default(),
        }
    }
}

impl GateConfig {
    /// Default configuration for gRPC services: identical except the skip
    /// prefixes cover the health and reflection services.
    pub fn for_grpc() -> Self {
        Self {
            skip_keys: vec!["/grpc.health.".to_string(), "/grpc.reflection.".to_string()],
            ..Self::default()
        }
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn metrics_interval(&self) -> Duration {
        Duration::from_secs(self.metrics_interval_secs)
    }
}

/// Latency thresholds, in milliseconds.
#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
#[serde(default)]
pub struct ThresholdConfig {
    pub p99_emergency_ms: u64,
    pub p95_critical_ms: u64,
    pub ema_critical_ms: u64,
    pub p95_moderate_ms: u64,
    pub ema_warning_ms: u64,
    pub slope_warning_ms: u64,
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            p99_emergency_ms: 10_000,
            p95_critical_ms: 2_000,
            ema_critical_ms: 500,
            p95_moderate_ms: 1_000,
            ema_warning_ms: 300,
            slope_warning_ms: 10,
        }
    }
}

impl ThresholdConfig {
    pub fn thresholds(&self) -> Thresholds {
        Thresholds {
            p99_emergency: Duration::from_millis(self.p99_emergency_ms),
            p95_critical: Duration::from_millis(self.p95_critical_ms),
            ema_critical: Duration::from_millis(self.ema_critical_ms),
            p95_moderate: Duration::from_millis(self.p95_moderate_ms),
            ema_warning: Duration::from_millis(self.ema_warning_ms),
            slope_warning: Duration::from_millis(self.slope_warning_ms),
        }
    }
}

/// Circuit breaker configuration.
#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
#[serde(default)]
pub struct CircuitBreakerConfig {
    /// Consecutive rejection-level failures before the circuit opens.
    pub max_failures: u32,

    /// Time the circuit stays open before probing, in seconds.
    pub timeout_secs: u64,

    /// Consecutive successes required to close again.
    pub success_threshold: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            max_failures: 3,
            timeout_secs: 30,
            success_threshold: 5,
        }
    }
}

impl CircuitBreakerConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Per-endpoint tracker configuration.
#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// EMA smoothing factor, clamped to [0.01, 0.99].
    pub alpha: f32,

    /// EMA window length for trend analysis, at least 4.
    pub window_size: usize,

    /// Percentile reservoir size, at least 10. Zero disables percentiles.
    pub sample_size: usize,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            alpha: 0.1,
            window_size: 50,
            sample_size: 200,
        }
    }
}

impl TrackerConfig {
    pub fn options(&self) -> TrackerOptions {
        TrackerOptions {
            alpha: self.alpha,
            window_size: self.window_size,
            sample_size: (self.sample_size > 0).then_some(self.sample_size),
        }
    }
}

/// Retry-after hints, in seconds, by rejection reason.
#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryAfterConfig {
    pub emergency_secs: u32,
    pub critical_secs: u32,
    pub circuit_secs: u32,
}

impl Default for RetryAfterConfig {
    fn default() -> Self {
        Self {
            emergency_secs: 10,
            critical_secs: 5,
            circuit_secs: 30,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_documented_values() {
        let config = GateConfig::default();
        assert_eq!(config.cache_size, 512);
        assert_eq!(config.cache_ttl(), Duration::from_secs(120));
        assert_eq!(config.dispatcher_buffer_size, 1024);
        assert_eq!(config.metrics_interval(), Duration::from_secs(60));
        assert_eq!(config.circuit_breaker.max_failures, 3);
        assert_eq!(config.circuit_breaker.timeout(), Duration::from_secs(30));
        assert_eq!(config.circuit_breaker.success_threshold, 5);
        assert_eq!(config.retry_after.emergency_secs, 10);
        assert_eq!(config.retry_after.critical_secs, 5);
        assert_eq!(config.retry_after.circuit_secs, 30);

        let thresholds = config.thresholds.thresholds();
        assert_eq!(thresholds.p99_emergency, Duration::from_secs(10));
        assert_eq!(thresholds.ema_warning, Duration::from_millis(300));
    }

    #[test]
    fn grpc_preset_differs_only_in_skip_keys() {
        let config = GateConfig::for_grpc();
        assert_eq!(config.skip_keys, ["/grpc.health.", "/grpc.reflection."]);
        assert_eq!(config.cache_size, GateConfig::default().cache_size);
        assert_eq!(config.tracker.sample_size, 200);
    }

    #[test]
    fn minimal_toml_fills_in_defaults() {
        let config: GateConfig = toml::from_str("cache_size = 64").expect("parses");
        assert_eq!(config.cache_size, 64);
        assert_eq!(config.tracker.sample_size, 200);
        assert!(config.enable_metrics);
    }

    #[test]
    fn zero_sample_size_disables_percentiles() {
        let config = TrackerConfig {
            sample_size: 0,
            ..TrackerConfig::default()
        };
        assert_eq!(config.options().sample_size, None);
    }
}
