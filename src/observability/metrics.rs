//! Metrics collection and exposition.

use std::net::SocketAddr;
use std::time::Duration;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

use crate::level::Level;
use crate::resilience::CircuitState;

/// Outcome of a request as recorded against the metrics sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestOutcome {
    /// Handler ran and returned normally.
    Success,
    /// Handler ran but failed; its latency still feeds the tracker.
    Error,
    /// Rejected before the handler (backpressure or open circuit).
    Rejected,
}

impl RequestOutcome {
    pub const fn as_str(&self) -> &'static str {
        match self {
            RequestOutcome::Success => "success",
            RequestOutcome::Error => "error",
            RequestOutcome::Rejected => "rejected",
        }
    }
}

/// Sink for admission-control metrics.
///
/// Injected into the gate; the no-op implementation is the default so the
/// core never hard-depends on a metrics backend.
pub trait MetricsSink: Send + Sync + 'static {
    /// Record one completed (or rejected) request.
    fn record_request(
        &self,
        key: &str,
        level: Level,
        outcome: RequestOutcome,
        latency: Duration,
        rejected: bool,
    );

    /// Record the breaker state for an endpoint on state-sensitive paths.
    fn record_circuit_state(&self, key: &str, state: CircuitState);

    /// Record the number of live trackers in the registry.
    fn record_cache_size(&self, size: usize);

    /// Record dispatcher drop/total counters.
    fn record_dispatcher_stats(&self, dropped: u64, total: u64);
}

/// Discards all metrics. The default sink.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopMetrics;

impl MetricsSink for NoopMetrics {
    fn record_request(&self, _: &str, _: Level, _: RequestOutcome, _: Duration, _: bool) {}
    fn record_circuit_state(&self, _: &str, _: CircuitState) {}
    fn record_cache_size(&self, _: usize) {}
    fn record_dispatcher_stats(&self, _: u64, _: u64) {}
}

/// Emits through the `metrics` facade, so any installed recorder
/// (Prometheus, StatsD, ...) receives the series.
#[derive(Debug, Clone, Copy, Default)]
pub struct RuntimeMetrics;

impl MetricsSink for RuntimeMetrics {
    fn record_request(
        &self,
        key: &str,
        level: Level,
        outcome: RequestOutcome,
        latency: Duration,
        rejected: bool,
    ) {
        let labels = [
            ("key", key.to_owned()),
            ("level", level.as_str().to_owned()),
            ("result", outcome.as_str().to_owned()),
        ];
        counter!("loadgate_requests_total", &labels).increment(1);
        if rejected {
            counter!("loadgate_rejections_total", "key" => key.to_owned(), "level" => level.as_str())
                .increment(1);
        } else {
            histogram!("loadgate_request_duration_seconds", &labels).record(latency.as_secs_f64());
        }
    }

    fn record_circuit_state(&self, key: &str, state: CircuitState) {
        // Closed=0, Open=1, HalfOpen=2.
        let value = match state {
            CircuitState::Closed => 0.0,
            CircuitState::Open => 1.0,
            CircuitState::HalfOpen => 2.0,
        };
        gauge!("loadgate_circuit_state", "key" => key.to_owned()).set(value);
    }

    fn record_cache_size(&self, size: usize) {
        gauge!("loadgate_tracker_cache_size").set(size as f64);
    }

    fn record_dispatcher_stats(&self, dropped: u64, total: u64) {
        gauge!("loadgate_dispatcher_dropped_total").set(dropped as f64);
        gauge!("loadgate_dispatcher_emitted_total").set(total as f64);
    }
}

/// Install the Prometheus exporter with its scrape endpoint.
///
/// Convenience for applications that do not already manage a recorder; pair
/// it with [`RuntimeMetrics`] on the gate.
pub fn install_prometheus(addr: SocketAddr) {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .expect("failed to install Prometheus recorder");

    tracing::info!("metrics endpoint listening on http://{}/metrics", addr);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outcome_labels() {
        assert_eq!(RequestOutcome::Success.as_str(), "success");
        assert_eq!(RequestOutcome::Error.as_str(), "error");
        assert_eq!(RequestOutcome::Rejected.as_str(), "rejected");
    }

    #[test]
    fn noop_sink_accepts_everything() {
        let sink = NoopMetrics;
        sink.record_request(
            "GET /",
            Level::Normal,
            RequestOutcome::Success,
            Duration::from_millis(1),
            false,
        );
        sink.record_circuit_state("GET /", CircuitState::Closed);
        sink.record_cache_size(0);
        sink.record_dispatcher_stats(0, 0);
    }
}
