//! The admission pipeline.
//!
//! # Responsibilities
//! - Wire registry, dispatcher, circuit breaker and classifier into the
//!   per-request admit/reject decision
//! - Hand admitted requests a ticket that routes the measured latency back
//!   into the tracker via the dispatcher
//! - Run the periodic report of registry size and dispatcher counters
//!
//! The gate is transport-agnostic: it never builds responses. The HTTP and
//! gRPC adapters translate [`Admission`] into status codes and headers.

use std::sync::{Arc, Weak};
use std::time::Duration;

use tokio::time::MissedTickBehavior;

use crate::config::schema::GateConfig;
use crate::config::validation::normalize;
use crate::dispatch::Dispatcher;
use crate::level::{Level, Thresholds};
use crate::lifecycle::{Shutdown, ShutdownSignal};
use crate::observability::logging::{GateLogger, TracingLogger};
use crate::observability::metrics::{MetricsSink, NoopMetrics, RequestOutcome};
use crate::registry::TrackerRegistry;
use crate::resilience::CircuitBreaker;
use crate::tracker::LatencyTracker;

/// Why a request was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    Emergency,
    Critical,
    CircuitOpen,
}

impl RejectReason {
    /// Short human-readable reason, used verbatim in HTTP response bodies.
    pub const fn as_str(&self) -> &'static str {
        match self {
            RejectReason::Emergency => "emergency backpressure",
            RejectReason::Critical => "critical backpressure",
            RejectReason::CircuitOpen => "circuit breaker open",
        }
    }
}

/// A rejection decision plus its retry hint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rejection {
    pub reason: RejectReason,
    pub retry_after_secs: u32,
}

/// Pass issued for an admitted request. The adapter times the handler and
/// returns the ticket through [`AdmissionGate::complete`].
pub struct AdmissionTicket {
    key: String,
    tracker: Arc<LatencyTracker>,
    level: Level,
}

impl AdmissionTicket {
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Severity observed at admission time.
    pub fn level(&self) -> Level {
        self.level
    }
}

/// Outcome of the admission check for one request.
pub enum Admission {
    /// Key matched a skip prefix: run the handler, track nothing.
    Skip,
    /// Admitted; complete the ticket with the measured latency.
    Admit(AdmissionTicket),
    /// Rejected before the handler ran.
    Reject(Rejection),
}

/// Latency-driven admission control for one service.
///
/// Owns the tracker registry, the sample dispatcher and the circuit breaker
/// for its lifetime, which is scoped to the [`Shutdown`] signal passed at
/// construction.
pub struct AdmissionGate {
    registry: TrackerRegistry,
    dispatcher: Dispatcher,
    breaker: CircuitBreaker,
    thresholds: Thresholds,
    skip_keys: Vec<String>,
    retry_after_emergency: u32,
    retry_after_critical: u32,
    retry_after_circuit: u32,
    cache_size: usize,
    metrics: Arc<dyn MetricsSink>,
    logger: Arc<dyn GateLogger>,
}

impl AdmissionGate {
    /// Build a gate with the default observers: no metrics, `tracing` logs.
    pub fn new(config: GateConfig, shutdown: &Shutdown) -> Arc<Self> {
        Self::with_observers(
            config,
            Arc::new(NoopMetrics),
            Arc::new(TracingLogger),
            shutdown,
        )
    }

    /// Build a gate with injected metrics and logging sinks.
    ///
    /// The configuration is normalized (out-of-range knobs clamped) before
    /// use; this constructor never fails. Spawns the dispatcher worker and,
    /// when metrics are enabled, the periodic reporter.
    pub fn with_observers(
        config: GateConfig,
        metrics: Arc<dyn MetricsSink>,
        logger: Arc<dyn GateLogger>,
        shutdown: &Shutdown,
    ) -> Arc<Self> {
        let config = normalize(config);

        let gate = Arc::new(Self {
            registry: TrackerRegistry::new(
                config.cache_size,
                config.cache_ttl(),
                config.tracker.options(),
            ),
            dispatcher: Dispatcher::new(config.dispatcher_buffer_size, shutdown.watcher()),
            breaker: CircuitBreaker::new(
                config.circuit_breaker.max_failures,
                config.circuit_breaker.timeout(),
                config.circuit_breaker.success_threshold,
            ),
            thresholds: config.thresholds.thresholds(),
            skip_keys: config.skip_keys.clone(),
            retry_after_emergency: config.retry_after.emergency_secs,
            retry_after_critical: config.retry_after.critical_secs,
            retry_after_circuit: config.retry_after.circuit_secs,
            cache_size: config.cache_size,
            metrics,
            logger,
        });

        if config.enable_metrics {
            spawn_reporter(
                Arc::downgrade(&gate),
                config.metrics_interval(),
                shutdown.watcher(),
            );
        }

        gate
    }

    /// Decide whether the request identified by `key` may proceed.
    pub fn check(&self, key: &str) -> Admission {
        for prefix in &self.skip_keys {
            if key.starts_with(prefix.as_str()) {
                return Admission::Skip;
            }
        }

        let tracker = self.registry.get(key);

        if !self.breaker.allow() {
            self.logger
                .warn("circuit breaker open, rejecting", &[("key", &key)]);
            self.metrics.record_circuit_state(key, self.breaker.state());
            self.metrics.record_request(
                key,
                tracker.value().level_with(&self.thresholds),
                RequestOutcome::Rejected,
                Duration::ZERO,
                true,
            );
            return Admission::Reject(Rejection {
                reason: RejectReason::CircuitOpen,
                retry_after_secs: self.retry_after_circuit,
            });
        }

        let stats = tracker.value();
        let level = stats.level_with(&self.thresholds);

        match level {
            Level::Emergency | Level::Critical => {
                self.breaker.record_failure();

                let (reason, retry_after_secs) = if level == Level::Emergency {
                    (RejectReason::Emergency, self.retry_after_emergency)
                } else {
                    (RejectReason::Critical, self.retry_after_critical)
                };

                let ema_ms = stats.ema.as_millis();
                let p95_ms = stats.p95.as_millis();
                let p99_ms = stats.p99.as_millis();
                self.logger.error(
                    "backpressure rejection",
                    &[
                        ("key", &key),
                        ("level", &level),
                        ("ema_ms", &ema_ms),
                        ("p95_ms", &p95_ms),
                        ("p99_ms", &p99_ms),
                    ],
                );
                self.metrics
                    .record_request(key, level, RequestOutcome::Rejected, Duration::ZERO, true);
                self.metrics.record_circuit_state(key, self.breaker.state());

                Admission::Reject(Rejection {
                    reason,
                    retry_after_secs,
                })
            }
            Level::Warning | Level::Moderate => {
                let ema_ms = stats.ema.as_millis();
                let p95_ms = stats.p95.as_millis();
                self.logger.warn(
                    "backpressure elevated",
                    &[("key", &key), ("level", &level), ("ema_ms", &ema_ms), ("p95_ms", &p95_ms)],
                );
                Admission::Admit(AdmissionTicket {
                    key: key.to_owned(),
                    tracker,
                    level,
                })
            }
            Level::Normal => {
                self.breaker.record_success();
                Admission::Admit(AdmissionTicket {
                    key: key.to_owned(),
                    tracker,
                    level,
                })
            }
        }
    }

    /// Report the handler's measured latency for an admitted request.
    ///
    /// This is the sole tracker write path: the sample travels through the
    /// lossy dispatcher so the caller never contends on tracker locks. A
    /// failed handler still completes its ticket; slow failures are exactly
    /// the signal the tracker needs.
    pub fn complete(&self, ticket: AdmissionTicket, latency: Duration, outcome: RequestOutcome) {
        let AdmissionTicket {
            key,
            tracker,
            level,
        } = ticket;
        self.dispatcher.emit(tracker, latency);
        self.metrics
            .record_request(&key, level, outcome, latency, false);
    }

    /// Retry hint for a rejection reason, in seconds. Adapters use this to
    /// pre-construct response metadata at setup time.
    pub fn retry_after_secs(&self, reason: RejectReason) -> u32 {
        match reason {
            RejectReason::Emergency => self.retry_after_emergency,
            RejectReason::Critical => self.retry_after_critical,
            RejectReason::CircuitOpen => self.retry_after_circuit,
        }
    }

    pub fn registry(&self) -> &TrackerRegistry {
        &self.registry
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }
}

/// Periodic report of registry size and dispatcher counters. Holds only a
/// weak reference so a dropped gate ends the task even without a shutdown
/// signal.
fn spawn_reporter(gate: Weak<AdmissionGate>, interval: Duration, mut shutdown: ShutdownSignal) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick fires immediately; nothing to report yet.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = shutdown.triggered() => break,
                _ = ticker.tick() => {
                    let Some(gate) = gate.upgrade() else { break };
                    gate.registry.evict_expired();

                    let cache_len = gate.registry.len();
                    let dropped = gate.dispatcher.dropped_count();
                    let total = gate.dispatcher.total_count();
                    let drop_rate = gate.dispatcher.drop_rate();

                    if cache_len > 0 || drop_rate > 0.0 {
                        gate.metrics.record_cache_size(cache_len);
                        gate.metrics.record_dispatcher_stats(dropped, total);

                        let cache_pct =
                            format!("{:.1}", cache_len as f64 / gate.cache_size as f64 * 100.0);
                        let drop_pct = format!("{drop_rate:.2}");
                        let circuit = gate.breaker.state();
                        gate.logger.info(
                            "backpressure report",
                            &[
                                ("cache_len", &cache_len),
                                ("cache_pct", &cache_pct),
                                ("dropped", &dropped),
                                ("total", &total),
                                ("drop_rate", &drop_pct),
                                ("circuit", &circuit),
                            ],
                        );
                    }
                }
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    fn quiet_gate(config: GateConfig, shutdown: &Shutdown) -> Arc<AdmissionGate> {
        AdmissionGate::with_observers(
            config,
            Arc::new(NoopMetrics),
            Arc::new(crate::observability::logging::NoopLogger),
            shutdown,
        )
    }

    /// Prime an endpoint's tracker directly, bypassing the dispatcher.
    fn prime(gate: &AdmissionGate, key: &str, latency: Duration, count: usize) {
        let tracker = gate.registry().get(key);
        for _ in 0..count {
            tracker.process(latency);
        }
    }

    #[tokio::test]
    async fn skip_prefix_bypasses_tracking() {
        let shutdown = Shutdown::new();
        let gate = quiet_gate(GateConfig::default(), &shutdown);

        assert!(matches!(gate.check("GET /health"), Admission::Skip));
        assert!(matches!(gate.check("GET /metrics/memory"), Admission::Skip));
        assert_eq!(gate.registry().len(), 0);
    }

    #[tokio::test]
    async fn calm_endpoint_is_admitted() {
        let shutdown = Shutdown::new();
        let gate = quiet_gate(GateConfig::default(), &shutdown);
        prime(&gate, "GET /api/users", Duration::from_millis(100), 50);

        match gate.check("GET /api/users") {
            Admission::Admit(ticket) => {
                assert_eq!(ticket.level(), Level::Normal);
                assert_eq!(ticket.key(), "GET /api/users");
            }
            _ => panic!("expected admission"),
        }
    }

    #[tokio::test]
    async fn critical_latency_is_rejected_with_retry_hint() {
        let shutdown = Shutdown::new();
        let gate = quiet_gate(GateConfig::default(), &shutdown);
        // P95 ≈ 3s > 2s and EMA ≈ 3s > 500ms, but P99 < 10s: Critical.
        prime(&gate, "GET /api/slow", Duration::from_secs(3), 50);

        match gate.check("GET /api/slow") {
            Admission::Reject(rejection) => {
                assert_eq!(rejection.reason, RejectReason::Critical);
                assert_eq!(rejection.retry_after_secs, 5);
            }
            _ => panic!("expected rejection"),
        }
    }

    #[tokio::test]
    async fn emergency_latency_is_rejected_with_retry_hint() {
        let shutdown = Shutdown::new();
        let gate = quiet_gate(GateConfig::default(), &shutdown);
        prime(&gate, "GET /api/dying", Duration::from_secs(12), 50);

        match gate.check("GET /api/dying") {
            Admission::Reject(rejection) => {
                assert_eq!(rejection.reason, RejectReason::Emergency);
                assert_eq!(rejection.retry_after_secs, 10);
            }
            _ => panic!("expected rejection"),
        }
    }

    #[tokio::test]
    async fn completion_feeds_the_tracker_through_the_dispatcher() {
        let shutdown = Shutdown::new();
        let gate = quiet_gate(GateConfig::default(), &shutdown);

        let Admission::Admit(ticket) = gate.check("GET /api/orders") else {
            panic!("expected admission");
        };
        gate.complete(ticket, Duration::from_millis(250), RequestOutcome::Success);

        let tracker = gate.registry().get("GET /api/orders");
        let deadline = Instant::now() + Duration::from_secs(1);
        loop {
            if tracker.value().ema == Duration::from_millis(250) {
                break;
            }
            assert!(Instant::now() < deadline, "sample never applied");
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(gate.dispatcher().total_count(), 1);
    }

    #[tokio::test]
    async fn rejections_feed_the_breaker_until_it_opens() {
        let shutdown = Shutdown::new();
        let gate = quiet_gate(GateConfig::default(), &shutdown);
        prime(&gate, "GET /api/dying", Duration::from_secs(12), 50);

        // Let the breaker's state-change rate limit lapse since construction.
        tokio::time::sleep(Duration::from_millis(1_050)).await;

        for _ in 0..3 {
            assert!(matches!(
                gate.check("GET /api/dying"),
                Admission::Reject(Rejection {
                    reason: RejectReason::Emergency,
                    ..
                })
            ));
        }

        // Third failure opened the circuit; even a calm endpoint is now
        // short-circuited.
        match gate.check("GET /api/other") {
            Admission::Reject(rejection) => {
                assert_eq!(rejection.reason, RejectReason::CircuitOpen);
                assert_eq!(rejection.retry_after_secs, 30);
            }
            _ => panic!("expected circuit-open rejection"),
        }
    }
}
