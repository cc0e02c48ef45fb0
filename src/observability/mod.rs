//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Gate and dispatcher produce:
//!     → logging.rs (pluggable structured log events)
//!     → metrics.rs (pluggable request/circuit/cache/dispatcher metrics)
//!
//! Consumers:
//!     → Log aggregation (tracing subscriber, stderr, or nothing)
//!     → Metrics endpoint (Prometheus scrape via the metrics facade)
//! ```
//!
//! # Design Decisions
//! - Both sinks are injected trait objects; the core never hard-depends on
//!   a backend, and the no-op implementations are the defaults
//! - Metrics are cheap (atomic increments behind the facade)

pub mod logging;
pub mod metrics;

pub use logging::{GateLogger, NoopLogger, StderrLogger, TracingLogger};
pub use metrics::{MetricsSink, NoopMetrics, RequestOutcome, RuntimeMetrics};
