//! Adaptive latency-driven admission control for request-serving processes.
//!
//! `loadgate` watches per-endpoint response latency, classifies the current
//! load severity and rejects requests before the handler runs once the
//! service crosses its thresholds. The admission path is lock-light and
//! allocation-light: samples travel to the statistics trackers through a
//! lossy asynchronous dispatcher, and a circuit breaker dampens oscillation
//! when the service is deeply overloaded.
//!
//! The core decides, the adapters speak: [`http`] provides axum middleware
//! (503 + `Retry-After`), [`grpc`] a tower layer for tonic servers
//! (`RESOURCE_EXHAUSTED` / `UNAVAILABLE` with a `retry-after` hint).

pub mod config;
pub mod dispatch;
pub mod gate;
pub mod grpc;
pub mod http;
pub mod level;
pub mod lifecycle;
pub mod observability;
pub mod registry;
pub mod resilience;
pub mod tracker;

pub use config::schema::GateConfig;
pub use gate::{Admission, AdmissionGate, AdmissionTicket, RejectReason, Rejection};
pub use level::{Level, Thresholds};
pub use lifecycle::{Shutdown, ShutdownSignal};
pub use tracker::{LatencyTracker, Stats, TrackerOptions};
