//! gRPC protocol adapter.
//!
//! # Data Flow
//! ```text
//! Incoming RPC
//!     → service.rs (key = full method path, gate.check)
//!     → admitted: inner service runs, latency measured, ticket completed
//!     → rejected: trailers-only RESOURCE_EXHAUSTED / UNAVAILABLE response
//!       with a retry-after hint, inner service never runs
//! ```

pub mod service;

pub use service::{AdmissionLayer, AdmissionService};
