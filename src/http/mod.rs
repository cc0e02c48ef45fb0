//! HTTP protocol adapter.
//!
//! # Data Flow
//! ```text
//! Incoming request
//!     → middleware.rs (key = "METHOD PATH", gate.check)
//!     → admitted: handler runs, latency measured, ticket completed
//!     → rejected: 503 + Retry-After, handler never runs
//! ```

pub mod middleware;

pub use middleware::admission_middleware;
