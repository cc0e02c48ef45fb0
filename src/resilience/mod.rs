//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Admission decision:
//!     → circuit_breaker.rs consulted before classification (fail fast)
//!     → Critical/Emergency rejections feed record_failure()
//!     → Normal admissions feed record_success()
//! ```
//!
//! # Design Decisions
//! - One breaker per admission gate (not per endpoint)
//! - Fail fast in Open state, no queueing behind an overloaded service
//! - State changes are rate-limited to one per second to prevent flapping

pub mod circuit_breaker;

pub use circuit_breaker::{CircuitBreaker, CircuitState};
