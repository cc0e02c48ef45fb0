//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (clamp out-of-range knobs, never fail)
//!     → GateConfig (normalized, immutable)
//!     → consumed by AdmissionGate::new
//! ```
//!
//! # Design Decisions
//! - Config is immutable once the gate is built
//! - All fields have defaults to allow minimal configs
//! - Out-of-range values are clamped to the documented ranges rather than
//!   rejected; only unreadable/unparsable files produce errors

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::{CircuitBreakerConfig, GateConfig, RetryAfterConfig, TrackerConfig};
