//! Lifecycle management.
//!
//! # Data Flow
//! ```text
//! Shutdown (shutdown.rs):
//!     trigger() → latched watch signal → dispatcher worker and periodic
//!     reporter exit → drained() resolves
//! ```
//!
//! # Design Decisions
//! - The cancellation level is latched; tasks spawned after the trigger
//!   still observe it
//! - In-flight requests complete normally; only background work is stopped

pub mod shutdown;

pub use shutdown::{Shutdown, ShutdownSignal};
