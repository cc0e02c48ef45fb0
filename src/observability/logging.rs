//! Structured logging.
//!
//! # Responsibilities
//! - Define the logger contract the gate emits through
//! - Provide a no-op sink, a plain stderr sink, and a `tracing` bridge
//!
//! # Design Decisions
//! - Key/value pairs travel as `Display` references; nothing is formatted
//!   unless the sink decides to
//! - The `tracing` bridge is the default: subscriber configuration stays in
//!   the application's hands

use std::fmt::Display;
use std::io::Write;

/// One log field: a static key and a displayable value.
pub type LogField<'a> = (&'static str, &'a dyn Display);

/// Severity-indexed structured logger consumed by the admission gate.
///
/// Implementations bridge to whatever logging framework the application
/// uses. Only warning and error events fire on rejection paths; the hot
/// admit path does not log.
pub trait GateLogger: Send + Sync + 'static {
    fn debug(&self, msg: &str, fields: &[LogField<'_>]);
    fn info(&self, msg: &str, fields: &[LogField<'_>]);
    fn warn(&self, msg: &str, fields: &[LogField<'_>]);
    fn error(&self, msg: &str, fields: &[LogField<'_>]);
}

/// Discards every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopLogger;

impl GateLogger for NoopLogger {
    fn debug(&self, _msg: &str, _fields: &[LogField<'_>]) {}
    fn info(&self, _msg: &str, _fields: &[LogField<'_>]) {}
    fn warn(&self, _msg: &str, _fields: &[LogField<'_>]) {}
    fn error(&self, _msg: &str, _fields: &[LogField<'_>]) {}
}

/// Key=value lines on stderr, for embedders that run without a tracing
/// subscriber.
#[derive(Debug, Clone, Copy, Default)]
pub struct StderrLogger;

impl StderrLogger {
    fn write(level: &str, msg: &str, fields: &[LogField<'_>]) {
        let stderr = std::io::stderr();
        let mut out = stderr.lock();
        let _ = write!(out, "[loadgate] {level}: {msg}");
        for (key, value) in fields {
            let _ = write!(out, " {key}={value}");
        }
        let _ = writeln!(out);
    }
}

impl GateLogger for StderrLogger {
    fn debug(&self, msg: &str, fields: &[LogField<'_>]) {
        Self::write("DEBUG", msg, fields);
    }
    fn info(&self, msg: &str, fields: &[LogField<'_>]) {
        Self::write("INFO", msg, fields);
    }
    fn warn(&self, msg: &str, fields: &[LogField<'_>]) {
        Self::write("WARN", msg, fields);
    }
    fn error(&self, msg: &str, fields: &[LogField<'_>]) {
        Self::write("ERROR", msg, fields);
    }
}

/// Forwards events into the `tracing` ecosystem. The default logger.
///
/// Field keys are compile-time unknown here, so pairs are folded into a
/// single `fields` string on the event.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLogger;

fn fold(fields: &[LogField<'_>]) -> String {
    let mut out = String::new();
    for (i, (key, value)) in fields.iter().enumerate() {
        if i > 0 {
            out.push(' ');
        }
        out.push_str(key);
        out.push('=');
        out.push_str(&value.to_string());
    }
    out
}

impl GateLogger for TracingLogger {
    fn debug(&self, msg: &str, fields: &[LogField<'_>]) {
        tracing::debug!(target: "loadgate", fields = %fold(fields), "{msg}");
    }
    fn info(&self, msg: &str, fields: &[LogField<'_>]) {
        tracing::info!(target: "loadgate", fields = %fold(fields), "{msg}");
    }
    fn warn(&self, msg: &str, fields: &[LogField<'_>]) {
        tracing::warn!(target: "loadgate", fields = %fold(fields), "{msg}");
    }
    fn error(&self, msg: &str, fields: &[LogField<'_>]) {
        tracing::error!(target: "loadgate", fields = %fold(fields), "{msg}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fold_formats_pairs() {
        let latency = 42u64;
        let level = "critical";
        let fields: [LogField<'_>; 2] = [("latency_ms", &latency), ("level", &level)];
        assert_eq!(fold(&fields), "latency_ms=42 level=critical");
    }

    #[test]
    fn noop_logger_accepts_everything() {
        let logger = NoopLogger;
        logger.debug("a", &[]);
        logger.info("b", &[("k", &1)]);
        logger.warn("c", &[]);
        logger.error("d", &[]);
    }
}
