//! Circuit breaker for overload protection.
//!
//! # States
//! - Closed: normal operation, requests pass through
//! - Open: service assumed overloaded, requests fail fast
//! - Half-Open: probing whether the service recovered
//!
//! # State Transitions
//! ```text
//! Closed → Open: failure_count >= max_failures
//! Open → Half-Open: after the recovery timeout, on the next allow()
//! Half-Open → Closed: success_count >= success_threshold
//! Half-Open → Open: a failure while probing
//! ```
//!
//! Every transition is additionally rate-limited: at least one second must
//! have passed since the previous state change, so alternating
//! success/failure bursts cannot flap the breaker. The rate limit is fixed,
//! not a configuration knob.

use std::fmt;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

/// Minimum time between state changes.
const MIN_TIME_BETWEEN_OPS: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl CircuitState {
    pub const fn as_str(&self) -> &'static str {
        match self {
            CircuitState::Closed => "closed",
            CircuitState::Open => "open",
            CircuitState::HalfOpen => "half-open",
        }
    }
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

struct BreakerState {
    state: CircuitState,
    failure_count: u32,
    success_count: u32,
    last_state_time: Instant,
}

/// Failure-counting state machine that short-circuits admission when the
/// service keeps rejecting at Critical/Emergency levels.
pub struct CircuitBreaker {
    inner: Mutex<BreakerState>,
    max_failures: u32,
    timeout: Duration,
    success_threshold: u32,
}

impl CircuitBreaker {
    pub fn new(max_failures: u32, timeout: Duration, success_threshold: u32) -> Self {
        Self {
            inner: Mutex::new(BreakerState {
                state: CircuitState::Closed,
                failure_count: 0,
                success_count: 0,
                last_state_time: Instant::now(),
            }),
            max_failures,
            timeout,
            success_threshold,
        }
    }

    /// Whether a request may proceed. In Open state this flips to Half-Open
    /// (and admits) once the recovery timeout has elapsed.
    pub fn allow(&self) -> bool {
        let mut inner = self.inner.lock();
        match inner.state {
            CircuitState::Closed | CircuitState::HalfOpen => true,
            CircuitState::Open => {
                if inner.last_state_time.elapsed() >= self.timeout {
                    inner.state = CircuitState::HalfOpen;
                    inner.failure_count = 0;
                    inner.success_count = 0;
                    inner.last_state_time = Instant::now();
                    true
                } else {
                    false
                }
            }
        }
    }

    pub fn record_success(&self) {
        let mut inner = self.inner.lock();
        match inner.state {
            CircuitState::HalfOpen => {
                inner.success_count += 1;
                if inner.success_count >= self.success_threshold
                    && inner.last_state_time.elapsed() >= MIN_TIME_BETWEEN_OPS
                {
                    inner.state = CircuitState::Closed;
                    inner.failure_count = 0;
                    inner.success_count = 0;
                    inner.last_state_time = Instant::now();
                }
            }
            CircuitState::Closed => inner.failure_count = 0,
            CircuitState::Open => {}
        }
    }

    pub fn record_failure(&self) {
        let mut inner = self.inner.lock();
        match inner.state {
            CircuitState::Closed => {
                inner.failure_count += 1;
                if inner.failure_count >= self.max_failures
                    && inner.last_state_time.elapsed() >= MIN_TIME_BETWEEN_OPS
                {
                    inner.state = CircuitState::Open;
                    inner.last_state_time = Instant::now();
                }
            }
            CircuitState::HalfOpen => {
                if inner.last_state_time.elapsed() >= MIN_TIME_BETWEEN_OPS {
                    inner.state = CircuitState::Open;
                    inner.last_state_time = Instant::now();
                }
            }
            CircuitState::Open => {}
        }
    }

    pub fn state(&self) -> CircuitState {
        self.inner.lock().state
    }

    /// Force the breaker back to Closed and zero all counters.
    pub fn reset(&self) {
        let mut inner = self.inner.lock();
        inner.state = CircuitState::Closed;
        inner.failure_count = 0;
        inner.success_count = 0;
        inner.last_state_time = Instant::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Backdate the last state change so the rate limit and recovery timeout
    /// do not stall the test.
    fn backdate(breaker: &CircuitBreaker, by: Duration) {
        breaker.inner.lock().last_state_time = Instant::now() - by;
    }

    #[test]
    fn closed_admits_and_counts_failures() {
        let breaker = CircuitBreaker::new(3, Duration::from_secs(30), 5);
        assert!(breaker.allow());

        backdate(&breaker, Duration::from_secs(2));
        breaker.record_failure();
        breaker.record_failure();
        assert_eq!(breaker.state(), CircuitState::Closed);

        breaker.record_failure();
        assert_eq!(breaker.state(), CircuitState::Open);
        assert!(!breaker.allow());
    }

    #[test]
    fn success_resets_the_failure_streak() {
        let breaker = CircuitBreaker::new(3, Duration::from_secs(30), 5);
        backdate(&breaker, Duration::from_secs(2));
        breaker.record_failure();
        breaker.record_failure();
        breaker.record_success();
        breaker.record_failure();
        breaker.record_failure();
        assert_eq!(breaker.state(), CircuitState::Closed);
    }

    #[test]
    fn open_transitions_to_half_open_after_timeout() {
        let breaker = CircuitBreaker::new(1, Duration::from_millis(50), 2);
        backdate(&breaker, Duration::from_secs(2));
        breaker.record_failure();
        assert_eq!(breaker.state(), CircuitState::Open);
        assert!(!breaker.allow());

        backdate(&breaker, Duration::from_millis(60));
        assert!(breaker.allow());
        assert_eq!(breaker.state(), CircuitState::HalfOpen);
    }

    #[test]
    fn half_open_closes_after_success_threshold() {
        let breaker = CircuitBreaker::new(1, Duration::from_millis(10), 3);
        backdate(&breaker, Duration::from_secs(2));
        breaker.record_failure();
        backdate(&breaker, Duration::from_millis(20));
        assert!(breaker.allow());

        breaker.record_success();
        breaker.record_success();
        assert_eq!(breaker.state(), CircuitState::HalfOpen);

        backdate(&breaker, Duration::from_secs(2));
        breaker.record_success();
        assert_eq!(breaker.state(), CircuitState::Closed);
    }

    #[test]
    fn half_open_failure_within_rate_limit_does_not_reopen() {
        let breaker = CircuitBreaker::new(1, Duration::from_millis(10), 3);
        backdate(&breaker, Duration::from_secs(2));
        breaker.record_failure();
        backdate(&breaker, Duration::from_millis(20));
        assert!(breaker.allow());
        assert_eq!(breaker.state(), CircuitState::HalfOpen);

        // Right after the transition the rate limit absorbs the failure; a
        // later one reopens.
        breaker.record_failure();
        assert_eq!(breaker.state(), CircuitState::HalfOpen);

        backdate(&breaker, Duration::from_secs(2));
        breaker.record_failure();
        assert_eq!(breaker.state(), CircuitState::Open);
    }

    #[test]
    fn reset_returns_to_closed() {
        let breaker = CircuitBreaker::new(1, Duration::from_secs(30), 1);
        backdate(&breaker, Duration::from_secs(2));
        breaker.record_failure();
        assert_eq!(breaker.state(), CircuitState::Open);

        breaker.reset();
        assert_eq!(breaker.state(), CircuitState::Closed);
        assert!(breaker.allow());
    }
}
