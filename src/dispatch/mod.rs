//! Asynchronous, lossy delivery of latency samples to trackers.
//!
//! # Responsibilities
//! - Keep tracker writes off the request-serving path
//! - Never block the emitter: a full buffer drops the sample
//! - Account totals and drops for the drop-rate signal
//!
//! One background worker drains the channel, so samples for a given tracker
//! are applied in the order they were enqueued. A dropped sample only delays
//! statistical convergence; overrun is a warning signal, not an error.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use crate::lifecycle::ShutdownSignal;
use crate::tracker::LatencyTracker;

/// Every N dropped events, emit one warning with the running counters.
const DROP_LOG_STRIDE: u64 = 100;

struct SampleEvent {
    target: Arc<LatencyTracker>,
    latency: Duration,
}

/// Bounded fan-in from the admission path to the trackers.
pub struct Dispatcher {
    tx: mpsc::Sender<SampleEvent>,
    dropped: AtomicU64,
    total: AtomicU64,
}

impl Dispatcher {
    /// Create the dispatcher and spawn its worker task. The worker exits on
    /// the shutdown signal; buffered events are then discarded.
    pub fn new(buffer: usize, mut shutdown: ShutdownSignal) -> Self {
        let (tx, mut rx) = mpsc::channel(buffer.max(1));

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = shutdown.triggered() => break,
                    event = rx.recv() => match event {
                        Some(SampleEvent { target, latency }) => target.process(latency),
                        None => break,
                    },
                }
            }
        });

        Self {
            tx,
            dropped: AtomicU64::new(0),
            total: AtomicU64::new(0),
        }
    }

    /// Submit a sample for asynchronous processing. Never blocks; drops the
    /// event when the buffer is full.
    pub fn emit(&self, target: Arc<LatencyTracker>, latency: Duration) {
        self.total.fetch_add(1, Ordering::Relaxed);

        match self.tx.try_send(SampleEvent { target, latency }) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) | Err(TrySendError::Closed(_)) => {
                let dropped = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                if dropped % DROP_LOG_STRIDE == 0 {
                    let total = self.total.load(Ordering::Relaxed);
                    let drop_rate = dropped as f64 / total as f64 * 100.0;
                    tracing::warn!(dropped, total, drop_rate, "sample dispatcher buffer full");
                }
            }
        }
    }

    pub fn dropped_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    pub fn total_count(&self) -> u64 {
        self.total.load(Ordering::Relaxed)
    }

    /// Fraction of emitted events that were dropped, in percent.
    pub fn drop_rate(&self) -> f64 {
        let total = self.total.load(Ordering::Relaxed);
        if total == 0 {
            return 0.0;
        }
        self.dropped.load(Ordering::Relaxed) as f64 / total as f64 * 100.0
    }
}
