//! Shutdown coordination for gate background tasks.

use std::sync::Arc;

use tokio::sync::watch;

/// Cancellation scope for an admission gate.
///
/// The gate's background tasks (dispatcher worker, periodic reporter) each
/// hold a [`ShutdownSignal`] and exit once [`trigger`](Shutdown::trigger)
/// fires. The level is latched: a signal obtained after the trigger
/// resolves immediately, so late-spawned tasks cannot miss it. In-flight
/// requests are unaffected; only background work stops.
pub struct Shutdown {
    tx: Arc<watch::Sender<bool>>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    /// Obtain a signal for one background task.
    pub fn watcher(&self) -> ShutdownSignal {
        ShutdownSignal {
            rx: self.tx.subscribe(),
        }
    }

    /// Stop all subscribed background tasks.
    pub fn trigger(&self) {
        let _ = self.tx.send(true);
    }

    /// Whether the scope has already been cancelled.
    pub fn is_triggered(&self) -> bool {
        *self.tx.borrow()
    }

    /// Number of background tasks still holding a signal.
    pub fn task_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Wait until every background task has dropped its signal, i.e. the
    /// dispatcher worker and reporter have actually exited. Call after
    /// [`trigger`](Shutdown::trigger) for an orderly teardown.
    pub async fn drained(&self) {
        self.tx.closed().await;
    }

    /// Tie this scope to Ctrl+C: the first interrupt triggers it.
    pub fn trigger_on_ctrl_c(&self) {
        let tx = Arc::clone(&self.tx);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                let _ = tx.send(true);
            }
        });
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

/// One task's view of the cancellation scope.
pub struct ShutdownSignal {
    rx: watch::Receiver<bool>,
}

impl ShutdownSignal {
    /// Resolve once the scope is cancelled. A dropped coordinator counts
    /// as cancellation, so orphaned tasks still wind down.
    pub async fn triggered(&mut self) {
        let _ = self.rx.wait_for(|stopped| *stopped).await;
    }
}
