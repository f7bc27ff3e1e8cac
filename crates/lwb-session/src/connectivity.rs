//! Background backend health polling
//!
//! A monitor owns its polling task; dropping the monitor stops the
//! polling. Health state is published through a `watch` channel so any
//! number of observers can read or await changes.

use lwb_client::Backend;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Periodic health poller for a backend
pub struct ConnectivityMonitor {
    rx: watch::Receiver<bool>,
    task: JoinHandle<()>,
}

impl ConnectivityMonitor {
    /// Start polling immediately, then on every interval tick.
    ///
    /// A transport failure counts as unhealthy rather than an error;
    /// the monitor never gives up.
    #[must_use]
    pub fn start(backend: Arc<dyn Backend>, interval: Duration) -> Self {
        let (tx, rx) = watch::channel(false);
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                let healthy = backend.health().await.unwrap_or(false);
                // send_if_modified keeps change-notifications meaningful
                let changed = tx.send_if_modified(|state| {
                    let flipped = *state != healthy;
                    *state = healthy;
                    flipped
                });
                if changed {
                    tracing::info!(healthy, "backend connectivity changed");
                }
            }
        });
        Self { rx, task }
    }

    /// Last observed health state
    #[inline]
    #[must_use]
    pub fn is_healthy(&self) -> bool {
        *self.rx.borrow()
    }

    /// A receiver for awaiting health changes
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.rx.clone()
    }
}

impl Drop for ConnectivityMonitor {
    fn drop(&mut self) {
        self.task.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lwb_test_utils::StubBackend;

    #[tokio::test(start_paused = true)]
    async fn reports_health_transitions() {
        let backend = Arc::new(StubBackend::new());
        backend.set_healthy(true);
        let monitor = ConnectivityMonitor::start(backend.clone(), Duration::from_secs(10));

        let mut rx = monitor.subscribe();
        rx.changed().await.ok();
        assert!(monitor.is_healthy());

        backend.set_healthy(false);
        rx.changed().await.ok();
        assert!(!monitor.is_healthy());
    }

    #[tokio::test(start_paused = true)]
    async fn drop_stops_polling() {
        let backend = Arc::new(StubBackend::new());
        backend.set_healthy(true);
        let monitor = ConnectivityMonitor::start(backend, Duration::from_secs(10));
        let mut rx = monitor.subscribe();
        rx.changed().await.ok();

        drop(monitor);
        tokio::time::advance(Duration::from_secs(30)).await;
        assert!(rx.changed().await.is_err());
    }
}
