//! One-shot drain-completion signal for sinks.

use std::sync::Arc;
use tokio::sync::watch;

/// The sink-held side of a drain signal.
///
/// A sink calls [`notify`](Self::notify) once it has consumed every record up
/// to the closure of its input, and hands out [`DrainSignal`]s from
/// [`crate::components::Sink::drained`].
#[derive(Debug, Clone)]
pub struct DrainNotifier {
    tx: Arc<watch::Sender<bool>>,
}

impl Default for DrainNotifier {
    fn default() -> Self {
        Self::new()
    }
}

impl DrainNotifier {
    /// Creates a notifier in the not-drained state.
    #[must_use]
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    /// Marks the sink as drained and wakes every waiter.
    pub fn notify(&self) {
        self.tx.send_replace(true);
    }

    /// Returns true once `notify` has been called.
    #[must_use]
    pub fn is_drained(&self) -> bool {
        *self.tx.borrow()
    }

    /// Returns a signal observing this notifier.
    #[must_use]
    pub fn signal(&self) -> DrainSignal {
        DrainSignal {
            rx: self.tx.subscribe(),
        }
    }

    /// Returns to the not-drained state for a new run.
    pub fn reset(&self) {
        self.tx.send_replace(false);
    }
}

/// A repeatedly readable view of a sink's drain completion.
#[derive(Debug, Clone)]
pub struct DrainSignal {
    rx: watch::Receiver<bool>,
}

impl DrainSignal {
    /// Returns true if the sink has drained.
    #[must_use]
    pub fn is_drained(&self) -> bool {
        *self.rx.borrow()
    }

    /// Waits until the sink has drained.
    ///
    /// If the notifier is dropped without ever notifying, this never
    /// completes; callers bound it with a timeout.
    pub async fn wait(mut self) {
        if self.rx.wait_for(|drained| *drained).await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_signal_completes_after_notify() {
        let notifier = DrainNotifier::new();
        let signal = notifier.signal();
        assert!(!signal.is_drained());

        let waiter = tokio::spawn(signal.clone().wait());
        notifier.notify();

        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("drain wait should finish")
            .unwrap();
        assert!(signal.is_drained());
    }

    #[tokio::test]
    async fn test_signal_is_repeatable() {
        let notifier = DrainNotifier::new();
        notifier.notify();

        for _ in 0..3 {
            tokio::time::timeout(Duration::from_millis(100), notifier.signal().wait())
                .await
                .unwrap();
        }
    }

    #[tokio::test]
    async fn test_dropped_notifier_never_completes() {
        let notifier = DrainNotifier::new();
        let signal = notifier.signal();
        drop(notifier);

        let waited = tokio::time::timeout(Duration::from_millis(50), signal.wait()).await;
        assert!(waited.is_err());
    }

    #[test]
    fn test_reset() {
        let notifier = DrainNotifier::new();
        notifier.notify();
        assert!(notifier.is_drained());

        notifier.reset();
        assert!(!notifier.signal().is_drained());
    }
}
