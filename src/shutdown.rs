//! Process-wide shutdown signal.
//!
//! A [`ShutdownTrigger`] flips a `watch` channel once; every cloned
//! [`Shutdown`] handle observes it. The scheduler checks it between cycles
//! and the fetcher races its HTTP request against it.

use tokio::sync::watch;

/// Sending half. Dropping it without calling [`ShutdownTrigger::trigger`]
/// also counts as shutdown.
#[derive(Debug)]
pub struct ShutdownTrigger {
    tx: watch::Sender<bool>,
}

/// Cloneable receiving half.
#[derive(Debug, Clone)]
pub struct Shutdown {
    rx: Option<watch::Receiver<bool>>,
}

/// Create a linked trigger/handle pair.
pub fn channel() -> (ShutdownTrigger, Shutdown) {
    let (tx, rx) = watch::channel(false);
    (ShutdownTrigger { tx }, Shutdown { rx: Some(rx) })
}

impl ShutdownTrigger {
    pub fn trigger(&self) {
        // send_replace works with zero receivers, send() would not
        self.tx.send_replace(true);
    }
}

impl Shutdown {
    /// A handle that never fires. Useful for one-off cycles and tests.
    pub fn never() -> Self {
        Self { rx: None }
    }

    pub fn is_triggered(&self) -> bool {
        self.rx.as_ref().is_some_and(|rx| *rx.borrow())
    }

    /// Resolve once shutdown has been requested.
    pub async fn cancelled(&mut self) {
        match self.rx.as_mut() {
            // Err means the trigger was dropped, which is also shutdown.
            Some(rx) => {
                let _ = rx.wait_for(|stop| *stop).await;
            }
            None => std::future::pending::<()>().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_trigger_wakes_all_handles() {
        let (trigger, shutdown) = channel();
        let mut a = shutdown.clone();
        let mut b = shutdown;
        assert!(!a.is_triggered());

        trigger.trigger();
        a.cancelled().await;
        b.cancelled().await;
        assert!(b.is_triggered());
    }

    #[tokio::test]
    async fn test_dropped_trigger_counts_as_shutdown() {
        let (trigger, mut shutdown) = channel();
        drop(trigger);
        tokio::time::timeout(Duration::from_secs(1), shutdown.cancelled())
            .await
            .unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_never_does_not_fire() {
        let mut shutdown = Shutdown::never();
        let fired = tokio::time::timeout(Duration::from_secs(3600), shutdown.cancelled()).await;
        assert!(fired.is_err());
    }
}
