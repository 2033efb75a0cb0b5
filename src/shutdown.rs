//! Interrupt handling.
//!
//! A [`Shutdown`] is a cloneable handle the publishing loop polls between
//! lines. It is flipped once by a [`ShutdownTrigger`], which in the binary is
//! driven by Ctrl-C.

use tokio::sync::watch;
use tracing::{info, warn};

#[derive(Debug, Clone)]
pub struct Shutdown {
    rx: watch::Receiver<bool>,
}

#[derive(Debug)]
pub struct ShutdownTrigger {
    tx: watch::Sender<bool>,
}

pub fn channel() -> (ShutdownTrigger, Shutdown) {
    let (tx, rx) = watch::channel(false);
    (ShutdownTrigger { tx }, Shutdown { rx })
}

impl ShutdownTrigger {
    pub fn trigger(&self) {
        self.tx.send_replace(true);
    }
}

impl Shutdown {
    /// A handle that fires when the process receives Ctrl-C.
    pub fn on_ctrl_c() -> Self {
        let (trigger, shutdown) = channel();
        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    info!("Interrupt received, stopping after the current message");
                    trigger.trigger();
                }
                Err(e) => warn!("Unable to listen for Ctrl-C: {e}"),
            }
        });
        shutdown
    }

    /// A handle that never fires.
    pub fn never() -> Self {
        let (_, shutdown) = channel();
        shutdown
    }

    pub fn is_triggered(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once the trigger fires. Stays pending forever if the trigger
    /// is dropped without firing.
    pub async fn wait(&mut self) {
        loop {
            if *self.rx.borrow_and_update() {
                return;
            }
            if self.rx.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn wait_resolves_after_trigger() {
        let (trigger, mut shutdown) = channel();
        assert!(!shutdown.is_triggered());

        trigger.trigger();

        tokio::time::timeout(Duration::from_secs(1), shutdown.wait())
            .await
            .expect("wait should resolve once triggered");
        assert!(shutdown.is_triggered());
    }

    #[tokio::test]
    async fn wait_stays_pending_when_trigger_is_dropped() {
        let (trigger, mut shutdown) = channel();
        drop(trigger);

        let res = tokio::time::timeout(Duration::from_millis(50), shutdown.wait()).await;
        assert!(res.is_err());
        assert!(!shutdown.is_triggered());
    }

    #[tokio::test]
    async fn clones_observe_the_same_trigger() {
        let (trigger, shutdown) = channel();
        let mut other = shutdown.clone();
        trigger.trigger();
        other.wait().await;
        assert!(shutdown.is_triggered());
    }
}
