//! Cooperative cancellation shared by every loop of a run.

use std::sync::Arc;
use tokio::sync::watch;
use tracing::warn;

/// A single external interrupt signal.
///
/// Clones share the same signal. Once triggered it stays triggered.
#[derive(Debug, Clone)]
pub struct Interrupt {
    tx: Arc<watch::Sender<bool>>,
}

impl Default for Interrupt {
    fn default() -> Self {
        Self::new()
    }
}

impl Interrupt {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    pub fn trigger(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_triggered(&self) -> bool {
        *self.tx.borrow()
    }

    /// Resolves once the interrupt has been triggered.
    pub async fn triggered(&self) {
        let mut rx = self.tx.subscribe();
        // The sender lives as long as `self`, so this only returns on trigger.
        let _ = rx.wait_for(|fired| *fired).await;
    }

    /// Trigger this interrupt on Ctrl-C.
    pub fn listen_for_ctrl_c(&self) {
        let interrupt = self.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("KeyboardInterrupt: retrieval interrupted");
                interrupt.trigger();
            }
        });
    }
}
