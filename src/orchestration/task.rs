//! Handle to spawned background loops sharing one shutdown signal.

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::warn;

#[derive(Debug)]
pub struct BackgroundTask {
    name: &'static str,
    shutdown_tx: watch::Sender<bool>,
    handles: Vec<JoinHandle<()>>,
}

impl BackgroundTask {
    pub fn new(
        name: &'static str,
        shutdown_tx: watch::Sender<bool>,
        handles: Vec<JoinHandle<()>>,
    ) -> Self {
        Self {
            name,
            shutdown_tx,
            handles,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Signal shutdown and wait for every loop to finish its current cycle.
    pub async fn stop(self) {
        let _ = self.shutdown_tx.send(true);
        for handle in self.handles {
            if let Err(e) = handle.await {
                warn!(task = self.name, error = %e, "Background task ended abnormally");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_stop_signals_and_joins() {
        let (tx, mut rx) = watch::channel(false);
        let finished = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&finished);

        let handle = tokio::spawn(async move {
            while !*rx.borrow() {
                if rx.changed().await.is_err() {
                    break;
                }
            }
            flag.store(true, Ordering::SeqCst);
        });

        BackgroundTask::new("test", tx, vec![handle]).stop().await;
        assert!(finished.load(Ordering::SeqCst));
    }
}
