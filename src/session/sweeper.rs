//! Periodic removal of expired sessions.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::time;

use crate::session::store::SessionStore;

/// Background task purging expired records from a store.
#[derive(Debug, Clone)]
pub struct SessionSweeper {
    store: Arc<dyn SessionStore>,
    interval: Duration,
}

impl SessionSweeper {
    pub fn new(store: Arc<dyn SessionStore>, interval: Duration) -> Self {
        Self { store, interval }
    }

    /// Sweep on every tick until shutdown is signalled.
    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        tracing::info!(interval_secs = self.interval.as_secs(), "Session sweeper starting");

        let mut ticker = time::interval(self.interval);
        // the first tick completes immediately
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => self.sweep().await,
                _ = shutdown.recv() => {
                    tracing::info!("Session sweeper received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }

    async fn sweep(&self) {
        match self.store.purge_expired().await {
            Ok(0) => {}
            Ok(removed) => tracing::debug!(removed, "Expired sessions purged"),
            Err(e) => tracing::warn!(error = %e, "Session sweep failed"),
        }
    }
}
