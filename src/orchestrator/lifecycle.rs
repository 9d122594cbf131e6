//! Shutdown coordination.

use std::sync::atomic::Ordering;
use std::time::Duration;

use crate::error::Result;

use super::Orchestrator;

/// How long shutdown waits for running jobs to persist their final state
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

impl Orchestrator {
    /// Gracefully shut down the orchestrator
    ///
    /// 1. Stops accepting new jobs ([`crate::Error::ShuttingDown`] from then on)
    /// 2. Cancels every running job scope; those jobs finalize as `Failed`
    /// 3. Waits (up to 30 seconds) for their final state to be persisted
    pub async fn shutdown(&self) -> Result<()> {
        self.shutdown_with_timeout(SHUTDOWN_TIMEOUT).await
    }

    /// [`Orchestrator::shutdown`] with an explicit wait bound
    pub async fn shutdown_with_timeout(&self, wait: Duration) -> Result<()> {
        tracing::info!("Initiating graceful shutdown");

        self.state.accepting_new.store(false, Ordering::SeqCst);
        tracing::info!("Stopped accepting new jobs");

        let active = self.state.tracker.len();
        self.state.tracker.close();
        self.state.shutdown.cancel();
        tracing::info!(active_jobs = active, "Signaled cancellation to running jobs");

        match tokio::time::timeout(wait, self.state.tracker.wait()).await {
            Ok(()) => tracing::info!("All running jobs finalized"),
            Err(_) => tracing::warn!(
                remaining = self.state.tracker.len(),
                "Timeout waiting for running jobs, proceeding with shutdown"
            ),
        }

        tracing::info!("Graceful shutdown complete");
        Ok(())
    }
}
