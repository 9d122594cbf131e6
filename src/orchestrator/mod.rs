//! Bounded-concurrency job orchestration, split into focused submodules.
//!
//! The [`Orchestrator`] struct and its methods are organized by domain:
//! - [`execution`]: job creation, detached execution, finalization
//! - [`fetch_task`]: single-URL fetch under the job deadline
//! - [`lifecycle`]: shutdown coordination

mod execution;
mod fetch_task;
mod lifecycle;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
pub(crate) mod test_helpers;
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;

use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::config::{Config, StorageBackend};
use crate::db::Database;
use crate::error::{Error, Result};
use crate::store::{BlobStore, JobStore, MemoryBlobStore, MemoryJobStore};
use crate::types::{Artifact, Event, FileId, Job, JobId};

/// Execution bookkeeping shared by every clone of the orchestrator
#[derive(Clone)]
pub(crate) struct ExecutionState {
    /// Parent of every job scope; cancelled once on shutdown
    pub(crate) shutdown: CancellationToken,
    /// Detached job executions, awaited on shutdown
    pub(crate) tracker: TaskTracker,
    /// Cleared when shutdown begins
    pub(crate) accepting_new: Arc<AtomicBool>,
}

/// Batch download orchestrator (cloneable - all fields are shared)
#[derive(Clone)]
pub struct Orchestrator {
    pub(crate) job_store: Arc<dyn JobStore>,
    pub(crate) blob_store: Arc<dyn BlobStore>,
    pub(crate) http: reqwest::Client,
    pub(crate) config: Arc<Config>,
    pub(crate) event_tx: broadcast::Sender<Event>,
    pub(crate) state: ExecutionState,
}

impl Orchestrator {
    /// Create an orchestrator over the given stores
    ///
    /// Fails if the configuration is invalid or the HTTP client cannot be built.
    pub fn new(
        config: Config,
        job_store: Arc<dyn JobStore>,
        blob_store: Arc<dyn BlobStore>,
    ) -> Result<Self> {
        config.validate()?;

        let http = reqwest::Client::builder()
            .timeout(config.fetch.request_timeout)
            .user_agent(config.fetch.user_agent.clone())
            .build()?;

        // Buffer of 1000 events; slow subscribers see RecvError::Lagged
        let (event_tx, _rx) = broadcast::channel(1000);

        tracing::debug!(
            max_concurrent_fetches = config.fetch.max_concurrent_fetches,
            request_timeout_secs = config.fetch.request_timeout.as_secs(),
            max_body_bytes = config.fetch.max_body_bytes,
            "Orchestrator initialized"
        );

        Ok(Self {
            job_store,
            blob_store,
            http,
            config: Arc::new(config),
            event_tx,
            state: ExecutionState {
                shutdown: CancellationToken::new(),
                tracker: TaskTracker::new(),
                accepting_new: Arc::new(AtomicBool::new(true)),
            },
        })
    }

    /// Create an orchestrator backed by process-local stores
    pub fn in_memory(config: Config) -> Result<Self> {
        Self::new(
            config,
            Arc::new(MemoryJobStore::new()),
            Arc::new(MemoryBlobStore::new()),
        )
    }

    /// Create an orchestrator with the stores selected by `config.persistence`
    pub async fn from_config(config: Config) -> Result<Self> {
        match config.persistence.backend {
            StorageBackend::Memory => Self::in_memory(config),
            StorageBackend::Sqlite => {
                let db = Arc::new(Database::new(&config.persistence.database_path).await?);
                Self::new(config, db.clone(), db)
            }
        }
    }

    /// Look up a job by id
    pub async fn get_job(&self, id: &JobId) -> Result<Job> {
        Ok(self.job_store.get(id).await?)
    }

    /// Look up a stored artifact
    ///
    /// Files live in a flat namespace: `job_id` is accepted for routing symmetry
    /// but not checked against the file.
    pub async fn get_file(&self, job_id: &JobId, file_id: &FileId) -> Result<Artifact> {
        tracing::trace!(job_id = %job_id, file_id = %file_id, "Fetching artifact");
        Ok(self.blob_store.get(file_id).await?)
    }

    /// Subscribe to orchestrator events
    ///
    /// Each subscriber receives every event independently. A subscriber that falls
    /// more than 1000 events behind receives `RecvError::Lagged`.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// Get the current configuration
    pub fn get_config(&self) -> Arc<Config> {
        Arc::clone(&self.config)
    }

    /// Number of job executions still running
    pub fn active_jobs(&self) -> usize {
        self.state.tracker.len()
    }

    /// Whether new jobs are being accepted
    pub fn is_accepting(&self) -> bool {
        self.state
            .accepting_new
            .load(std::sync::atomic::Ordering::SeqCst)
    }

    pub(crate) fn emit_event(&self, event: Event) {
        // No receivers is fine
        self.event_tx.send(event).ok();
    }

    /// Reject calls made after shutdown began
    pub(crate) fn ensure_accepting(&self) -> Result<()> {
        if self.is_accepting() {
            Ok(())
        } else {
            Err(Error::ShuttingDown)
        }
    }
}
