//! Job and artifact storage seams
//!
//! The orchestrator only ever talks to [`JobStore`] and [`BlobStore`]; which
//! implementation backs them is a deployment decision:
//! - [`memory`]: process-local maps behind a `RwLock`
//! - [`crate::db::Database`]: SQLite via sqlx
//!
//! Implementations serialize their own state. Callers must not assume anything
//! stronger than "each call is individually atomic".

use std::future::Future;

use tokio_util::sync::CancellationToken;

use crate::error::RepositoryError;
use crate::types::{Artifact, ArtifactMetadata, FileId, Job, JobId, NewArtifact, NewJob};

pub mod memory;

pub use memory::{MemoryBlobStore, MemoryJobStore};

/// Persistence for job records
#[async_trait::async_trait]
pub trait JobStore: Send + Sync {
    /// Persist a new job, assigning its id and timestamps
    async fn create(&self, job: NewJob) -> Result<Job, RepositoryError>;

    /// Fetch a job by id
    async fn get(&self, id: &JobId) -> Result<Job, RepositoryError>;

    /// Replace status and items of an existing job, refreshing `updated_at`
    async fn update(&self, job: &Job) -> Result<(), RepositoryError>;

    /// Remove a job
    async fn delete(&self, id: &JobId) -> Result<(), RepositoryError>;
}

/// Persistence for downloaded payloads
#[async_trait::async_trait]
pub trait BlobStore: Send + Sync {
    /// Store a payload, returning its assigned id
    async fn create(&self, artifact: NewArtifact) -> Result<FileId, RepositoryError>;

    /// Fetch a payload with its metadata
    async fn get(&self, id: &FileId) -> Result<Artifact, RepositoryError>;

    /// Fetch only the metadata of a payload
    async fn metadata(&self, id: &FileId) -> Result<ArtifactMetadata, RepositoryError>;
}

/// Run a store call inside a cancellable scope.
///
/// Returns [`RepositoryError::Cancelled`] without polling `op` when the scope is
/// already done, and abandons `op` as soon as the scope becomes done.
pub async fn scoped<T, F>(scope: &CancellationToken, op: F) -> Result<T, RepositoryError>
where
    F: Future<Output = Result<T, RepositoryError>>,
{
    if scope.is_cancelled() {
        return Err(RepositoryError::Cancelled);
    }

    tokio::select! {
        biased;
        _ = scope.cancelled() => Err(RepositoryError::Cancelled),
        result = op => result,
    }
}
