//! In-memory job and blob stores.
//!
//! Each store owns a single map behind a `tokio::sync::RwLock`. Reads hand out
//! clones, so callers never observe a record that is still being mutated.

use std::collections::HashMap;

use chrono::Utc;
use tokio::sync::RwLock;

use super::{BlobStore, JobStore};
use crate::error::RepositoryError;
use crate::types::{Artifact, ArtifactMetadata, FileId, Job, JobId, NewArtifact, NewJob};

/// Process-local [`JobStore`]
#[derive(Debug, Default)]
pub struct MemoryJobStore {
    jobs: RwLock<HashMap<JobId, Job>>,
}

impl MemoryJobStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored jobs
    pub async fn len(&self) -> usize {
        self.jobs.read().await.len()
    }

    /// Whether the store holds no jobs
    pub async fn is_empty(&self) -> bool {
        self.jobs.read().await.is_empty()
    }
}

#[async_trait::async_trait]
impl JobStore for MemoryJobStore {
    async fn create(&self, job: NewJob) -> Result<Job, RepositoryError> {
        let id = JobId::new_v4();
        let now = Utc::now();

        let mut jobs = self.jobs.write().await;
        if jobs.contains_key(&id) {
            return Err(RepositoryError::AlreadyExists {
                kind: "job",
                id: id.to_string(),
            });
        }

        let created = Job {
            id: id.clone(),
            created_at: now,
            updated_at: now,
            timeout: job.timeout,
            status: job.status,
            items: Vec::new(),
        };
        jobs.insert(id, created.clone());
        Ok(created)
    }

    async fn get(&self, id: &JobId) -> Result<Job, RepositoryError> {
        self.jobs
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| RepositoryError::job_not_found(id))
    }

    async fn update(&self, job: &Job) -> Result<(), RepositoryError> {
        if job.id.as_str().is_empty() {
            return Err(RepositoryError::Invalid("job id cannot be empty".to_string()));
        }

        let mut jobs = self.jobs.write().await;
        let stored = jobs
            .get_mut(&job.id)
            .ok_or_else(|| RepositoryError::job_not_found(&job.id))?;

        stored.status = job.status;
        stored.timeout = job.timeout;
        stored.items = job.items.clone();
        stored.updated_at = Utc::now();
        Ok(())
    }

    async fn delete(&self, id: &JobId) -> Result<(), RepositoryError> {
        self.jobs
            .write()
            .await
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| RepositoryError::job_not_found(id))
    }
}

/// Process-local [`BlobStore`]
#[derive(Debug, Default)]
pub struct MemoryBlobStore {
    files: RwLock<HashMap<FileId, Artifact>>,
}

impl MemoryBlobStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored artifacts
    pub async fn len(&self) -> usize {
        self.files.read().await.len()
    }

    /// Whether the store holds no artifacts
    pub async fn is_empty(&self) -> bool {
        self.files.read().await.is_empty()
    }
}

#[async_trait::async_trait]
impl BlobStore for MemoryBlobStore {
    async fn create(&self, artifact: NewArtifact) -> Result<FileId, RepositoryError> {
        let id = FileId::new_v4();

        let mut files = self.files.write().await;
        if files.contains_key(&id) {
            return Err(RepositoryError::AlreadyExists {
                kind: "file",
                id: id.to_string(),
            });
        }

        files.insert(
            id.clone(),
            Artifact {
                metadata: ArtifactMetadata {
                    id: id.clone(),
                    mime_type: artifact.mime_type,
                    size: artifact.size,
                },
                data: artifact.data,
            },
        );
        Ok(id)
    }

    async fn get(&self, id: &FileId) -> Result<Artifact, RepositoryError> {
        self.files
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| RepositoryError::file_not_found(id))
    }

    async fn metadata(&self, id: &FileId) -> Result<ArtifactMetadata, RepositoryError> {
        self.files
            .read()
            .await
            .get(id)
            .map(|artifact| artifact.metadata.clone())
            .ok_or_else(|| RepositoryError::file_not_found(id))
    }
}
