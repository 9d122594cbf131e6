//! Route handlers for the REST API
//!
//! Handlers are organized by domain:
//! - [`downloads`]: job submission, status polling and file retrieval
//! - [`system`]: health and OpenAPI

use crate::types::{DownloadItem, FetchErrorCode, FileId, Job, JobId, JobStatus};
use serde::{Deserialize, Serialize};

mod downloads;
mod system;

// Re-export all handlers so `routes::function_name` works from the router
pub use downloads::*;
pub use system::*;

// ============================================================================
// Request/Response Types (shared across handlers)
// ============================================================================

/// Request body for POST /downloads
#[derive(Debug, Default, Deserialize, Serialize, utoipa::ToSchema)]
pub struct CreateJobRequest {
    /// URLs to fetch, in submission order
    #[serde(default)]
    pub files: Vec<FileRequest>,
    /// Job timeout as a duration string, e.g. "10s", "1.5m", "1h30m"
    #[serde(default)]
    #[schema(example = "10s")]
    pub timeout: String,
}

/// One URL inside a [`CreateJobRequest`]
#[derive(Debug, Default, Deserialize, Serialize, utoipa::ToSchema)]
pub struct FileRequest {
    /// Absolute URL to fetch
    #[serde(default)]
    #[schema(example = "https://example.com/report.pdf")]
    pub url: String,
}

/// Response body for POST /downloads
#[derive(Debug, Deserialize, Serialize, utoipa::ToSchema)]
pub struct CreateJobResponse {
    /// Id of the created job
    pub id: JobId,
    /// Always `in_progress` on creation
    pub status: JobStatus,
}

/// Response body for GET /downloads/:job_id
#[derive(Debug, Deserialize, Serialize, utoipa::ToSchema)]
pub struct JobResponse {
    /// Job id
    pub id: JobId,
    /// Current job status
    pub status: JobStatus,
    /// Per-URL outcomes recorded so far, in completion order
    pub files: Vec<FileResponse>,
}

/// Per-URL outcome inside a [`JobResponse`]
///
/// Exactly one of `file_id` and `error` is present.
#[derive(Debug, Deserialize, Serialize, utoipa::ToSchema)]
pub struct FileResponse {
    /// The requested URL
    pub url: String,
    /// Id to pass to GET /downloads/:job_id/files/:file_id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_id: Option<FileId>,
    /// Classified failure
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<FetchErrorCode>,
}

/// A single rejected request field, reported in `error.details.fields`
#[derive(Debug, Clone, Deserialize, Serialize, utoipa::ToSchema)]
pub struct FieldError {
    /// JSON field name
    pub field: String,
    /// Why it was rejected
    pub reason: String,
}

impl From<&DownloadItem> for FileResponse {
    fn from(item: &DownloadItem) -> Self {
        Self {
            url: item.url.clone(),
            file_id: item.file_id().cloned(),
            error: item.error(),
        }
    }
}

impl From<Job> for JobResponse {
    fn from(job: Job) -> Self {
        Self {
            files: job.items.iter().map(FileResponse::from).collect(),
            id: job.id,
            status: job.status,
        }
    }
}
