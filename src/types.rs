//! Core types for batch-fetch

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use utoipa::ToSchema;

/// Opaque job identifier, assigned by the job store
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    /// Generate a fresh random id
    pub fn new_v4() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// Borrow the inner string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for JobId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for JobId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Opaque artifact identifier, assigned by the blob store
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema)]
#[serde(transparent)]
pub struct FileId(pub String);

impl FileId {
    /// Generate a fresh random id
    pub fn new_v4() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// Borrow the inner string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for FileId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for FileId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl std::fmt::Display for FileId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Job status
///
/// Jobs are created directly in `InProgress`; `Done` and `Failed` are terminal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Fetch tasks are running (or about to)
    InProgress,
    /// Every fetch task reached an outcome, successful or not
    Done,
    /// The job deadline fired (or the job was cancelled) before all tasks finished
    Failed,
}

impl JobStatus {
    /// Stable string form, used for storage and the REST layer
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::InProgress => "in_progress",
            JobStatus::Done => "done",
            JobStatus::Failed => "failed",
        }
    }

    /// Parse the stable string form
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "in_progress" => Some(JobStatus::InProgress),
            "done" => Some(JobStatus::Done),
            "failed" => Some(JobStatus::Failed),
            _ => None,
        }
    }

    /// Whether no further transitions are allowed
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Done | JobStatus::Failed)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classified per-item failure
///
/// Serialized as `{"code": "timeout"}`, `{"code": "http_error", "status": 404}`
/// or `{"code": "unknown"}`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(tag = "code", rename_all = "snake_case")]
pub enum FetchErrorCode {
    /// Job deadline or per-request timeout exceeded
    Timeout,
    /// Transport failure, non-2xx status, or oversized body
    HttpError {
        /// Observed (or synthesized, e.g. 413) HTTP status; `None` for transport failures
        #[serde(default, skip_serializing_if = "Option::is_none")]
        status: Option<u16>,
    },
    /// Anything not otherwise classified
    Unknown,
}

impl FetchErrorCode {
    /// Machine-readable code without the status payload
    pub fn code(&self) -> &'static str {
        match self {
            FetchErrorCode::Timeout => "timeout",
            FetchErrorCode::HttpError { .. } => "http_error",
            FetchErrorCode::Unknown => "unknown",
        }
    }

    /// HTTP status carried by an `HttpError`, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            FetchErrorCode::HttpError { status } => *status,
            _ => None,
        }
    }

    /// Rebuild from the stored `(code, status)` pair
    pub fn from_parts(code: &str, status: Option<u16>) -> Option<Self> {
        match code {
            "timeout" => Some(FetchErrorCode::Timeout),
            "http_error" => Some(FetchErrorCode::HttpError { status }),
            "unknown" => Some(FetchErrorCode::Unknown),
            _ => None,
        }
    }
}

impl std::fmt::Display for FetchErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.status() {
            Some(status) => write!(f, "{} ({})", self.code(), status),
            None => f.write_str(self.code()),
        }
    }
}

/// Outcome of a single URL: exactly one of a stored file or a classified error
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ItemOutcome {
    /// Body stored in the blob store under this id
    File(FileId),
    /// Fetch failed
    Error(FetchErrorCode),
}

/// Per-URL outcome record inside a job
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "DownloadItemRepr", try_from = "DownloadItemRepr")]
pub struct DownloadItem {
    /// The requested URL
    pub url: String,
    /// What happened to it
    pub outcome: ItemOutcome,
}

impl DownloadItem {
    /// Successful item
    pub fn success(url: impl Into<String>, file_id: FileId) -> Self {
        Self {
            url: url.into(),
            outcome: ItemOutcome::File(file_id),
        }
    }

    /// Failed item
    pub fn failure(url: impl Into<String>, error: FetchErrorCode) -> Self {
        Self {
            url: url.into(),
            outcome: ItemOutcome::Error(error),
        }
    }

    /// Stored file id, set exclusively on success
    pub fn file_id(&self) -> Option<&FileId> {
        match &self.outcome {
            ItemOutcome::File(id) => Some(id),
            ItemOutcome::Error(_) => None,
        }
    }

    /// Classified error, set exclusively on failure
    pub fn error(&self) -> Option<FetchErrorCode> {
        match &self.outcome {
            ItemOutcome::File(_) => None,
            ItemOutcome::Error(code) => Some(*code),
        }
    }
}

/// Flat wire shape of [`DownloadItem`]
#[derive(Serialize, Deserialize)]
struct DownloadItemRepr {
    url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    file_id: Option<FileId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error: Option<FetchErrorCode>,
}

impl From<DownloadItem> for DownloadItemRepr {
    fn from(item: DownloadItem) -> Self {
        match item.outcome {
            ItemOutcome::File(id) => Self {
                url: item.url,
                file_id: Some(id),
                error: None,
            },
            ItemOutcome::Error(code) => Self {
                url: item.url,
                file_id: None,
                error: Some(code),
            },
        }
    }
}

impl TryFrom<DownloadItemRepr> for DownloadItem {
    type Error = String;

    fn try_from(repr: DownloadItemRepr) -> std::result::Result<Self, Self::Error> {
        let outcome = match (repr.file_id, repr.error) {
            (Some(id), None) => ItemOutcome::File(id),
            (None, Some(code)) => ItemOutcome::Error(code),
            (Some(_), Some(_)) => {
                return Err(format!("item for {} has both file_id and error", repr.url));
            }
            (None, None) => {
                return Err(format!("item for {} has neither file_id nor error", repr.url));
            }
        };
        Ok(Self {
            url: repr.url,
            outcome,
        })
    }
}

/// One batch-download request with its own deadline and outcome list
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    /// Store-assigned identifier
    pub id: JobId,
    /// When the job record was created
    pub created_at: DateTime<Utc>,
    /// Refreshed by the store on every mutation
    pub updated_at: DateTime<Utc>,
    /// Requested bound on total execution
    #[serde(with = "duration_millis")]
    pub timeout: Duration,
    /// Current status
    pub status: JobStatus,
    /// Per-URL outcomes in completion order
    pub items: Vec<DownloadItem>,
}

/// Job record before the store assigns an id and timestamps
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewJob {
    /// Requested bound on total execution
    pub timeout: Duration,
    /// Initial status (always `InProgress` from the orchestrator)
    pub status: JobStatus,
}

impl NewJob {
    /// A job that starts running immediately
    pub fn in_progress(timeout: Duration) -> Self {
        Self {
            timeout,
            status: JobStatus::InProgress,
        }
    }
}

/// Content-type and size of a stored artifact
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ArtifactMetadata {
    /// Store-assigned identifier
    pub id: FileId,
    /// Content-Type reported by the upstream server
    pub mime_type: String,
    /// Payload size in bytes
    pub size: u64,
}

/// A stored binary payload
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Artifact {
    /// Id, content-type and size
    pub metadata: ArtifactMetadata,
    /// Immutable payload
    pub data: Bytes,
}

/// Artifact before the store assigns an id
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewArtifact {
    /// Content-Type reported by the upstream server
    pub mime_type: String,
    /// Payload size in bytes
    pub size: u64,
    /// Payload
    pub data: Bytes,
}

impl NewArtifact {
    /// Build from a payload, deriving the size from its length
    pub fn new(mime_type: impl Into<String>, data: Bytes) -> Self {
        Self {
            mime_type: mime_type.into(),
            size: data.len() as u64,
            data,
        }
    }
}

/// Events emitted by the orchestrator
///
/// Subscribers receive these via [`crate::Orchestrator::subscribe`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// A job record was created and its execution spawned
    JobStarted {
        /// Job id
        id: JobId,
        /// Number of URLs in the job
        urls: usize,
    },
    /// One URL reached its outcome
    ItemRecorded {
        /// Job id
        id: JobId,
        /// The recorded item
        item: DownloadItem,
    },
    /// The job reached a terminal status (emitted before the final write)
    JobFinished {
        /// Job id
        id: JobId,
        /// Terminal status
        status: JobStatus,
        /// Number of recorded items
        items: usize,
    },
}

mod duration_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}
