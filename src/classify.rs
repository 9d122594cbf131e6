//! Fetch failure classification
//!
//! Every way a single URL can fail is captured as a [`FetchFailure`] and resolved
//! exactly once into the [`FetchErrorCode`] recorded on the job. Only a failure
//! caused by the job scope itself ([`FetchFailure::is_fatal`]) aborts the job;
//! everything else is recorded and the job carries on.

use thiserror::Error;

use crate::error::RepositoryError;
use crate::types::FetchErrorCode;

/// Raw reason a fetch task did not produce an artifact
#[derive(Debug, Error)]
pub enum FetchFailure {
    /// The job scope was cancelled (shutdown or deadline propagation)
    #[error("job scope cancelled")]
    Cancelled,

    /// The job deadline elapsed
    #[error("job deadline exceeded")]
    DeadlineExceeded,

    /// The per-request timeout elapsed
    #[error("request timed out: {0}")]
    Timeout(#[source] reqwest::Error),

    /// Connect, DNS, reset or body-read failure
    #[error("transport error: {0}")]
    Transport(#[source] reqwest::Error),

    /// Upstream answered with a non-2xx status
    #[error("upstream returned HTTP {0}")]
    Status(u16),

    /// Body exceeded the configured ceiling
    #[error("response body exceeds {limit} bytes")]
    TooLarge {
        /// Configured ceiling in bytes
        limit: u64,
    },

    /// The URL could not be turned into a request
    #[error("invalid url: {0}")]
    InvalidUrl(String),

    /// The blob store rejected the payload
    #[error("storage failure: {0}")]
    Storage(#[from] RepositoryError),

    /// Anything else reqwest reports
    #[error("fetch failed: {0}")]
    Other(String),
}

impl FetchFailure {
    /// Sort a reqwest error into the matching variant
    pub fn from_reqwest(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            FetchFailure::Timeout(e)
        } else if e.is_builder() {
            FetchFailure::InvalidUrl(e.to_string())
        } else if let Some(status) = e.status().filter(|_| e.is_status()) {
            FetchFailure::Status(status.as_u16())
        } else if e.is_connect() || e.is_request() || e.is_body() || e.is_decode() {
            FetchFailure::Transport(e)
        } else {
            FetchFailure::Other(e.to_string())
        }
    }

    /// Whether this failure aborts the whole job
    pub fn is_fatal(&self) -> bool {
        matches!(self, FetchFailure::Cancelled | FetchFailure::DeadlineExceeded)
    }
}

/// Resolve a failure into the code stored on the item
pub fn classify(failure: &FetchFailure) -> FetchErrorCode {
    match failure {
        FetchFailure::Cancelled | FetchFailure::DeadlineExceeded | FetchFailure::Timeout(_) => {
            FetchErrorCode::Timeout
        }
        // A blob write abandoned because the scope fired
        FetchFailure::Storage(RepositoryError::Cancelled) => FetchErrorCode::Timeout,
        FetchFailure::Transport(_) => FetchErrorCode::HttpError { status: None },
        FetchFailure::Status(status) => FetchErrorCode::HttpError {
            status: Some(*status),
        },
        FetchFailure::TooLarge { .. } => FetchErrorCode::HttpError { status: Some(413) },
        FetchFailure::InvalidUrl(_) | FetchFailure::Storage(_) | FetchFailure::Other(_) => {
            FetchErrorCode::Unknown
        }
    }
}
