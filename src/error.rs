//! Error types for batch-fetch
//!
//! This module provides error handling for the library, including:
//! - The crate-wide [`Error`] returned synchronously by orchestrator entry points
//! - [`RepositoryError`] shared by every job/blob store implementation
//! - HTTP status code mapping for the REST layer
//! - Structured error responses with machine-readable error codes
//!
//! Per-item fetch failures are not errors in this sense: they are classified into
//! [`crate::types::FetchErrorCode`] and recorded inside the job.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

/// Result type alias for batch-fetch operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for batch-fetch
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "fetch.max_body_bytes")
        key: Option<String>,
    },

    /// A job or blob store operation failed
    #[error("repository error: {0}")]
    Repository(#[from] RepositoryError),

    /// Database lifecycle failure (connect, migrate)
    #[error("database error: {0}")]
    Database(#[from] DatabaseError),

    /// Request rejected by input validation
    #[error("validation error: {0}")]
    Validation(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Shutdown in progress - not accepting new jobs
    #[error("shutdown in progress: not accepting new jobs")]
    ShuttingDown,

    /// Failed to build the outbound HTTP client
    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// API server error
    #[error("API server error: {0}")]
    ApiServerError(String),
}

/// Errors produced by [`crate::store::JobStore`] and [`crate::store::BlobStore`] implementations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RepositoryError {
    /// No record with the given id exists
    #[error("{kind} not found: {id}")]
    NotFound {
        /// Kind of record ("job" or "file")
        kind: &'static str,
        /// The id that was looked up
        id: String,
    },

    /// A record with the same id already exists
    #[error("{kind} already exists: {id}")]
    AlreadyExists {
        /// Kind of record ("job" or "file")
        kind: &'static str,
        /// The conflicting id
        id: String,
    },

    /// The calling scope was cancelled or its deadline passed before the call completed
    #[error("operation cancelled: scope is done")]
    Cancelled,

    /// The record is malformed (e.g. empty id on update)
    #[error("invalid record: {0}")]
    Invalid(String),

    /// The backing store could not be reached
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// A query against the backing store failed
    #[error("query failed: {0}")]
    QueryFailed(String),
}

impl RepositoryError {
    /// Shorthand for a missing job
    pub fn job_not_found(id: impl std::fmt::Display) -> Self {
        Self::NotFound {
            kind: "job",
            id: id.to_string(),
        }
    }

    /// Shorthand for a missing file
    pub fn file_not_found(id: impl std::fmt::Display) -> Self {
        Self::NotFound {
            kind: "file",
            id: id.to_string(),
        }
    }

    /// Whether this error means the record does not exist
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Database lifecycle errors
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Failed to connect to database
    #[error("failed to connect to database: {0}")]
    ConnectionFailed(String),

    /// Failed to run migrations
    #[error("failed to run migrations: {0}")]
    MigrationFailed(String),
}

/// API error response format
///
/// # Example JSON Response
///
/// ```json
/// {
///   "error": {
///     "code": "not_found",
///     "message": "repository error: job not found: 6c1f...",
///     "details": { "kind": "job", "id": "6c1f..." }
///   }
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ApiError {
    /// The error details
    pub error: ErrorDetail,
}

/// Detailed error information for API responses
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ErrorDetail {
    /// Machine-readable error code (e.g., "not_found", "validation_error")
    pub code: String,

    /// Human-readable error message
    pub message: String,

    /// Optional additional context about the error
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    /// Create a new API error with code and message
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: ErrorDetail {
                code: code.into(),
                message: message.into(),
                details: None,
            },
        }
    }

    /// Create a "validation error" error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new("validation_error", message)
    }

    /// Create an "internal server error"
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new("internal_error", message)
    }
}

/// Convert errors to HTTP status codes for API responses
pub trait ToHttpStatus {
    /// Get the HTTP status code for this error
    fn status_code(&self) -> u16;

    /// Get the machine-readable error code
    fn error_code(&self) -> &str;
}

impl ToHttpStatus for RepositoryError {
    fn status_code(&self) -> u16 {
        match self {
            RepositoryError::NotFound { .. } => 404,
            RepositoryError::AlreadyExists { .. } => 409,
            RepositoryError::Invalid(_) => 400,
            RepositoryError::Cancelled => 503,
            RepositoryError::Unavailable(_) => 503,
            RepositoryError::QueryFailed(_) => 500,
        }
    }

    fn error_code(&self) -> &str {
        match self {
            RepositoryError::NotFound { .. } => "not_found",
            RepositoryError::AlreadyExists { .. } => "already_exists",
            RepositoryError::Invalid(_) => "invalid_record",
            RepositoryError::Cancelled => "cancelled",
            RepositoryError::Unavailable(_) => "store_unavailable",
            RepositoryError::QueryFailed(_) => "repository_error",
        }
    }
}

impl ToHttpStatus for Error {
    fn status_code(&self) -> u16 {
        match self {
            Error::Config { .. } => 400,
            Error::Validation(_) => 400,
            Error::Repository(e) => e.status_code(),
            Error::Database(_) => 500,
            Error::Io(_) => 500,
            Error::HttpClient(_) => 500,
            Error::Serialization(_) => 500,
            Error::ApiServerError(_) => 500,
            Error::ShuttingDown => 503,
        }
    }

    fn error_code(&self) -> &str {
        match self {
            Error::Config { .. } => "config_error",
            Error::Validation(_) => "validation_error",
            Error::Repository(e) => e.error_code(),
            Error::Database(_) => "database_error",
            Error::Io(_) => "io_error",
            Error::HttpClient(_) => "http_client_error",
            Error::Serialization(_) => "serialization_error",
            Error::ApiServerError(_) => "api_server_error",
            Error::ShuttingDown => "shutting_down",
        }
    }
}

impl From<Error> for ApiError {
    fn from(error: Error) -> Self {
        let code = error.error_code().to_string();
        let message = error.to_string();

        let details = match &error {
            Error::Repository(RepositoryError::NotFound { kind, id })
            | Error::Repository(RepositoryError::AlreadyExists { kind, id }) => {
                Some(serde_json::json!({
                    "kind": kind,
                    "id": id,
                }))
            }
            Error::Config { key: Some(key), .. } => Some(serde_json::json!({
                "key": key,
            })),
            _ => None,
        };

        ApiError {
            error: ErrorDetail {
                code,
                message,
                details,
            },
        }
    }
}
