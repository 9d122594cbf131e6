//! Batch download job handlers.

use super::{CreateJobRequest, CreateJobResponse, FieldError, JobResponse};
use crate::api::AppState;
use crate::error::{ApiError, Error};
use crate::types::{FileId, JobId};
use crate::utils::parse_duration;
use axum::{
    Json,
    body::Body,
    extract::{Path, State, rejection::JsonRejection},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use std::time::Duration;

/// POST /downloads - Submit a batch download job
///
/// The job is created in `in_progress` and executes in the background; poll
/// `GET /downloads/{job_id}` for the outcome of each URL.
#[utoipa::path(
    post,
    path = "/downloads",
    tag = "downloads",
    request_body = CreateJobRequest,
    responses(
        (status = 201, description = "Job created", body = CreateJobResponse),
        (status = 400, description = "Malformed body, missing fields or invalid timeout", body = ApiError),
        (status = 503, description = "Server is shutting down", body = ApiError),
        (status = 500, description = "Internal server error", body = ApiError)
    )
)]
pub async fn create_job(
    State(state): State<AppState>,
    body: Result<Json<CreateJobRequest>, JsonRejection>,
) -> Response {
    let request = match body {
        Ok(Json(request)) => request,
        Err(rejection) => return ApiError::validation(rejection.body_text()).into_response(),
    };

    let timeout = match validate_create(&request) {
        Ok(timeout) => timeout,
        Err(error) => return error.into_response(),
    };

    let urls: Vec<String> = request.files.into_iter().map(|f| f.url).collect();

    match state.orchestrator.start_job(timeout, urls).await {
        Ok(job) => (
            StatusCode::CREATED,
            Json(CreateJobResponse {
                id: job.id,
                status: job.status,
            }),
        )
            .into_response(),
        Err(e) => e.into_response(),
    }
}

/// Check required fields and parse the timeout, collecting every field error
fn validate_create(request: &CreateJobRequest) -> Result<Duration, ApiError> {
    let mut fields = Vec::new();

    if request.files.is_empty() {
        fields.push(FieldError {
            field: "files".into(),
            reason: "cannot be blank".into(),
        });
    }

    let timeout = if request.timeout.trim().is_empty() {
        fields.push(FieldError {
            field: "timeout".into(),
            reason: "cannot be blank".into(),
        });
        None
    } else {
        match parse_duration(request.timeout.trim()) {
            Ok(timeout) => Some(timeout),
            Err(e) => {
                let reason = match e {
                    Error::Validation(reason) => reason,
                    other => other.to_string(),
                };
                fields.push(FieldError {
                    field: "timeout".into(),
                    reason,
                });
                None
            }
        }
    };

    match timeout {
        Some(timeout) if fields.is_empty() => Ok(timeout),
        _ => {
            let message = fields
                .iter()
                .map(|f| format!("{}: {}", f.field, f.reason))
                .collect::<Vec<_>>()
                .join("; ");
            let mut error = ApiError::validation(message);
            error.error.details = Some(serde_json::json!({ "fields": fields }));
            Err(error)
        }
    }
}

/// GET /downloads/:job_id - Get job status and per-URL outcomes
#[utoipa::path(
    get,
    path = "/downloads/{job_id}",
    tag = "downloads",
    params(
        ("job_id" = String, Path, description = "Job ID")
    ),
    responses(
        (status = 200, description = "Job snapshot", body = JobResponse),
        (status = 404, description = "Job not found", body = ApiError),
        (status = 500, description = "Internal server error", body = ApiError)
    )
)]
pub async fn get_job(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> Result<Json<JobResponse>, Error> {
    let job = state.orchestrator.get_job(&JobId::from(job_id)).await?;
    Ok(Json(JobResponse::from(job)))
}

/// GET /downloads/:job_id/files/:file_id - Download a stored file
///
/// Responds with the raw body as fetched, using the upstream `Content-Type`.
#[utoipa::path(
    get,
    path = "/downloads/{job_id}/files/{file_id}",
    tag = "downloads",
    params(
        ("job_id" = String, Path, description = "Job ID"),
        ("file_id" = String, Path, description = "File ID from the job's files list")
    ),
    responses(
        (status = 200, description = "Raw file content", content_type = "application/octet-stream"),
        (status = 404, description = "File not found", body = ApiError),
        (status = 500, description = "Internal server error", body = ApiError)
    )
)]
pub async fn get_file(
    State(state): State<AppState>,
    Path((job_id, file_id)): Path<(String, String)>,
) -> Result<Response, Error> {
    let artifact = state
        .orchestrator
        .get_file(&JobId::from(job_id), &FileId::from(file_id))
        .await?;

    let mut response = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, artifact.metadata.mime_type.as_str());
    if artifact.metadata.size > 0 {
        response = response.header(header::CONTENT_LENGTH, artifact.metadata.size);
    }

    response
        .body(Body::from(artifact.data))
        .map_err(|e| Error::ApiServerError(e.to_string()))
}
