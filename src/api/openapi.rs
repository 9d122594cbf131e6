//! OpenAPI documentation and schema generation
//!
//! This module defines the OpenAPI specification for the batch-fetch REST API
//! using utoipa for compile-time spec generation.

use utoipa::OpenApi;

/// OpenAPI documentation for the batch-fetch REST API
///
/// The spec can be accessed via:
/// - `/openapi.json` - JSON format OpenAPI specification
/// - `/swagger-ui` - Interactive Swagger UI documentation
#[derive(OpenApi)]
#[openapi(
    info(
        title = "batch-fetch REST API",
        version = "0.1.0",
        description = "Submit batches of URLs to fetch under a shared deadline, poll per-URL outcomes and retrieve stored files",
        license(
            name = "MIT OR Apache-2.0"
        )
    ),
    servers(
        (url = "http://localhost:8080", description = "Local development server")
    ),
    paths(
        // Jobs
        crate::api::routes::create_job,
        crate::api::routes::get_job,
        crate::api::routes::get_file,

        // System
        crate::api::routes::health_check,
        crate::api::routes::openapi_spec,
    ),
    components(schemas(
        crate::types::JobId,
        crate::types::FileId,
        crate::types::JobStatus,
        crate::types::FetchErrorCode,
        crate::types::ArtifactMetadata,

        crate::api::routes::CreateJobRequest,
        crate::api::routes::FileRequest,
        crate::api::routes::CreateJobResponse,
        crate::api::routes::JobResponse,
        crate::api::routes::FileResponse,
        crate::api::routes::FieldError,

        crate::error::ApiError,
        crate::error::ErrorDetail,
    )),
    tags(
        (name = "downloads", description = "Batch download jobs and their files"),
        (name = "system", description = "Health and API documentation")
    )
)]
pub struct ApiDoc;
