//! OpenAPI documentation and schema generation

use utoipa::OpenApi;

/// OpenAPI documentation for the paperboy HTTP API
///
/// Served as JSON at `/openapi.json`, and through Swagger UI at
/// `/swagger-ui` when enabled.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "paperboy HTTP API",
        version = "0.1.0",
        description = "Submit web articles for delivery to e-readers as e-books, and poll their progress",
        license(
            name = "MIT OR Apache-2.0"
        )
    ),
    paths(
        crate::api::routes::submit,
        crate::api::routes::submit_legacy,
        crate::api::routes::job_status,
        crate::api::routes::health_check,
        crate::api::routes::openapi_spec,
    ),
    components(
        schemas(
            crate::types::Submission,
            crate::types::SubmitResponse,
            crate::types::StatusReport,
        )
    ),
    tags(
        (name = "jobs", description = "Article submission and status polling"),
        (name = "system", description = "Health and API documentation")
    )
)]
pub struct ApiDoc;
