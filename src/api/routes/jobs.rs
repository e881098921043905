//! Submission and status endpoints
//!
//! Every response is HTTP 200. Clients read the outcome from the JSON body.

use crate::api::state::AppState;
use crate::types::{StatusReport, Submission, SubmitResponse};
use axum::{
    Json,
    extract::{
        Path, Query, State,
        rejection::{JsonRejection, QueryRejection},
    },
};
use serde::Deserialize;

/// Query parameters of the legacy GET submission
#[derive(Debug, Default, Deserialize)]
pub struct LegacySubmitParams {
    /// Destination address
    #[serde(default)]
    pub email: String,
    /// Article URL
    #[serde(default)]
    pub url: String,
}

/// POST /ajax/submit.json - Submit an article
///
/// An undecodable body is treated as an empty submission and rejected by
/// validation like any other bad input.
#[utoipa::path(
    post,
    path = "/ajax/submit.json",
    tag = "jobs",
    request_body = Submission,
    responses(
        (status = 200, description = "Accepted (with id) or rejected (message only)", body = SubmitResponse)
    )
)]
pub async fn submit(
    State(state): State<AppState>,
    body: Result<Json<Submission>, JsonRejection>,
) -> Json<SubmitResponse> {
    let submission = match body {
        Ok(Json(submission)) => submission,
        Err(rejection) => {
            tracing::debug!(error = %rejection, "undecodable submission body");
            Submission::default()
        }
    };
    Json(state.pipeline.submit_for_client(submission).await)
}

/// GET /ajax/submit.json - Submit an article through query parameters
#[utoipa::path(
    get,
    path = "/ajax/submit.json",
    tag = "jobs",
    params(
        ("email" = String, Query, description = "Destination address"),
        ("url" = String, Query, description = "Article URL")
    ),
    responses(
        (status = 200, description = "Accepted (with id) or rejected (message only)", body = SubmitResponse)
    )
)]
pub async fn submit_legacy(
    State(state): State<AppState>,
    params: Result<Query<LegacySubmitParams>, QueryRejection>,
) -> Json<SubmitResponse> {
    let params = params.map(|Query(p)| p).unwrap_or_default();
    let submission = Submission::new(params.email, params.url);
    Json(state.pipeline.submit_for_client(submission).await)
}

/// GET /ajax/status/{id}.json - Poll a job's progress
#[utoipa::path(
    get,
    path = "/ajax/status/{id}.json",
    tag = "jobs",
    params(
        ("id" = String, Path, description = "Job ID returned by submission")
    ),
    responses(
        (status = 200, description = "Latest status; done=true means stop polling", body = StatusReport)
    )
)]
pub async fn job_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Json<StatusReport> {
    let key = id.strip_suffix(".json").unwrap_or(&id);
    Json(state.pipeline.lookup(key))
}
