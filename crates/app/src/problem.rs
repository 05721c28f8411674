use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tracing::error;

use crate::service::JobServiceError;

#[derive(Debug, Serialize)]
struct ProblemDetails {
    #[serde(rename = "type")]
    problem_type: &'static str,
    title: &'static str,
    detail: String,
}

#[derive(Debug)]
pub struct ProblemResponse {
    status: StatusCode,
    body: ProblemDetails,
}

impl ProblemResponse {
    pub fn new<S: Into<String>>(status: StatusCode, problem_type: &'static str, detail: S) -> Self {
        Self {
            status,
            body: ProblemDetails {
                problem_type,
                title: status.canonical_reason().unwrap_or("error"),
                detail: detail.into(),
            },
        }
    }

    /// Stable label used for request metrics.
    pub fn problem_type(&self) -> &'static str {
        self.body.problem_type
    }
}

impl From<JobServiceError> for ProblemResponse {
    fn from(err: JobServiceError) -> Self {
        match err {
            JobServiceError::Validation(err) => {
                Self::new(StatusCode::BAD_REQUEST, "validation_failed", err.to_string())
            }
            JobServiceError::NotFound => {
                Self::new(StatusCode::NOT_FOUND, "job_not_found", "Job not found")
            }
            JobServiceError::Authorization => Self::new(
                StatusCode::FORBIDDEN,
                "forbidden",
                "Not authorized to access this job",
            ),
            JobServiceError::Conflict => Self::new(
                StatusCode::CONFLICT,
                "version_conflict",
                "Job was modified by another request; reload and retry",
            ),
            JobServiceError::Storage(err) => {
                error!(stage = "http", error = %err, "job storage failure");
                Self::new(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "storage_error",
                    "internal server error",
                )
            }
        }
    }
}

impl IntoResponse for ProblemResponse {
    fn into_response(self) -> Response {
        let mut response = Json(self.body).into_response();
        *response.status_mut() = self.status;
        response.headers_mut().insert(
            axum::http::header::CONTENT_TYPE,
            axum::http::HeaderValue::from_static("application/problem+json"),
        );
        response
    }
}
