use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        FromRequest, FromRequestParts, Path,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tracing::error;

use promo_admin_core::RepositoryError;

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

    pub fn not_found<S: Into<String>>(detail: S) -> Self {
        Self::new(StatusCode::NOT_FOUND, "not_found", detail)
    }

    pub fn bad_request<S: Into<String>>(problem_type: &'static str, detail: S) -> Self {
        Self::new(StatusCode::BAD_REQUEST, problem_type, detail)
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// `result` label for request counters: client mistakes are "rejected",
    /// server-side failures are "error".
    pub fn result_label(&self) -> &'static str {
        if self.status.is_server_error() {
            "error"
        } else {
            "rejected"
        }
    }
}

impl From<RepositoryError> for ProblemResponse {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::Conflict { .. } => Self::bad_request("conflict", err.to_string()),
            RepositoryError::Backend(_) => {
                error!(stage = "api", error = %err, "repository failure");
                Self::new(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "storage_failure",
                    "failed to access storage",
                )
            }
        }
    }
}

impl From<JsonRejection> for ProblemResponse {
    fn from(rejection: JsonRejection) -> Self {
        Self::new(rejection.status(), "invalid_body", rejection.body_text())
    }
}

impl From<PathRejection> for ProblemResponse {
    fn from(rejection: PathRejection) -> Self {
        Self::new(rejection.status(), "invalid_path", rejection.body_text())
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

/// JSON body extractor that rejects with a problem document.
#[derive(Debug, FromRequest)]
#[from_request(via(Json), rejection(ProblemResponse))]
pub struct ApiJson<T>(pub T);

/// Path extractor that rejects with a problem document.
#[derive(Debug, FromRequestParts)]
#[from_request(via(Path), rejection(ProblemResponse))]
pub struct ApiPath<T>(pub T);
