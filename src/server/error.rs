use axum::Json;
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use crate::api::ErrorResponse;
use crate::error::WorkerError;

/// Errors surfaced by HTTP handlers, each mapped to one status code.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Unauthorized")]
    Unauthorized,

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error(transparent)]
    Worker(#[from] WorkerError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            ApiError::Unauthorized => {
                let mut response = (
                    StatusCode::UNAUTHORIZED,
                    Json(ErrorResponse::new("Unauthorized")),
                )
                    .into_response();
                response.headers_mut().insert(
                    header::WWW_AUTHENTICATE,
                    HeaderValue::from_static("Bearer realm=\"jobworker\""),
                );
                return response;
            }
            ApiError::BadRequest(msg) => (
                StatusCode::BAD_REQUEST,
                ErrorResponse::with_details("Bad request", msg.clone()),
            ),
            ApiError::Worker(WorkerError::NotFound(id)) => (
                StatusCode::NOT_FOUND,
                ErrorResponse::with_details("Job not found", format!("Job ID: {id}")),
            ),
            ApiError::Worker(WorkerError::InvalidState { status, .. }) => (
                StatusCode::CONFLICT,
                ErrorResponse::with_details("Job is not running", format!("status: {status}")),
            ),
            ApiError::Worker(err @ WorkerError::SpawnFailure { .. }) => {
                tracing::error!(error = %err, "job launch failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorResponse::with_details("Failed to start job", err.to_string()),
                )
            }
            ApiError::Worker(err @ WorkerError::WaitFailure(_)) => {
                tracing::error!(error = %err, "unexpected wait failure");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorResponse::new("Internal server error"),
                )
            }
        };

        (status, Json(body)).into_response()
    }
}
