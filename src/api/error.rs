//! HTTP error mapping

use axum::{
    extract::rejection::BytesRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::error::JobError;

/// JSON body of every error response
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            details: None,
        }
    }

    pub fn with_details(error: impl Into<String>, details: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            details: Some(details.into()),
        }
    }
}

/// Errors surfaced by the HTTP layer
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Job(#[from] JobError),

    #[error("Request body rejected: {0}")]
    Body(#[from] BytesRejection),
}

pub type ApiResult<T> = Result<T, ApiError>;

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            ApiError::Job(err) => match err {
                JobError::InvalidInput(msg) => {
                    tracing::debug!(message = %msg, "Rejected invalid input");
                    (
                        StatusCode::BAD_REQUEST,
                        ErrorResponse::with_details("Invalid input", msg.clone()),
                    )
                }
                JobError::InvalidState { .. } => {
                    tracing::debug!(error = %err, "Rejected state transition");
                    (
                        StatusCode::CONFLICT,
                        ErrorResponse::with_details("Invalid state", err.to_string()),
                    )
                }
                JobError::NotFound(id) => {
                    tracing::debug!(job_id = %id, "Job not found");
                    (
                        StatusCode::NOT_FOUND,
                        ErrorResponse::with_details("Job not found", format!("Job ID: {}", id)),
                    )
                }
                JobError::NotReady { state } => (
                    StatusCode::CONFLICT,
                    ErrorResponse::with_details("Result not ready", format!("Job is {}", state)),
                ),
                JobError::Timeout { .. } => {
                    tracing::warn!(error = %err, "Request timed out");
                    (
                        StatusCode::GATEWAY_TIMEOUT,
                        ErrorResponse::with_details("Timeout", err.to_string()),
                    )
                }
                JobError::CapabilityError(msg) => {
                    tracing::warn!(message = %msg, "Upstream capability failed");
                    (
                        StatusCode::BAD_GATEWAY,
                        ErrorResponse::with_details("Capability error", msg.clone()),
                    )
                }
                JobError::InternalFailure(msg) => {
                    tracing::error!(message = %msg, "Internal server error");
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        ErrorResponse::new("Internal server error"),
                    )
                }
            },
            ApiError::Body(rejection) => {
                tracing::debug!(status = %rejection.status(), "Request body rejected");
                (
                    rejection.status(),
                    ErrorResponse::with_details("Invalid request body", rejection.body_text()),
                )
            }
        };

        (status, Json(body)).into_response()
    }
}
