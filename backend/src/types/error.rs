//! Universal error handling for the API

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use b2_pipeline::B2Error;
use serde::Serialize;

/// API error response envelope
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiErrorResponse {
    /// Whether the client should retry the request
    pub allow_retry: bool,
    /// Error details
    error: ErrorBody,
}

/// Error body containing code and message
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ErrorBody {
    /// Machine-readable error code
    pub code: &'static str,
    /// Human-readable error message
    pub message: &'static str,
}

/// Application error type that wraps the API error response
#[derive(Debug)]
pub struct AppError {
    status: StatusCode,
    inner: ApiErrorResponse,
}

impl AppError {
    /// Create a new application error
    #[must_use]
    pub const fn new(
        status: StatusCode,
        code: &'static str,
        msg: &'static str,
        retry: bool,
    ) -> Self {
        Self {
            status,
            inner: ApiErrorResponse {
                allow_retry: retry,
                error: ErrorBody { code, message: msg },
            },
        }
    }

    /// HTTP status of the error
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        self.status
    }

    /// Machine-readable error code
    #[must_use]
    pub const fn code(&self) -> &'static str {
        self.inner.error.code
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Log the error based on status code
        match self.status.as_u16() {
            400..=499 => tracing::warn!(
                "Client error: {} - {}",
                self.inner.error.code,
                self.inner.error.message
            ),
            500..=599 => tracing::error!(
                "Server error: {} - {}",
                self.inner.error.code,
                self.inner.error.message
            ),
            _ => {}
        }

        (self.status, Json(self.inner)).into_response()
    }
}

/// Convert JSON body rejections to application errors
impl From<JsonRejection> for AppError {
    fn from(err: JsonRejection) -> Self {
        tracing::warn!("JSON rejection: {err}");
        match err {
            JsonRejection::MissingJsonContentType(_) => Self::new(
                StatusCode::BAD_REQUEST,
                "invalid_content_type",
                "Missing Content-Type: application/json header",
                false,
            ),
            JsonRejection::JsonDataError(_) => Self::new(
                StatusCode::BAD_REQUEST,
                "invalid_action",
                "Unknown or missing action",
                false,
            ),
            _ => Self::new(
                StatusCode::BAD_REQUEST,
                "invalid_json",
                "Invalid JSON payload",
                false,
            ),
        }
    }
}

/// Status a pipeline failure maps to: 400 for caller input, 500 otherwise
#[must_use]
pub const fn pipeline_status(err: &B2Error) -> StatusCode {
    if err.is_client_error() {
        StatusCode::BAD_REQUEST
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    }
}

/// Convert pipeline errors to application errors
impl From<B2Error> for AppError {
    #[allow(clippy::cognitive_complexity)]
    fn from(err: B2Error) -> Self {
        match &err {
            B2Error::EmptyFile => {
                tracing::warn!("Empty file rejected");
                Self::new(
                    StatusCode::BAD_REQUEST,
                    "empty_file",
                    "File is empty",
                    false,
                )
            }
            B2Error::Auth { .. } => {
                tracing::error!("B2 authorization error: {err}");
                Self::new(
                    pipeline_status(&err),
                    "storage_auth_error",
                    "Storage provider rejected the credentials",
                    false,
                )
            }
            B2Error::BucketNotFound(bucket) => {
                tracing::error!("B2 bucket not found: {bucket}");
                Self::new(
                    pipeline_status(&err),
                    "bucket_not_found",
                    "Configured bucket does not exist",
                    false,
                )
            }
            B2Error::TicketAcquisition { .. } | B2Error::Upload { .. } => {
                tracing::error!("B2 upstream error: {err}");
                Self::new(
                    pipeline_status(&err),
                    "upstream_error",
                    "Storage provider temporarily unavailable",
                    true,
                )
            }
            B2Error::TicketMismatch { .. }
            | B2Error::Network(_)
            | B2Error::InvalidResponse(_) => {
                tracing::error!("B2 pipeline error: {err}");
                Self::new(
                    pipeline_status(&err),
                    "internal_error",
                    "Internal server error",
                    true,
                )
            }
        }
    }
}
