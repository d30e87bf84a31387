//! HTTP mapping of catalog errors.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use bomwright_utils::{BomwrightError, ErrorResponse};

/// Error returned by handlers.
#[derive(Debug, thiserror::Error)]
#[error(transparent)]
pub struct ApiError(#[from] pub BomwrightError);

pub type ApiResult<T> = Result<T, ApiError>;

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.http_status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        if status.is_server_error() {
            tracing::error!(error = %self.0, "Request failed");
        } else {
            tracing::debug!(error = %self.0, "Request rejected");
        }

        (status, Json(ErrorResponse::from(self.0))).into_response()
    }
}

impl From<axum::extract::multipart::MultipartError> for ApiError {
    fn from(error: axum::extract::multipart::MultipartError) -> Self {
        Self(BomwrightError::validation("file", format!("Failed to read upload: {}", error)))
    }
}
