use super::types::ErrorResponse;
use crate::error::BgRemovalError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};

/// Failure of an HTTP request, rendered as `{"detail": ...}`
#[derive(Debug)]
pub enum ApiError {
    /// Rejected before any processing: 400
    BadRequest(String),
    /// Failure while loading a model or processing an image: 500
    Processing(String),
}

impl ApiError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    /// Wrap a processing failure with the standard prefix
    pub fn processing(error: &BgRemovalError) -> Self {
        Self::Processing(format!("Error processing image: {error}"))
    }

    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Processing(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<BgRemovalError> for ApiError {
    fn from(error: BgRemovalError) -> Self {
        if error.is_client_error() {
            Self::BadRequest(error.to_string())
        } else {
            Self::processing(&error)
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let detail = match self {
            Self::BadRequest(msg) | Self::Processing(msg) => msg,
        };
        if status.is_server_error() {
            tracing::error!(%status, %detail, "request failed");
        } else {
            tracing::debug!(%status, %detail, "request rejected");
        }
        (status, Json(ErrorResponse { detail })).into_response()
    }
}
