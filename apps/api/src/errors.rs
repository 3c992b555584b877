use axum::{
    extract::rejection::BytesRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::render::RenderError;

/// JSON envelope for every failed request.
#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    ServiceUnavailable(String),

    /// Launch, navigation or capture failure, including a crashed render task.
    /// Carries the underlying message.
    #[error("{0}")]
    Render(String),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Render(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<RenderError> for AppError {
    fn from(err: RenderError) -> Self {
        match err {
            RenderError::MissingDocument | RenderError::UnresolvableOrigin => {
                AppError::BadRequest(err.to_string())
            }
            RenderError::ExecutableNotFound => AppError::ServiceUnavailable(err.to_string()),
            RenderError::TransientCapture(msg) | RenderError::Browser(msg) => AppError::Render(msg),
        }
    }
}

/// Body read failures (including the size cap) still answer with the JSON envelope.
impl From<BytesRejection> for AppError {
    fn from(rejection: BytesRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        match &self {
            AppError::BadRequest(msg) => tracing::debug!("Rejected render request: {msg}"),
            AppError::ServiceUnavailable(msg) => tracing::error!("Browser unavailable: {msg}"),
            AppError::Render(msg) => tracing::error!("Render failed: {msg}"),
        }

        let body = Json(ErrorBody {
            error: self.to_string(),
        });
        (status, body).into_response()
    }
}
