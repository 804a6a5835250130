//! API error types and HTTP mappings.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;
use tracing::error;

use reel_core::ServiceError;
use reel_models::VideoError;

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    InvalidRequest(String),

    #[error("{0}")]
    InvalidUserId(String),

    #[error("{0}")]
    InvalidTitle(String),

    #[error("{0}")]
    InvalidFileName(String),

    #[error("{0}")]
    InvalidVideoId(String),

    #[error("Video not found")]
    NotFound,

    #[error("Video processing has already completed")]
    AlreadyCompleted,

    #[error("An unexpected error occurred")]
    Internal(String),
}

impl ApiError {
    pub fn invalid_request(msg: impl Into<String>) -> Self {
        Self::InvalidRequest(msg.into())
    }

    pub fn invalid_user_id(msg: impl Into<String>) -> Self {
        Self::InvalidUserId(msg.into())
    }

    pub fn invalid_video_id(msg: impl Into<String>) -> Self {
        Self::InvalidVideoId(msg.into())
    }

    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::InvalidRequest(_)
            | ApiError::InvalidUserId(_)
            | ApiError::InvalidTitle(_)
            | ApiError::InvalidFileName(_)
            | ApiError::InvalidVideoId(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::AlreadyCompleted => StatusCode::CONFLICT,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable error kind carried in the response body.
    pub fn kind(&self) -> &'static str {
        match self {
            ApiError::InvalidRequest(_) => "invalid_request",
            ApiError::InvalidUserId(_) => "invalid_user_id",
            ApiError::InvalidTitle(_) => "invalid_title",
            ApiError::InvalidFileName(_) => "invalid_file_name",
            ApiError::InvalidVideoId(_) => "invalid_video_id",
            ApiError::NotFound => "video_not_found",
            ApiError::AlreadyCompleted => "video_already_completed",
            ApiError::Internal(_) => "internal_error",
        }
    }
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Video(VideoError::InvalidUserId) => {
                ApiError::InvalidUserId("User ID cannot be empty".into())
            }
            ServiceError::Video(VideoError::EmptyTitle) => {
                ApiError::InvalidTitle("Title cannot be empty".into())
            }
            ServiceError::Video(VideoError::TitleTooLong) => {
                ApiError::InvalidTitle("Title exceeds maximum length".into())
            }
            ServiceError::AlreadyCompleted => ApiError::AlreadyCompleted,
            err if err.is_not_found() => ApiError::NotFound,
            err => ApiError::Internal(err.to_string()),
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: &'static str,
    message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        // Internal causes go to the log, not to the client.
        if let ApiError::Internal(cause) = &self {
            error!(cause = %cause, "request failed");
        }

        let body = ErrorBody {
            error: self.kind(),
            message: self.to_string(),
        };

        (status, Json(body)).into_response()
    }
}
