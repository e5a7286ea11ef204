use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// Error kinds from the HTTP error-kind table. These are codes, not types —
/// several variants share an HTTP status and differ only in `code`.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("{0}")]
    Validation(String),

    #[error("auth token missing, invalid, expired, or reused")]
    AuthExpired,

    #[error("forbidden")]
    Forbidden,

    #[error("not found")]
    NotFound,

    #[error("chunk with sequence {0} already exists")]
    DuplicateChunk(i32),

    #[error("session already completed")]
    AlreadyCompleted,

    #[error("upload exceeds the size limit")]
    UploadTooLarge,

    #[error("no chunks found for this session, cannot recover")]
    NoChunks,

    #[error("session is in '{0}' state")]
    InvalidSessionState(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    fn code(&self) -> &'static str {
        match self {
            AppError::Validation(_) => "VALIDATION_ERROR",
            AppError::AuthExpired => "AUTH_EXPIRED",
            AppError::Forbidden => "FORBIDDEN",
            AppError::NotFound => "NOT_FOUND",
            AppError::DuplicateChunk(_) => "DUPLICATE_CHUNK",
            AppError::AlreadyCompleted => "ALREADY_COMPLETED",
            AppError::UploadTooLarge => "UPLOAD_TOO_LARGE",
            AppError::NoChunks => "NO_CHUNKS",
            AppError::InvalidSessionState(_) => "INVALID_SESSION_STATE",
            AppError::Database(_) | AppError::Io(_) | AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::AuthExpired => StatusCode::UNAUTHORIZED,
            AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::DuplicateChunk(_) | AppError::AlreadyCompleted => StatusCode::CONFLICT,
            AppError::UploadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            AppError::NoChunks | AppError::InvalidSessionState(_) => StatusCode::BAD_REQUEST,
            AppError::Database(_) | AppError::Io(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match &self {
            AppError::Database(e) => error!("database error: {e}"),
            AppError::Io(e) => error!("io error: {e}"),
            AppError::Internal(msg) => error!("internal error: {msg}"),
            _ => {}
        }

        let status = self.status();
        let body = Json(json!({
            "code": self.code(),
            "message": self.to_string(),
        }));
        (status, body).into_response()
    }
}
