use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tracing::error;

use super::validation::FieldError;

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
}

impl ErrorBody {
    pub fn new(msg: impl Into<String>) -> Self {
        Self { error: msg.into() }
    }
}

pub fn error_response(status: StatusCode, msg: impl Into<String>) -> Response {
    (status, Json(ErrorBody::new(msg))).into_response()
}

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("email already exists")]
    EmailExists,
    #[error("user not found")]
    UserNotFound,
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("validation failed")]
    Validation(Vec<FieldError>),
    #[error("deadline exceeded during {0}")]
    DeadlineExceeded(&'static str),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl ServiceError {
    pub fn status(&self) -> StatusCode {
        match self {
            ServiceError::EmailExists => StatusCode::CONFLICT,
            ServiceError::UserNotFound => StatusCode::NOT_FOUND,
            ServiceError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            ServiceError::Validation(_) => StatusCode::BAD_REQUEST,
            ServiceError::DeadlineExceeded(_) | ServiceError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(error = %self, "request failed");
            return error_response(status, "internal server error");
        }
        match self {
            ServiceError::Validation(fields) => (status, Json(fields)).into_response(),
            other => error_response(status, other.to_string()),
        }
    }
}
