use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

use crate::agents::ServiceError;
use crate::db::StoreError;
use crate::intake::IntakeError;
use crate::report::ReportError;

/// User-facing failures. Validation errors are shown next to the control that
/// caused them and are never persisted.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    CredentialResolution(String),

    #[error("{0}")]
    Service(String),

    #[error("{0}")]
    NotFound(String),

    #[error("Authentication required.")]
    Unauthorized,

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotReady(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("{0}")]
    Internal(String),
}

impl AppError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    fn parts(&self) -> (StatusCode, &'static str) {
        match self {
            AppError::Validation(_) => (StatusCode::BAD_REQUEST, "validation"),
            AppError::CredentialResolution(_) => (StatusCode::CONFLICT, "credential_resolution"),
            AppError::Service(_) => (StatusCode::BAD_GATEWAY, "service"),
            AppError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, "unauthorized"),
            AppError::Forbidden(_) => (StatusCode::FORBIDDEN, "forbidden"),
            AppError::NotReady(_) => (StatusCode::CONFLICT, "not_ready"),
            AppError::Store(StoreError::DuplicateLogin(_)) => {
                (StatusCode::BAD_REQUEST, "validation")
            }
            AppError::Store(StoreError::JobNotFound(_)) => (StatusCode::NOT_FOUND, "not_found"),
            AppError::Store(_) => (StatusCode::INTERNAL_SERVER_ERROR, "store"),
            AppError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
        }
    }
}

impl From<IntakeError> for AppError {
    fn from(err: IntakeError) -> Self {
        AppError::Validation(err.to_string())
    }
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        AppError::Service(err.to_string())
    }
}

impl From<ReportError> for AppError {
    fn from(err: ReportError) -> Self {
        match err {
            ReportError::NotCompleted(_) => AppError::NotReady(err.to_string()),
            other => AppError::Internal(other.to_string()),
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_type) = self.parts();
        let message = match &self {
            AppError::Store(StoreError::DuplicateLogin(_))
            | AppError::Store(StoreError::JobNotFound(_)) => {
                self.to_string()
            }
            AppError::Store(err) => {
                tracing::error!("Store error: {:?}", err);
                "Database error occurred".to_string()
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                msg.clone()
            }
            _ => self.to_string(),
        };

        let body = Json(ErrorResponse {
            error: error_type.to_string(),
            message,
        });
        (status, body).into_response()
    }
}
