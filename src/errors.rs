use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

use crate::store::StoreError;
use crate::validation::ValidationError;

/// Rejection reasons for an administrator's field draft.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FieldDraftError {
    #[error("field text must not be empty")]
    EmptyText,

    #[error("choice fields need at least one option")]
    NoOptions,
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("invalid administrator credentials")]
    AuthenticationFailed,

    #[error("kiosk token is invalid or expired")]
    Unauthorized,

    #[error("submission rejected: {0}")]
    Validation(#[from] ValidationError),

    #[error("invalid field: {0}")]
    InvalidField(#[from] FieldDraftError),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("persistence error: {0}")]
    Persistence(#[from] StoreError),

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_type, code, msg) = match &self {
            AppError::AuthenticationFailed => (
                StatusCode::UNAUTHORIZED,
                "authentication_error",
                "invalid_admin_key",
                "invalid or missing admin key".to_string(),
            ),
            AppError::Unauthorized => (
                StatusCode::FORBIDDEN,
                "authorization_error",
                "unauthorized_session",
                "Invalid or expired QR code. Request a current scan.".to_string(),
            ),
            AppError::Validation(e) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "validation_error",
                e.code(),
                e.to_string(),
            ),
            AppError::InvalidField(e) => (
                StatusCode::BAD_REQUEST,
                "invalid_request_error",
                "invalid_field",
                e.to_string(),
            ),
            AppError::NotFound(what) => (
                StatusCode::NOT_FOUND,
                "invalid_request_error",
                "not_found",
                format!("{} not found", what),
            ),
            AppError::Persistence(e) => {
                tracing::error!("Persistence error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "persistence_error",
                    "store_unavailable",
                    "storage operation failed; it was not applied".to_string(),
                )
            }
            AppError::Internal(e) => {
                tracing::error!("Internal error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "internal_server_error",
                    "internal server error".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": {
                "message": msg,
                "type": error_type,
                "code": code,
            }
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        let cases = [
            (AppError::AuthenticationFailed, StatusCode::UNAUTHORIZED),
            (AppError::Unauthorized, StatusCode::FORBIDDEN),
            (
                AppError::Validation(ValidationError::MissingTrainee),
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
            (
                AppError::InvalidField(FieldDraftError::NoOptions),
                StatusCode::BAD_REQUEST,
            ),
            (AppError::NotFound("record"), StatusCode::NOT_FOUND),
            (
                AppError::Persistence(StoreError::Unavailable("down".into())),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(err.into_response().status(), status);
        }
    }
}
