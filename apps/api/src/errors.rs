use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::admin::draft::FormError;
use crate::auth::{SessionError, LOGIN_REDIRECT};
use crate::store::StoreError;

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Store error: {0}")]
    Store(StoreError),

    #[error("Session error: {0}")]
    Session(String),
}

impl From<StoreError> for AppError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(id) => AppError::NotFound(format!("Package {id} not found")),
            other => AppError::Store(other),
        }
    }
}

impl From<FormError> for AppError {
    fn from(e: FormError) -> Self {
        match e {
            FormError::IndexOutOfBounds { .. }
            | FormError::InvalidValue { .. }
            | FormError::Validation(_) => AppError::Validation(e.to_string()),
            FormError::Busy => AppError::Conflict(e.to_string()),
            FormError::NotFound(_) => AppError::NotFound(e.to_string()),
            FormError::Store(e) => e.into(),
        }
    }
}

impl From<SessionError> for AppError {
    fn from(e: SessionError) -> Self {
        match e {
            SessionError::InvalidCredentials | SessionError::Unauthenticated => {
                AppError::Unauthorized(e.to_string())
            }
            SessionError::Backend(msg) => AppError::Session(msg),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone()),
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
            AppError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED", msg.clone()),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg.clone()),
            AppError::Store(e) => {
                tracing::error!("Store error: {e}");
                (
                    StatusCode::BAD_GATEWAY,
                    "STORE_ERROR",
                    "The package store could not be reached".to_string(),
                )
            }
            AppError::Session(msg) => {
                tracing::error!("Session backend error: {msg}");
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "SESSION_ERROR",
                    "Sessions are temporarily unavailable".to_string(),
                )
            }
        };

        let mut error = json!({
            "code": code,
            "message": message
        });
        match &self {
            AppError::Store(_) => error["retryable"] = json!(true),
            AppError::Unauthorized(_) => error["redirect"] = json!(LOGIN_REDIRECT),
            _ => {}
        }

        (status, Json(json!({ "error": error }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_form_errors_map_to_status() {
        let cases = [
            (FormError::Validation(vec!["Title is required".into()]), StatusCode::BAD_REQUEST),
            (FormError::Busy, StatusCode::CONFLICT),
            (FormError::NotFound(Uuid::nil()), StatusCode::NOT_FOUND),
            (
                FormError::Store(StoreError::Unavailable("down".into())),
                StatusCode::BAD_GATEWAY,
            ),
            (
                FormError::Store(StoreError::NotFound(Uuid::nil())),
                StatusCode::NOT_FOUND,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(AppError::from(err).into_response().status(), status);
        }
    }

    #[test]
    fn test_session_errors_are_unauthorized() {
        let response = AppError::from(SessionError::Unauthenticated).into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let response = AppError::from(SessionError::Backend("redis down".into())).into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
