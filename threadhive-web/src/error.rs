//! HTTP error responses
//!
//! Every error renders as `{"error": <code>, "message": <message>}`. Store
//! failures are logged here and reach the client only as a generic message.

use axum::{
    extract::rejection::{JsonRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde_json::json;
use crate::auth::TokenError;
use threadhive_community::{CommunityError, DenialClass};
use threadhive_core::CoreError;
use tracing::error;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Authentication required")]
    Unauthenticated,

    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("{message}")]
    BadRequest { code: &'static str, message: String },

    #[error(transparent)]
    Community(#[from] CommunityError),

    #[error(transparent)]
    Token(#[from] TokenError),
}

pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    pub fn bad_request(code: &'static str, message: impl Into<String>) -> Self {
        Self::BadRequest {
            code,
            message: message.into(),
        }
    }

    fn parts(&self) -> (StatusCode, &'static str, String) {
        match self {
            ApiError::Unauthenticated => (
                StatusCode::UNAUTHORIZED,
                "unauthenticated",
                "Authentication required".to_string(),
            ),
            ApiError::InvalidCredentials => (
                StatusCode::UNAUTHORIZED,
                "invalid_credentials",
                "Invalid email or password".to_string(),
            ),
            ApiError::Token(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
                "Server error".to_string(),
            ),
            ApiError::BadRequest { code, message } => {
                (StatusCode::BAD_REQUEST, *code, message.clone())
            }
            ApiError::Community(err) => match err {
                CommunityError::Denied { reason, .. } => {
                    let status = match err.denial_class() {
                        Some(DenialClass::Conflict) => StatusCode::CONFLICT,
                        Some(DenialClass::Rejected) => StatusCode::BAD_REQUEST,
                        _ => StatusCode::FORBIDDEN,
                    };
                    (status, reason.code(), reason.message().to_string())
                }
                CommunityError::Unauthenticated => (
                    StatusCode::UNAUTHORIZED,
                    "unauthenticated",
                    "Authentication required".to_string(),
                ),
                CommunityError::NotFound { resource } => (
                    StatusCode::NOT_FOUND,
                    "not_found",
                    format!("Not found: {}", resource),
                ),
                CommunityError::Validation { field, message } => (
                    StatusCode::BAD_REQUEST,
                    "validation_error",
                    format!("{}: {}", field, message),
                ),
                CommunityError::Contended { .. } => (
                    StatusCode::CONFLICT,
                    "concurrent_update",
                    err.to_string(),
                ),
                CommunityError::Store(_) => (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "Server error".to_string(),
                ),
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match &self {
            ApiError::Community(CommunityError::Store(err)) => {
                error!(error = %err, "Store failure while handling request");
            }
            ApiError::Token(err) => error!(error = %err, "Session token could not be issued"),
            _ => {}
        }

        let (status, code, message) = self.parts();
        let body = Json(json!({
            "error": code,
            "message": message,
        }));

        (status, body).into_response()
    }
}

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Validation { field, message } => {
                Self::Community(CommunityError::Validation { field, message })
            }
            other => Self::bad_request("validation_error", other.to_string()),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::bad_request("invalid_body", rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::bad_request("invalid_query", rejection.body_text())
    }
}
