//! HTTP rendering of `AuthError`.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use tracing::{debug, error, warn};

use super::types::{ErrorBody, ErrorDetail};
use crate::auth::AuthError;

impl AuthError {
    fn status_code_message(&self) -> (StatusCode, &'static str, String) {
        match self {
            err if err.is_unauthorized() => (
                StatusCode::UNAUTHORIZED,
                "UNAUTHORIZED",
                "Unauthorized".to_string(),
            ),
            Self::Forbidden => (StatusCode::FORBIDDEN, "FORBIDDEN", "Forbidden".to_string()),
            Self::BadRequest(message) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", message.clone()),
            Self::NotFound => (
                StatusCode::NOT_FOUND,
                "RESOURCE_NOT_FOUND",
                "Resource not found".to_string(),
            ),
            Self::Conflict(message) => (StatusCode::CONFLICT, "RESOURCE_CONFLICT", message.clone()),
            Self::Exchange(_) | Self::Profile(_) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "SERVICE_UNAVAILABLE",
                "Service unavailable".to_string(),
            ),
            _ => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                "Internal server error".to_string(),
            ),
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        match &self {
            Self::Internal(err) => error!("internal error: {err:#}"),
            Self::Exchange(err) | Self::Profile(err) => warn!("{self}: {err:#}"),
            other => debug!("request rejected: {other}"),
        }

        let (status, code, message) = self.status_code_message();
        let body = ErrorBody {
            error: ErrorDetail {
                code: code.to_string(),
                message,
            },
        };
        (status, Json(body)).into_response()
    }
}
