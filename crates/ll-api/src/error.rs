//! # ApiError
//!
//! Turns engine errors into HTTP responses. Only `Validation` messages reach the
//! client verbatim; every other kind gets a fixed, generic wording.

use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use ll_core::error::AppError;
use serde_json::json;
use thiserror::Error;
use tracing::error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    App(#[from] AppError),
    /// No bearer token, or one that does not resolve to a live session
    #[error("authentication required")]
    Unauthenticated,
}

/// Identity provider failures.
impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        ApiError::App(AppError::from(err))
    }
}

impl ApiError {
    fn public_message(&self) -> String {
        match self {
            ApiError::App(AppError::Validation(msg)) => msg.clone(),
            ApiError::App(AppError::NotFound { .. }) => "not found".into(),
            ApiError::App(AppError::Authorization(_)) => "permission denied".into(),
            ApiError::App(AppError::InvalidState(_)) => "action no longer available".into(),
            ApiError::App(AppError::Conflict(_)) => "please retry".into(),
            ApiError::App(AppError::Internal(_)) => "internal error".into(),
            ApiError::Unauthenticated => "sign in required".into(),
        }
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::App(AppError::Validation(_)) => StatusCode::BAD_REQUEST,
            ApiError::App(AppError::NotFound { .. }) => StatusCode::NOT_FOUND,
            ApiError::App(AppError::Authorization(_)) => StatusCode::FORBIDDEN,
            ApiError::App(AppError::InvalidState(_) | AppError::Conflict(_)) => {
                StatusCode::CONFLICT
            }
            ApiError::App(AppError::Internal(_)) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Unauthenticated => StatusCode::UNAUTHORIZED,
        }
    }

    fn error_response(&self) -> HttpResponse {
        if let ApiError::App(AppError::Internal(detail)) = self {
            error!(%detail, "request failed");
        }
        HttpResponse::build(self.status_code()).json(json!({ "error": self.public_message() }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_validation_messages_pass_through() {
        let validation = ApiError::from(AppError::validation("rating must be between 1 and 5"));
        assert_eq!(validation.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(validation.public_message(), "rating must be between 1 and 5");

        let conflict = ApiError::from(AppError::Conflict("offer o1 was changed".into()));
        assert_eq!(conflict.status_code(), StatusCode::CONFLICT);
        assert_eq!(conflict.public_message(), "please retry");

        let missing = ApiError::from(AppError::not_found("offer", "o1"));
        assert_eq!(missing.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(missing.public_message(), "not found");
    }
}
