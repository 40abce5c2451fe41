//! Unified error handling for the dashboard server.
//!
//! Every layer has its own `thiserror` enum. Handlers return [`AppError`],
//! which maps each of them to a status code and a JSON body of the form
//! `{"error": "..."}`. Server-side failures are reported to Sentry and
//! their details are never sent to the browser.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use salonhub_core::UserId;
use salonhub_core::loyalty::LoyaltyError;

use crate::db::{LedgerError, RepositoryError};
use crate::services::{
    AuthError, CheckoutError, CloudinaryError, ContentServiceError, ImageGenerationError,
};

/// Application-level error type for the dashboard server.
#[derive(Debug, Error)]
pub enum AppError {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] RepositoryError),

    /// Sign-in or account creation failed.
    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),

    /// A sale could not be priced, recorded or voided.
    #[error("Checkout error: {0}")]
    Checkout(#[from] CheckoutError),

    /// A loyalty posting was rejected.
    #[error("Loyalty error: {0}")]
    Ledger(#[from] LedgerError),

    /// Content could not be loaded or saved.
    #[error("Content error: {0}")]
    Content(#[from] ContentServiceError),

    /// Cloudinary API operation failed.
    #[error("Cloudinary error: {0}")]
    Cloudinary(#[from] CloudinaryError),

    /// Image generation proxy failed.
    #[error("Image generation error: {0}")]
    ImageGeneration(#[from] ImageGenerationError),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// User is not authenticated.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// User lacks permission.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// The request conflicts with current state.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Well-formed request that failed validation.
    #[error("Unprocessable: {0}")]
    Unprocessable(String),

    /// An optional integration is not configured.
    #[error("Unavailable: {0}")]
    Unavailable(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        Self::Database(RepositoryError::Database(err))
    }
}

impl From<tower_sessions::session::Error> for AppError {
    fn from(err: tower_sessions::session::Error) -> Self {
        Self::Internal(format!("session error: {err}"))
    }
}

const fn repository_status(err: &RepositoryError) -> StatusCode {
    match err {
        RepositoryError::NotFound => StatusCode::NOT_FOUND,
        RepositoryError::Conflict(_) => StatusCode::CONFLICT,
        RepositoryError::Database(_) | RepositoryError::DataCorruption(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

const fn ledger_status(err: &LedgerError) -> StatusCode {
    match err {
        LedgerError::Repository(e) => repository_status(e),
        LedgerError::Loyalty(LoyaltyError::InsufficientPoints { .. }) => StatusCode::CONFLICT,
        LedgerError::Loyalty(LoyaltyError::NonPositive(_) | LoyaltyError::Overflow) => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
    }
}

impl AppError {
    /// HTTP status for this error.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::Database(e) => repository_status(e),
            Self::Ledger(e) => ledger_status(e),
            Self::Auth(e) => match e {
                AuthError::InvalidCredentials => StatusCode::UNAUTHORIZED,
                AuthError::AccountDisabled => StatusCode::FORBIDDEN,
                AuthError::UserAlreadyExists => StatusCode::CONFLICT,
                AuthError::InvalidEmail(_) | AuthError::WeakPassword(_) | AuthError::Invalid(_) => {
                    StatusCode::UNPROCESSABLE_ENTITY
                }
                AuthError::Repository(e) => repository_status(e),
                AuthError::PasswordHash => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Checkout(e) => match e {
                CheckoutError::Repository(e) => repository_status(e),
                CheckoutError::Ledger(e) => ledger_status(e),
                CheckoutError::NotFound(_) => StatusCode::NOT_FOUND,
                CheckoutError::InsufficientStock { .. }
                | CheckoutError::BranchInactive
                | CheckoutError::AlreadyVoided => StatusCode::CONFLICT,
                CheckoutError::Cart(_)
                | CheckoutError::UnknownItem { .. }
                | CheckoutError::Unavailable(_)
                | CheckoutError::ClientRequired
                | CheckoutError::NotAClient(_)
                | CheckoutError::Invalid(_) => StatusCode::UNPROCESSABLE_ENTITY,
            },
            Self::Content(e) => match e {
                ContentServiceError::Invalid(_) => StatusCode::UNPROCESSABLE_ENTITY,
                ContentServiceError::Repository(e) => repository_status(e),
            },
            Self::Cloudinary(e) => match e {
                CloudinaryError::InvalidUpload(_) => StatusCode::UNPROCESSABLE_ENTITY,
                CloudinaryError::NotFound(_) => StatusCode::NOT_FOUND,
                CloudinaryError::Http(_) | CloudinaryError::Api { .. } | CloudinaryError::Parse(_) => {
                    StatusCode::BAD_GATEWAY
                }
            },
            Self::ImageGeneration(e) => match e {
                ImageGenerationError::InvalidPrompt(_) => StatusCode::UNPROCESSABLE_ENTITY,
                ImageGenerationError::Http(_)
                | ImageGenerationError::Api { .. }
                | ImageGenerationError::Parse(_) => StatusCode::BAD_GATEWAY,
            },
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Unprocessable(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message safe to show to the user.
    fn public_message(&self) -> String {
        match self.status() {
            StatusCode::INTERNAL_SERVER_ERROR => return "Internal server error".to_string(),
            StatusCode::BAD_GATEWAY => return "External service error".to_string(),
            _ => {}
        }

        match self {
            Self::Database(RepositoryError::NotFound) => "not found".to_string(),
            Self::Database(RepositoryError::Conflict(msg)) => msg.clone(),
            Self::Database(e) => e.to_string(),
            Self::Auth(e) => e.to_string(),
            Self::Checkout(e) => e.to_string(),
            Self::Ledger(e) => e.to_string(),
            Self::Content(e) => e.to_string(),
            Self::Cloudinary(e) => e.to_string(),
            Self::ImageGeneration(e) => e.to_string(),
            Self::NotFound(msg)
            | Self::Unauthorized(msg)
            | Self::Forbidden(msg)
            | Self::BadRequest(msg)
            | Self::Conflict(msg)
            | Self::Unprocessable(msg)
            | Self::Unavailable(msg)
            | Self::Internal(msg) => msg.clone(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Log server errors with Sentry
        if status.is_server_error() && status != StatusCode::SERVICE_UNAVAILABLE {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        }

        (status, Json(json!({ "error": self.public_message() }))).into_response()
    }
}

/// Set the Sentry user context for the signed-in user.
pub fn set_sentry_user(user_id: UserId, email: Option<&str>) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            email: email.map(String::from),
            ..Default::default()
        }));
    });
}

/// Clear the Sentry user context.
pub fn clear_sentry_user() {
    sentry::configure_scope(|scope| {
        scope.set_user(None);
    });
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use salonhub_core::BranchId;

    fn get_status(err: AppError) -> StatusCode {
        err.into_response().status()
    }

    #[test]
    fn test_app_error_display() {
        let err = AppError::NotFound("appointment 12".to_string());
        assert_eq!(err.to_string(), "Not found: appointment 12");

        let err = AppError::BadRequest("invalid input".to_string());
        assert_eq!(err.to_string(), "Bad request: invalid input");
    }

    #[test]
    fn test_app_error_status_codes() {
        assert_eq!(
            get_status(AppError::NotFound("test".to_string())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            get_status(AppError::Unauthorized("test".to_string())),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            get_status(AppError::Forbidden("test".to_string())),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            get_status(AppError::BadRequest("test".to_string())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            get_status(AppError::Conflict("test".to_string())),
            StatusCode::CONFLICT
        );
        assert_eq!(
            get_status(AppError::Unprocessable("test".to_string())),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            get_status(AppError::Internal("test".to_string())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_nested_errors_map_through() {
        assert_eq!(
            AppError::Database(RepositoryError::NotFound).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            AppError::Auth(AuthError::InvalidCredentials).status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            AppError::Checkout(CheckoutError::AlreadyVoided).status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            AppError::Ledger(LedgerError::Loyalty(LoyaltyError::InsufficientPoints {
                branch: BranchId::new(1),
                available: 5,
                requested: 10,
            }))
            .status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            AppError::Cloudinary(CloudinaryError::Parse("bad".to_string())).status(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            AppError::ImageGeneration(ImageGenerationError::InvalidPrompt("empty".to_string()))
                .status(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
    }

    #[test]
    fn test_internal_details_hidden() {
        let err = AppError::Internal("connection string leaked".to_string());
        assert_eq!(err.public_message(), "Internal server error");

        let err = AppError::Database(RepositoryError::DataCorruption("row 7".to_string()));
        assert_eq!(err.public_message(), "Internal server error");

        let err = AppError::Database(RepositoryError::Conflict("email taken".to_string()));
        assert_eq!(err.public_message(), "email taken");
    }

    #[tokio::test]
    async fn test_body_is_json() {
        let response = AppError::Forbidden("not your branch".to_string()).into_response();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let value: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(value, json!({"error": "not your branch"}));
    }
}
