//! Error types for the subscription system.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

/// Subscription system error variants.
///
/// Validation errors are surfaced synchronously to the caller and never
/// retried. Not-found conditions during challenge response map to 404 so
/// that subscription existence is not leaked beyond what the protocol
/// already reveals.
#[derive(Debug, thiserror::Error)]
pub enum SubscriptionError {
    #[error("Account {0} does not own a known topic")]
    InvalidTopic(Uuid),

    #[error("Invalid callback URL: {0}")]
    InvalidCallback(String),

    #[error("Callback host is not allowed: {0}")]
    CallbackForbidden(String),

    #[error("Subscription not found")]
    SubscriptionNotFound,

    #[error("Internal error: {0}")]
    Internal(String),
}

/// JSON error response returned by subscription API endpoints.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    pub status: u16,
}

impl IntoResponse for SubscriptionError {
    fn into_response(self) -> Response {
        let (status, error_type) = match &self {
            SubscriptionError::InvalidTopic(_) => {
                (StatusCode::UNPROCESSABLE_ENTITY, "invalid_topic")
            }
            SubscriptionError::InvalidCallback(_) => {
                (StatusCode::UNPROCESSABLE_ENTITY, "invalid_callback")
            }
            SubscriptionError::CallbackForbidden(_) => {
                (StatusCode::FORBIDDEN, "callback_forbidden")
            }
            SubscriptionError::SubscriptionNotFound => {
                (StatusCode::NOT_FOUND, "subscription_not_found")
            }
            SubscriptionError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
        };

        let body = ErrorResponse {
            error: error_type.to_string(),
            message: self.to_string(),
            status: status.as_u16(),
        };

        (status, axum::Json(body)).into_response()
    }
}

pub type ApiResult<T> = Result<T, SubscriptionError>;
