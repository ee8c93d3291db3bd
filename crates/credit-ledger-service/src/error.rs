//! API error types and responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use credit_ledger_core::LedgerError;

/// API error type.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Unauthorized - missing or invalid credentials.
    #[error("unauthorized")]
    Unauthorized,

    /// The request failed validation.
    #[error("validation error: {0}")]
    Validation(String),

    /// The referenced tier is not in the catalog.
    #[error("unknown subscription tier: {0}")]
    UnknownTier(String),

    /// The operation was already applied.
    #[error("duplicate operation: {source_id}")]
    DuplicateOperation {
        /// The caller-supplied correlation id.
        source_id: String,
        /// The transaction written by the original operation.
        transaction_id: String,
    },

    /// The message was already charged.
    #[error("duplicate message: {0}")]
    DuplicateMessage(String),

    /// The ledger store could not confirm the outcome.
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

/// JSON error response body.
#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    code: String,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<serde_json::Value>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message, details) = match &self {
            Self::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "unauthorized",
                self.to_string(),
                None,
            ),
            Self::Validation(msg) => (
                StatusCode::BAD_REQUEST,
                "validation_error",
                msg.clone(),
                None,
            ),
            Self::UnknownTier(tier_id) => (
                StatusCode::BAD_REQUEST,
                "unknown_tier",
                self.to_string(),
                Some(serde_json::json!({ "tier_id": tier_id })),
            ),
            Self::DuplicateOperation {
                source_id,
                transaction_id,
            } => (
                StatusCode::CONFLICT,
                "duplicate_operation",
                format!("Operation {source_id} already applied"),
                Some(serde_json::json!({
                    "source_id": source_id,
                    "transaction_id": transaction_id
                })),
            ),
            Self::DuplicateMessage(message_id) => (
                StatusCode::CONFLICT,
                "duplicate_message",
                format!("Message {message_id} already recorded"),
                None,
            ),
            Self::StoreUnavailable(msg) => {
                tracing::warn!(error = %msg, "Ledger store unavailable");
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "store_unavailable",
                    "The ledger could not confirm the operation; retry with the same source id"
                        .to_string(),
                    None,
                )
            }
            Self::Internal(msg) => {
                tracing::error!(error = %msg, "Internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "An internal error occurred".to_string(),
                    None,
                )
            }
        };

        let body = ErrorResponse {
            error: ErrorBody {
                code: code.to_string(),
                message,
                details,
            },
        };

        (status, Json(body)).into_response()
    }
}

impl From<LedgerError> for ApiError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::Validation(msg) => Self::Validation(msg),
            LedgerError::InvalidId(e) => Self::Validation(e.to_string()),
            LedgerError::UnknownTier { tier_id } => Self::UnknownTier(tier_id),
            LedgerError::DuplicateOperation {
                source_id,
                transaction_id,
            } => Self::DuplicateOperation {
                source_id,
                transaction_id: transaction_id.to_string(),
            },
            LedgerError::DuplicateMessage { message_id } => Self::DuplicateMessage(message_id),
            LedgerError::StoreUnavailable(msg) => Self::StoreUnavailable(msg),
        }
    }
}
