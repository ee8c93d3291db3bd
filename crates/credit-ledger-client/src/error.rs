//! Client error types.

/// Errors that can occur when using the credit ledger client.
///
/// Running out of credits is not an error: [`crate::CreditsClient::spend`]
/// returns `Ok(false)`.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The ledger could not confirm the outcome. Retry with the same source id.
    #[error("store unavailable: {message}")]
    StoreUnavailable {
        /// Error message.
        message: String,
    },

    /// The operation was already applied.
    #[error("duplicate operation: {transaction_id}")]
    DuplicateOperation {
        /// The caller-supplied correlation id.
        source_id: String,
        /// The transaction written by the original operation.
        transaction_id: String,
    },

    /// The request was rejected as invalid.
    #[error("validation error: {message}")]
    Validation {
        /// Error message.
        message: String,
    },

    /// Server returned an error response.
    #[error("API error: {code} - {message}")]
    Api {
        /// Error code.
        code: String,
        /// Error message.
        message: String,
        /// HTTP status code.
        status: u16,
    },

    /// A response body could not be decoded.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Invalid configuration.
    #[error("configuration error: {0}")]
    Configuration(String),
}

impl ClientError {
    /// Whether the same request may succeed if sent again.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::StoreUnavailable { .. } | Self::Http(_))
    }
}
