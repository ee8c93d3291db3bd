//! Error types for the credit ledger.

use crate::ids::IdError;
use crate::TransactionId;

/// Result type for ledger operations.
pub type Result<T> = std::result::Result<T, LedgerError>;

/// Errors that can occur in ledger operations.
///
/// An insufficient balance is deliberately absent: a declined spend is an
/// ordinary outcome and is reported as a value, not an error.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    /// The request was rejected before touching the store.
    #[error("validation error: {0}")]
    Validation(String),

    /// A spend or grant with this correlation id was already applied.
    #[error("duplicate operation: {source_id} (already applied as {transaction_id})")]
    DuplicateOperation {
        /// The caller-supplied correlation id.
        source_id: String,
        /// The transaction written by the original operation.
        transaction_id: TransactionId,
    },

    /// A message cost for this message id was already recorded.
    #[error("duplicate message: {message_id}")]
    DuplicateMessage {
        /// The message id.
        message_id: String,
    },

    /// The referenced subscription tier does not exist.
    #[error("unknown subscription tier: {tier_id}")]
    UnknownTier {
        /// The tier id that was not found.
        tier_id: String,
    },

    /// The store could not be reached or the write could not be confirmed.
    ///
    /// Callers must treat the outcome as unknown and retry with the same
    /// correlation id.
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    /// Invalid identifier.
    #[error("invalid identifier: {0}")]
    InvalidId(#[from] IdError),
}

impl LedgerError {
    /// Build a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Whether a retry with backoff may succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::StoreUnavailable(_))
    }
}
