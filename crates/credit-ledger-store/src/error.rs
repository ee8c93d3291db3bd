//! Error types for ledger storage.

use credit_ledger_core::{LedgerError, TransactionId};

/// Result type for storage operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors that can occur in storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Database operation failed.
    #[error("database error: {0}")]
    Database(String),

    /// Serialization/deserialization failed.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Record not found.
    #[error("{entity} not found: {id}")]
    NotFound {
        /// Kind of record.
        entity: &'static str,
        /// Record key.
        id: String,
    },

    /// The operation key was already committed.
    #[error("duplicate operation: {source_id}")]
    DuplicateOperation {
        /// The correlation id of the rejected operation.
        source_id: String,
        /// Transaction written by the original operation.
        transaction_id: TransactionId,
    },

    /// A message cost with this id already exists.
    #[error("duplicate message: {message_id}")]
    DuplicateMessage {
        /// The message id.
        message_id: String,
    },
}

impl StoreError {
    pub(crate) fn database(err: impl std::fmt::Display) -> Self {
        Self::Database(err.to_string())
    }

    pub(crate) fn serialization(err: impl std::fmt::Display) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<StoreError> for LedgerError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::DuplicateOperation {
                source_id,
                transaction_id,
            } => Self::DuplicateOperation {
                source_id,
                transaction_id,
            },
            StoreError::DuplicateMessage { message_id } => Self::DuplicateMessage { message_id },
            StoreError::NotFound { entity: "tier", id } => Self::UnknownTier { tier_id: id },
            other => Self::StoreUnavailable(other.to_string()),
        }
    }
}
