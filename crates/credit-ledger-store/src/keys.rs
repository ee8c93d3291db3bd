//! Key encoding utilities for `RocksDB`.
//!
//! This module provides functions for encoding and decoding keys used in column families.
//! Multi-part keys are big-endian so that byte order matches logical order.

use chrono::{DateTime, Utc};
use credit_ledger_core::{TransactionId, UserId};

use crate::OperationKey;

/// Create a balance key from a user ID.
#[must_use]
pub fn balance_key(user_id: &UserId) -> Vec<u8> {
    user_id.as_bytes().to_vec()
}

/// Create a transaction key from a transaction ID.
#[must_use]
pub fn transaction_key(transaction_id: &TransactionId) -> Vec<u8> {
    transaction_id.to_bytes().to_vec()
}

/// Create a user-transaction index key.
///
/// Format: `user_id (16 bytes) || sequence (8 bytes, big-endian)`
///
/// Entries for a user therefore iterate in insertion order.
#[must_use]
pub fn user_transaction_key(user_id: &UserId, sequence: u64) -> Vec<u8> {
    let mut key = Vec::with_capacity(24);
    key.extend_from_slice(user_id.as_bytes());
    key.extend_from_slice(&sequence.to_be_bytes());
    key
}

/// Create a prefix for iterating everything stored under a user.
#[must_use]
pub fn user_prefix(user_id: &UserId) -> Vec<u8> {
    user_id.as_bytes().to_vec()
}

/// Decode a transaction ID stored as an index value.
#[must_use]
pub fn transaction_id_from_value(value: &[u8]) -> Option<TransactionId> {
    let bytes: [u8; 16] = value.try_into().ok()?;
    Some(TransactionId::from_bytes(bytes))
}

/// Create an idempotency key.
///
/// Format: `user_id (16 bytes) || source_type || 0x00 || source_id`
#[must_use]
pub fn operation_key(operation: &OperationKey) -> Vec<u8> {
    let source_type = operation.source_type.as_str();
    let mut key = Vec::with_capacity(16 + source_type.len() + 1 + operation.source_id.len());
    key.extend_from_slice(operation.user_id.as_bytes());
    key.extend_from_slice(source_type.as_bytes());
    key.push(0);
    key.extend_from_slice(operation.source_id.as_bytes());
    key
}

/// Encode a timestamp so that byte order matches time order, including
/// timestamps before the epoch.
#[must_use]
pub fn timestamp_bytes(at: DateTime<Utc>) -> [u8; 8] {
    let millis = at.timestamp_millis();
    (u64::from_be_bytes(millis.to_be_bytes()) ^ (1 << 63)).to_be_bytes()
}

/// Create a message cost key.
///
/// Format: `user_id (16 bytes) || created_at (8 bytes) || message_id`
#[must_use]
pub fn message_cost_key(user_id: &UserId, created_at: DateTime<Utc>, message_id: &str) -> Vec<u8> {
    let mut key = Vec::with_capacity(24 + message_id.len());
    key.extend_from_slice(user_id.as_bytes());
    key.extend_from_slice(&timestamp_bytes(created_at));
    key.extend_from_slice(message_id.as_bytes());
    key
}

/// Create the lower bound for scanning a user's message costs from `since`.
#[must_use]
pub fn message_cost_lower_bound(user_id: &UserId, since: DateTime<Utc>) -> Vec<u8> {
    let mut key = Vec::with_capacity(24);
    key.extend_from_slice(user_id.as_bytes());
    key.extend_from_slice(&timestamp_bytes(since));
    key
}

/// Create a message id index key.
#[must_use]
pub fn message_id_key(message_id: &str) -> Vec<u8> {
    message_id.as_bytes().to_vec()
}

/// Create a catalog key (tier or package id).
#[must_use]
pub fn catalog_key(id: &str) -> Vec<u8> {
    id.as_bytes().to_vec()
}
