//! Storage layer for the credit ledger.
//!
//! This crate provides persistent storage for balances, the append-only
//! transaction log, idempotency records, per-message cost rows and the tier and
//! package catalog.
//!
//! Two backends implement [`Store`]:
//!
//! - [`MemoryStore`]: lock-protected maps, for tests and ephemeral deployments
//! - `RocksStore` (feature `rocksdb-backend`): `RocksDB` column families with
//!   CBOR-encoded values
//!
//! # Atomicity
//!
//! Every balance mutation goes through [`Store::transact`]. Implementations must
//! serialize `transact` calls for the same user across the whole
//! read-decide-write sequence and commit the balance, its ledger entries and the
//! idempotency record in one atomic write. This is what guarantees that two
//! concurrent spends against a balance that covers only one of them cannot
//! both succeed.
//!
//! # Example
//!
//! ```
//! use chrono::Utc;
//! use credit_ledger_core::{CreditBalance, UserId};
//! use credit_ledger_store::{LedgerWrite, MemoryStore, Store};
//!
//! let store = MemoryStore::new();
//! let user_id = UserId::generate();
//! let seed = LedgerWrite::new(CreditBalance::empty(user_id, None, Utc::now()));
//!
//! let balance = store.get_or_create_balance(&seed).unwrap();
//! assert_eq!(balance.current_balance, 0);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod keys;
mod locks;
pub mod memory;
#[cfg(feature = "rocksdb-backend")]
pub mod rocks;
pub mod schema;

pub use error::{Result, StoreError};
pub use memory::MemoryStore;
#[cfg(feature = "rocksdb-backend")]
pub use rocks::RocksStore;

use chrono::{DateTime, Utc};
use credit_ledger_core::{
    CreditBalance, CreditPackage, CreditTransaction, MessageCost, SourceType, SubscriptionTier,
    TransactionId, UserId,
};

/// A balance together with the ledger entries that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct LedgerWrite {
    /// The balance after all entries are applied.
    pub balance: CreditBalance,
    /// Entries in sequence order.
    pub entries: Vec<CreditTransaction>,
}

impl LedgerWrite {
    /// A write with no entries yet.
    #[must_use]
    pub const fn new(balance: CreditBalance) -> Self {
        Self {
            balance,
            entries: Vec::new(),
        }
    }

    /// Apply an entry to the balance and queue it for writing.
    pub fn push(&mut self, entry: CreditTransaction) {
        self.balance.apply(&entry);
        self.entries.push(entry);
    }

    /// The last entry, which the idempotency record points at.
    #[must_use]
    pub fn last_entry(&self) -> Option<&CreditTransaction> {
        self.entries.last()
    }
}

/// Outcome of the decide step of [`Store::transact`].
#[derive(Debug)]
pub enum Decision {
    /// Commit the write atomically.
    Commit(LedgerWrite),
    /// Leave the ledger untouched.
    Abort,
}

/// Idempotency key for a caller-correlated operation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OperationKey {
    /// The user the operation applies to.
    pub user_id: UserId,
    /// The operation's source category.
    pub source_type: SourceType,
    /// The caller-supplied correlation id.
    pub source_id: String,
}

impl OperationKey {
    /// Create a new operation key.
    #[must_use]
    pub fn new(user_id: UserId, source_type: SourceType, source_id: impl Into<String>) -> Self {
        Self {
            user_id,
            source_type,
            source_id: source_id.into(),
        }
    }
}

/// The storage trait defining all ledger operations.
///
/// This trait abstracts the storage layer, allowing for different
/// implementations (`RocksDB`, in-memory for testing).
pub trait Store: Send + Sync {
    // =========================================================================
    // Balance Operations
    // =========================================================================

    /// Get a balance by user ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_balance(&self, user_id: &UserId) -> Result<Option<CreditBalance>>;

    /// Insert `seed` if the user has no balance yet, otherwise return the
    /// existing balance untouched.
    ///
    /// Runs under the user's write guard, so concurrent first accesses create
    /// exactly one record.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_or_create_balance(&self, seed: &LedgerWrite) -> Result<CreditBalance>;

    /// Atomically read, decide and write a user's ledger.
    ///
    /// Under the user's write guard: rejects a previously committed
    /// `operation`, hands the current balance to `decide`, and on
    /// [`Decision::Commit`] writes the balance, the entries and the operation
    /// record together. Returns the committed write, or `None` on abort.
    ///
    /// # Errors
    ///
    /// - `StoreError::NotFound` if the user has no balance.
    /// - `StoreError::DuplicateOperation` if `operation` was already committed.
    /// - `StoreError::Database` if the write could not be confirmed.
    fn transact(
        &self,
        user_id: &UserId,
        operation: Option<&OperationKey>,
        decide: &mut dyn FnMut(&CreditBalance) -> Decision,
    ) -> Result<Option<LedgerWrite>>;

    /// Change a user's subscription association without touching credits.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if the user has no balance.
    fn set_subscription_tier(
        &self,
        user_id: &UserId,
        tier_id: Option<&str>,
    ) -> Result<CreditBalance>;

    // =========================================================================
    // Transaction Log
    // =========================================================================

    /// Get a transaction by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_transaction(&self, transaction_id: &TransactionId) -> Result<Option<CreditTransaction>>;

    /// List a user's transactions, newest first by sequence.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn list_transactions(
        &self,
        user_id: &UserId,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<CreditTransaction>>;

    /// List a user's transactions created at or after `since`, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn list_transactions_since(
        &self,
        user_id: &UserId,
        since: DateTime<Utc>,
    ) -> Result<Vec<CreditTransaction>>;

    /// Look up the transaction committed for an operation key.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn find_operation(&self, operation: &OperationKey) -> Result<Option<TransactionId>>;

    // =========================================================================
    // Message Costs
    // =========================================================================

    /// Record a message cost.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::DuplicateMessage` if the message id is taken.
    fn put_message_cost(&self, cost: &MessageCost) -> Result<()>;

    /// List a user's message costs created at or after `since`, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn list_message_costs_since(
        &self,
        user_id: &UserId,
        since: DateTime<Utc>,
    ) -> Result<Vec<MessageCost>>;

    // =========================================================================
    // Catalog
    // =========================================================================

    /// Insert or replace a subscription tier.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn put_tier(&self, tier: &SubscriptionTier) -> Result<()>;

    /// Get a subscription tier by id, active or not.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_tier(&self, tier_id: &str) -> Result<Option<SubscriptionTier>>;

    /// List all tiers, active or not, in no particular order.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn list_tiers(&self) -> Result<Vec<SubscriptionTier>>;

    /// Insert or replace a credit package.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn put_package(&self, package: &CreditPackage) -> Result<()>;

    /// List all packages, active or not, in no particular order.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn list_packages(&self) -> Result<Vec<CreditPackage>>;
}
