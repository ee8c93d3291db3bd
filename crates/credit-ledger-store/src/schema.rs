//! Database schema definitions and column families.
//!
//! This module defines the column families used in `RocksDB` storage.

/// Column family names for the `RocksDB` database.
pub mod cf {
    /// Balance records, keyed by `user_id`.
    pub const BALANCES: &str = "balances";

    /// Ledger entries, keyed by `transaction_id` (ULID).
    pub const TRANSACTIONS: &str = "transactions";

    /// Index: ledger entries by user, keyed by `user_id || sequence`.
    /// Value is the `transaction_id`.
    pub const TRANSACTIONS_BY_USER: &str = "transactions_by_user";

    /// Idempotency records, keyed by operation key.
    /// Value is the `transaction_id` the operation committed.
    pub const OPERATIONS: &str = "operations";

    /// Message costs, keyed by `user_id || created_at || message_id`.
    pub const MESSAGE_COSTS: &str = "message_costs";

    /// Index: message ids already recorded. Value is empty.
    pub const MESSAGE_IDS: &str = "message_ids";

    /// Subscription tiers, keyed by tier id.
    pub const TIERS: &str = "tiers";

    /// Credit packages, keyed by package id.
    pub const PACKAGES: &str = "packages";
}

/// Returns all column family names for database initialization.
#[must_use]
pub fn all_column_families() -> Vec<&'static str> {
    vec![
        cf::BALANCES,
        cf::TRANSACTIONS,
        cf::TRANSACTIONS_BY_USER,
        cf::OPERATIONS,
        cf::MESSAGE_COSTS,
        cf::MESSAGE_IDS,
        cf::TIERS,
        cf::PACKAGES,
    ]
}
