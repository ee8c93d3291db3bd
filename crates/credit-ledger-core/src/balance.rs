//! Balance records.
//!
//! One `CreditBalance` exists per user. It holds the spendable amount, lifetime
//! counters used for analytics, and the user's subscription association.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{CreditTransaction, TransactionType, UserId};

/// Credits granted to a user the first time their balance is read.
pub const DEFAULT_INITIAL_BALANCE: i64 = 10;

/// Tier assigned to a user the first time their balance is read.
pub const DEFAULT_TIER_ID: &str = "free";

/// A user's credit balance.
///
/// `current_balance` is the authoritative spendable amount. The lifetime
/// counters are analytics only and are not required to reconcile with it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreditBalance {
    /// The user this balance belongs to.
    pub user_id: UserId,

    /// Spendable credits. Never negative.
    pub current_balance: i64,

    /// Lifetime credits earned, granted or refunded.
    pub total_earned: i64,

    /// Lifetime credits spent.
    pub total_spent: i64,

    /// Lifetime credits purchased.
    pub total_purchased: i64,

    /// Current subscription tier, if any.
    pub subscription_tier_id: Option<String>,

    /// When the last monthly grant was applied.
    pub last_monthly_grant: Option<DateTime<Utc>>,

    /// Number of ledger entries written for this user.
    ///
    /// The next transaction gets `sequence + 1`.
    pub sequence: u64,

    /// When the record was created.
    pub created_at: DateTime<Utc>,

    /// When the record was last mutated.
    pub updated_at: DateTime<Utc>,
}

impl CreditBalance {
    /// Create an empty balance record with no credits and no ledger entries.
    #[must_use]
    pub fn empty(user_id: UserId, tier_id: Option<String>, now: DateTime<Utc>) -> Self {
        Self {
            user_id,
            current_balance: 0,
            total_earned: 0,
            total_spent: 0,
            total_purchased: 0,
            subscription_tier_id: tier_id,
            last_monthly_grant: None,
            sequence: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Check if the balance covers `required` credits.
    #[must_use]
    pub const fn has_sufficient_credits(&self, required: i64) -> bool {
        self.current_balance >= required
    }

    /// Sequence number the next ledger entry will get.
    #[must_use]
    pub const fn next_sequence(&self) -> u64 {
        self.sequence + 1
    }

    /// Apply a ledger entry built with [`CreditTransaction::record`].
    ///
    /// Moves the balance to the entry's `balance_after`, advances the sequence
    /// and bumps the lifetime counter matching the entry type.
    pub fn apply(&mut self, tx: &CreditTransaction) {
        debug_assert_eq!(tx.sequence, self.next_sequence());
        debug_assert_eq!(tx.balance_before, self.current_balance);

        self.current_balance = tx.balance_after;
        self.sequence = tx.sequence;
        self.updated_at = tx.created_at;

        match tx.transaction_type {
            TransactionType::Spent => {
                self.total_spent = self.total_spent.saturating_add(tx.amount.saturating_abs());
            }
            TransactionType::Purchased => {
                self.total_purchased = self.total_purchased.saturating_add(tx.amount);
            }
            TransactionType::Earned | TransactionType::Granted | TransactionType::Refunded => {
                self.total_earned = self.total_earned.saturating_add(tx.amount);
            }
            TransactionType::Expired => {}
        }
    }
}
