//! Credit transaction types.
//!
//! Every change to a balance appends exactly one `CreditTransaction`. Rows are
//! immutable once written.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{CreditBalance, LedgerError, TransactionId, UserId};

/// A ledger entry recording one balance change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreditTransaction {
    /// Unique transaction ID.
    pub id: TransactionId,

    /// The user whose balance was affected.
    pub user_id: UserId,

    /// Per-user insertion order, starting at 1.
    pub sequence: u64,

    /// Type of transaction.
    pub transaction_type: TransactionType,

    /// Signed amount. Negative for `spent` and `expired`.
    pub amount: i64,

    /// Balance before this entry was applied.
    pub balance_before: i64,

    /// Balance after this entry was applied.
    pub balance_after: i64,

    /// What caused the change.
    pub source_type: SourceType,

    /// Caller-supplied correlation id (message id, purchase id, ...).
    pub source_id: Option<String>,

    /// Human-readable description.
    pub description: String,

    /// Additional metadata.
    pub metadata: serde_json::Value,

    /// When the transaction was written.
    pub created_at: DateTime<Utc>,
}

impl CreditTransaction {
    /// Build the next entry on top of `balance`.
    ///
    /// The sequence number and the before/after snapshots are taken from
    /// `balance`, so the entry must be applied to that same record.
    #[must_use]
    pub fn record(
        balance: &CreditBalance,
        transaction_type: TransactionType,
        amount: i64,
        source: TransactionSource,
        now: DateTime<Utc>,
    ) -> Self {
        let description = source
            .description
            .unwrap_or_else(|| transaction_type.default_description(amount));

        Self {
            id: TransactionId::generate(),
            user_id: balance.user_id,
            sequence: balance.next_sequence(),
            transaction_type,
            amount,
            balance_before: balance.current_balance,
            balance_after: balance.current_balance.saturating_add(amount),
            source_type: source.source_type,
            source_id: source.source_id,
            description,
            metadata: source.metadata,
            created_at: now,
        }
    }

    /// Check the audit invariant `balance_after == balance_before + amount`.
    #[must_use]
    pub const fn is_balanced(&self) -> bool {
        matches!(self.balance_before.checked_add(self.amount), Some(after) if after == self.balance_after)
    }
}

/// Where a ledger entry came from.
#[derive(Debug, Clone, PartialEq)]
pub struct TransactionSource {
    /// Source category.
    pub source_type: SourceType,
    /// Correlation id used for idempotency.
    pub source_id: Option<String>,
    /// Description override.
    pub description: Option<String>,
    /// Metadata attached to the entry.
    pub metadata: serde_json::Value,
}

impl TransactionSource {
    /// A source with only a category.
    #[must_use]
    pub const fn new(source_type: SourceType) -> Self {
        Self {
            source_type,
            source_id: None,
            description: None,
            metadata: serde_json::Value::Null,
        }
    }

    /// Set the correlation id.
    #[must_use]
    pub fn with_source_id(mut self, source_id: Option<String>) -> Self {
        self.source_id = source_id;
        self
    }

    /// Set the description.
    #[must_use]
    pub fn with_description(mut self, description: Option<String>) -> Self {
        self.description = description;
        self
    }

    /// Set metadata on the entry.
    #[must_use]
    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }
}

/// Type of credit transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    /// Credits earned through an in-app action.
    Earned,

    /// Credits deducted for usage.
    Spent,

    /// Credits bought through a verified purchase.
    Purchased,

    /// Credits granted by the system (sign-up, monthly grant, promotion).
    Granted,

    /// Credits forfeited above the rollover cap.
    Expired,

    /// Credits returned after a failed or reversed charge.
    Refunded,
}

impl TransactionType {
    /// Check if this transaction type adds credits.
    #[must_use]
    pub const fn is_credit(&self) -> bool {
        matches!(
            self,
            Self::Earned | Self::Purchased | Self::Granted | Self::Refunded
        )
    }

    /// Check if this transaction type removes credits.
    #[must_use]
    pub const fn is_debit(&self) -> bool {
        matches!(self, Self::Spent | Self::Expired)
    }

    /// Whether callers may use this type with a grant.
    #[must_use]
    pub const fn is_grantable(&self) -> bool {
        self.is_credit()
    }

    /// Get the type name as a string.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Earned => "earned",
            Self::Spent => "spent",
            Self::Purchased => "purchased",
            Self::Granted => "granted",
            Self::Expired => "expired",
            Self::Refunded => "refunded",
        }
    }

    fn default_description(self, amount: i64) -> String {
        match self {
            Self::Earned => format!("Earned {amount} credits"),
            Self::Spent => format!("Spent {} credits", amount.unsigned_abs()),
            Self::Purchased => format!("Purchased {amount} credits"),
            Self::Granted => format!("Granted {amount} credits"),
            Self::Expired => format!("{} credits expired", amount.unsigned_abs()),
            Self::Refunded => format!("Refunded {amount} credits"),
        }
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionType {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "earned" => Ok(Self::Earned),
            "spent" => Ok(Self::Spent),
            "purchased" => Ok(Self::Purchased),
            "granted" => Ok(Self::Granted),
            "expired" => Ok(Self::Expired),
            "refunded" => Ok(Self::Refunded),
            other => Err(LedgerError::validation(format!(
                "unknown transaction type: {other}"
            ))),
        }
    }
}

/// What caused a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    /// Subscription creation or change.
    Subscription,
    /// One-time package purchase.
    Purchase,
    /// AI usage.
    Usage,
    /// Promotional credits.
    Promotion,
    /// Refund of a prior charge.
    Refund,
    /// Account set-up and data migrations.
    Migration,
    /// Recurring subscription grant.
    MonthlyGrant,
}

impl SourceType {
    /// Get the source name as a string.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Subscription => "subscription",
            Self::Purchase => "purchase",
            Self::Usage => "usage",
            Self::Promotion => "promotion",
            Self::Refund => "refund",
            Self::Migration => "migration",
            Self::MonthlyGrant => "monthly_grant",
        }
    }
}

impl fmt::Display for SourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceType {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "subscription" => Ok(Self::Subscription),
            "purchase" => Ok(Self::Purchase),
            "usage" => Ok(Self::Usage),
            "promotion" => Ok(Self::Promotion),
            "refund" => Ok(Self::Refund),
            "migration" => Ok(Self::Migration),
            "monthly_grant" => Ok(Self::MonthlyGrant),
            other => Err(LedgerError::validation(format!(
                "unknown source type: {other}"
            ))),
        }
    }
}
