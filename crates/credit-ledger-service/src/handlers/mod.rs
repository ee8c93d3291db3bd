//! HTTP request handlers.

pub mod balance;
pub mod catalog;
pub mod health;
pub mod recommendations;
pub mod subscriptions;
pub mod transactions;
pub mod usage;

use chrono::{DateTime, Utc};
use serde::Serialize;

use credit_ledger_core::{CreditBalance, UserId};

use crate::error::ApiError;

/// Parse a user id path segment.
pub(crate) fn parse_user_id(raw: &str) -> Result<UserId, ApiError> {
    raw.parse()
        .map_err(|_| ApiError::Validation(format!("invalid user id: {raw}")))
}

/// Balance as returned by the API.
#[derive(Debug, Serialize)]
pub struct BalanceResponse {
    /// User ID.
    pub user_id: String,
    /// Spendable credits.
    pub current_balance: i64,
    /// Lifetime credits earned, granted or refunded.
    pub total_earned: i64,
    /// Lifetime credits spent.
    pub total_spent: i64,
    /// Lifetime credits purchased.
    pub total_purchased: i64,
    /// Current subscription tier.
    pub subscription_tier_id: Option<String>,
    /// When the last monthly grant was applied.
    pub last_monthly_grant: Option<DateTime<Utc>>,
}

impl From<CreditBalance> for BalanceResponse {
    fn from(balance: CreditBalance) -> Self {
        Self {
            user_id: balance.user_id.to_string(),
            current_balance: balance.current_balance,
            total_earned: balance.total_earned,
            total_spent: balance.total_spent,
            total_purchased: balance.total_purchased,
            subscription_tier_id: balance.subscription_tier_id,
            last_monthly_grant: balance.last_monthly_grant,
        }
    }
}
