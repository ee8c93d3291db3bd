//! Upgrade recommendations derived from purchase and usage history.

use chrono::{DateTime, Utc};

use credit_ledger_core::{
    CreditTransaction, Result, SourceType, SubscriptionTier, UpgradeRecommendation, UsagePattern,
    UserId,
};

use crate::analytics::window_start;
use crate::CreditLedger;

/// Length of a month when averaging over the recommendation window.
const DAYS_PER_MONTH: f64 = 30.0;

impl CreditLedger {
    /// Suggest a paid tier that would be cheaper than the user's purchases.
    ///
    /// Returns `None` when the user has no transactions in the window or no
    /// active paid tier qualifies.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::StoreUnavailable` if the store fails.
    pub fn get_upgrade_recommendation(
        &self,
        user_id: &UserId,
        now: DateTime<Utc>,
    ) -> Result<Option<UpgradeRecommendation>> {
        let window_days = self.config.recommendation_window_days;
        let transactions = self.transactions_in_window(user_id, window_days, now)?;
        if transactions.is_empty() {
            return Ok(None);
        }

        let current_tier_id = self
            .store
            .get_balance(user_id)?
            .and_then(|balance| balance.subscription_tier_id);
        let tiers = self.list_tiers()?;

        Ok(recommend(&transactions, &tiers, current_tier_id, window_days))
    }

    /// Whether the client should show a generic upgrade prompt.
    ///
    /// Users on an active paid tier never see it. Everyone else sees it after
    /// repeated credit purchases in the prompt window. The prompt may show
    /// even when [`Self::get_upgrade_recommendation`] has nothing to offer.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::StoreUnavailable` if the store fails.
    pub fn should_show_upgrade_prompt(&self, user_id: &UserId, now: DateTime<Utc>) -> Result<bool> {
        let tier_id = self
            .store
            .get_balance(user_id)?
            .and_then(|balance| balance.subscription_tier_id);
        if let Some(tier_id) = tier_id {
            let subscribed = self
                .store
                .get_tier(&tier_id)?
                .is_some_and(|tier| tier.is_active && tier.is_paid());
            if subscribed {
                return Ok(false);
            }
        }

        let transactions =
            self.transactions_in_window(user_id, self.config.prompt_window_days, now)?;
        Ok(purchase_count(&transactions) >= 2)
    }

    fn transactions_in_window(
        &self,
        user_id: &UserId,
        window_days: i64,
        now: DateTime<Utc>,
    ) -> Result<Vec<CreditTransaction>> {
        let since = window_start(now, window_days);
        Ok(self
            .store
            .list_transactions_since(user_id, since)?
            .into_iter()
            .filter(|tx| tx.created_at <= now)
            .collect())
    }
}

/// Pick the first tier, in the given order, that covers the user's usage and
/// costs less than their purchases.
#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
pub(crate) fn recommend(
    transactions: &[CreditTransaction],
    tiers: &[SubscriptionTier],
    current_tier_id: Option<String>,
    window_days: i64,
) -> Option<UpgradeRecommendation> {
    let purchases = purchase_count(transactions);
    let total_purchased: i64 = transactions
        .iter()
        .filter(|tx| tx.source_type == SourceType::Purchase)
        .map(|tx| tx.amount)
        .sum();
    let total_used: i64 = transactions
        .iter()
        .filter(|tx| tx.source_type == SourceType::Usage)
        .map(|tx| tx.amount)
        .sum::<i64>()
        .abs();

    let months = window_days as f64 / DAYS_PER_MONTH;
    let monthly_usage = total_used as f64 / months;
    let monthly_spend = total_purchased as f64 / months;

    let tier = tiers.iter().filter(|tier| tier.is_active && tier.is_paid()).find(|tier| {
        monthly_usage <= tier.monthly_credits as f64 && monthly_spend > tier.price_dollars()
    })?;

    let potential_savings = (monthly_spend - tier.price_dollars()).round() as i64;
    let reason = if purchases >= 2 {
        format!(
            "Multiple credit purchases ({purchases} recently). {} covers your usage for ${:.2} a month.",
            tier.name,
            tier.price_dollars()
        )
    } else {
        format!(
            "Switching to {} could save you about ${potential_savings} a month.",
            tier.name
        )
    };

    Some(UpgradeRecommendation {
        recommended_tier: tier.clone(),
        current_tier_id,
        reason,
        potential_savings,
        usage_pattern: UsagePattern::from_monthly_usage(monthly_usage),
        monthly_usage,
        monthly_spend,
    })
}

fn purchase_count(transactions: &[CreditTransaction]) -> usize {
    transactions
        .iter()
        .filter(|tx| tx.source_type == SourceType::Purchase)
        .count()
}
