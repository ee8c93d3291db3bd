//! Derived, advisory views over the ledger: usage statistics and upgrade
//! recommendations.

use serde::{Deserialize, Serialize};

use crate::SubscriptionTier;

/// Aggregated usage over a rolling window.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CreditUsageStats {
    /// Number of billed messages.
    pub total_messages: u64,
    /// Credits charged across all messages.
    pub total_credits_used: i64,
    /// Credits per message, 0 when there were no messages.
    pub average_credits_per_message: f64,
    /// Upstream API cost in cents.
    pub total_api_cost_cents: i64,
    /// Avatar with the most messages. Ties resolve to any tied avatar.
    pub most_used_avatar: Option<String>,
    /// Provider with the most messages. Ties resolve to any tied provider.
    pub most_used_provider: Option<String>,
    /// Per-day totals, keyed by UTC date (`YYYY-MM-DD`), oldest first.
    pub usage_by_day: Vec<UsageBreakdown>,
    /// Per-avatar totals, most credits first.
    pub usage_by_avatar: Vec<UsageBreakdown>,
}

/// One bucket of a usage breakdown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageBreakdown {
    /// Bucket key (date or avatar id).
    pub key: String,
    /// Credits charged in the bucket.
    pub credits: i64,
    /// Messages in the bucket.
    pub messages: u64,
}

/// Coarse classification of monthly usage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UsagePattern {
    /// 100 credits a month or less.
    Light,
    /// More than 100 credits a month.
    Moderate,
    /// More than 200 credits a month.
    Heavy,
}

impl UsagePattern {
    /// Classify an average monthly credit usage.
    #[must_use]
    pub fn from_monthly_usage(monthly_usage: f64) -> Self {
        if monthly_usage > 200.0 {
            Self::Heavy
        } else if monthly_usage > 100.0 {
            Self::Moderate
        } else {
            Self::Light
        }
    }
}

/// A suggested tier switch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpgradeRecommendation {
    /// The tier to switch to.
    pub recommended_tier: SubscriptionTier,
    /// The user's current tier, if any.
    pub current_tier_id: Option<String>,
    /// Why the tier is recommended.
    pub reason: String,
    /// Estimated monthly savings in whole dollars.
    pub potential_savings: i64,
    /// Usage classification.
    pub usage_pattern: UsagePattern,
    /// Average monthly credits used over the window.
    pub monthly_usage: f64,
    /// Average monthly purchase volume over the window.
    pub monthly_spend: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn usage_pattern_thresholds() {
        assert_eq!(UsagePattern::from_monthly_usage(0.0), UsagePattern::Light);
        assert_eq!(UsagePattern::from_monthly_usage(100.0), UsagePattern::Light);
        assert_eq!(
            UsagePattern::from_monthly_usage(100.5),
            UsagePattern::Moderate
        );
        assert_eq!(
            UsagePattern::from_monthly_usage(200.0),
            UsagePattern::Moderate
        );
        assert_eq!(UsagePattern::from_monthly_usage(201.0), UsagePattern::Heavy);
    }

    #[test]
    fn default_stats_are_empty() {
        let stats = CreditUsageStats::default();
        assert_eq!(stats.total_messages, 0);
        assert!(stats.usage_by_day.is_empty());
        assert!(stats.most_used_avatar.is_none());
    }
}
