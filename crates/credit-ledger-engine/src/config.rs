//! Engine configuration.

use chrono::Duration;
use serde::{Deserialize, Serialize};

use credit_ledger_core::{PricingConfig, DEFAULT_INITIAL_BALANCE, DEFAULT_TIER_ID};

/// Tunables for the credit ledger engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// Credits granted when a user's balance is first read.
    pub initial_balance: i64,

    /// Tier assigned to new users.
    pub default_tier_id: String,

    /// Minimum days between monthly grants.
    pub grant_cycle_days: i64,

    /// Days of history the upgrade recommendation looks at.
    pub recommendation_window_days: i64,

    /// Days of history the upgrade prompt heuristic looks at.
    pub prompt_window_days: i64,

    /// Upper bound on a transaction page.
    pub max_page_size: usize,

    /// Token pricing for message charges.
    pub pricing: PricingConfig,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            initial_balance: DEFAULT_INITIAL_BALANCE,
            default_tier_id: DEFAULT_TIER_ID.to_string(),
            grant_cycle_days: 30,
            recommendation_window_days: 60,
            prompt_window_days: 30,
            max_page_size: 100,
            pricing: PricingConfig::default(),
        }
    }
}

impl LedgerConfig {
    /// The monthly grant cycle.
    #[must_use]
    pub fn grant_cycle(&self) -> Duration {
        Duration::days(self.grant_cycle_days)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_defaults() {
        let config: LedgerConfig =
            serde_json::from_str(r#"{"initial_balance": 25, "grant_cycle_days": 7}"#).unwrap();

        assert_eq!(config.initial_balance, 25);
        assert_eq!(config.grant_cycle(), Duration::days(7));
        assert_eq!(config.default_tier_id, "free");
        assert_eq!(config.max_page_size, 100);
    }
}
