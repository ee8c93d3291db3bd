//! Usage analytics over recorded message costs.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Duration, Utc};

use credit_ledger_core::{
    CreditUsageStats, LedgerError, MessageCost, Result, UsageBreakdown, UserId,
};

use crate::CreditLedger;

impl CreditLedger {
    /// Aggregate a user's message costs over the last `days_back` days.
    ///
    /// # Errors
    ///
    /// - `LedgerError::Validation` if `days_back` is negative.
    /// - `LedgerError::StoreUnavailable` if the store fails.
    pub fn get_usage_stats(
        &self,
        user_id: &UserId,
        days_back: i64,
        now: DateTime<Utc>,
    ) -> Result<CreditUsageStats> {
        if days_back < 0 {
            return Err(LedgerError::validation("days back must not be negative"));
        }

        let since = window_start(now, days_back);
        let costs: Vec<_> = self
            .store
            .list_message_costs_since(user_id, since)?
            .into_iter()
            .filter(|cost| cost.created_at <= now)
            .collect();

        Ok(summarize(&costs))
    }
}

/// Start of a window reaching `days` back from `now`.
///
/// Windows longer than chrono can represent start at the earliest
/// representable time.
pub(crate) fn window_start(now: DateTime<Utc>, days: i64) -> DateTime<Utc> {
    Duration::try_days(days)
        .and_then(|window| now.checked_sub_signed(window))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// Fold message costs into usage statistics.
#[allow(clippy::cast_precision_loss)]
pub(crate) fn summarize(costs: &[MessageCost]) -> CreditUsageStats {
    if costs.is_empty() {
        return CreditUsageStats::default();
    }

    let total_messages = costs.len() as u64;
    let total_credits_used: i64 = costs.iter().map(|c| c.credits_charged).sum();
    let total_api_cost_cents = costs.iter().map(|c| c.api_cost_cents).sum();

    let mut by_day: BTreeMap<String, UsageBreakdown> = BTreeMap::new();
    let mut by_avatar: HashMap<&str, UsageBreakdown> = HashMap::new();
    let mut provider_counts: HashMap<&str, u64> = HashMap::new();

    for cost in costs {
        let day = cost.created_at.format("%Y-%m-%d").to_string();
        add(by_day.entry(day.clone()).or_insert_with(|| bucket(day)), cost);
        add(
            by_avatar
                .entry(cost.avatar_id.as_str())
                .or_insert_with(|| bucket(cost.avatar_id.clone())),
            cost,
        );
        *provider_counts.entry(cost.provider.as_str()).or_default() += 1;
    }

    let most_used_avatar = by_avatar
        .values()
        .max_by_key(|b| b.messages)
        .map(|b| b.key.clone());
    let most_used_provider = provider_counts
        .into_iter()
        .max_by_key(|(_, count)| *count)
        .map(|(provider, _)| provider.to_string());

    let mut usage_by_avatar: Vec<_> = by_avatar.into_values().collect();
    usage_by_avatar.sort_by(|a, b| b.credits.cmp(&a.credits));

    CreditUsageStats {
        total_messages,
        total_credits_used,
        average_credits_per_message: total_credits_used as f64 / total_messages as f64,
        total_api_cost_cents,
        most_used_avatar,
        most_used_provider,
        usage_by_day: by_day.into_values().collect(),
        usage_by_avatar,
    }
}

const fn bucket(key: String) -> UsageBreakdown {
    UsageBreakdown {
        key,
        credits: 0,
        messages: 0,
    }
}

fn add(bucket: &mut UsageBreakdown, cost: &MessageCost) {
    bucket.credits += cost.credits_charged;
    bucket.messages += 1;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use credit_ledger_core::ConversationId;

    fn cost(avatar: &str, provider: &str, credits: i64, at: DateTime<Utc>) -> MessageCost {
        MessageCost {
            message_id: format!("{avatar}-{}", at.timestamp_millis()),
            user_id: UserId::generate(),
            conversation_id: ConversationId::generate(),
            avatar_id: avatar.into(),
            input_tokens: 100,
            output_tokens: 200,
            credits_charged: credits,
            api_cost_cents: 2,
            provider: provider.into(),
            model_name: "gpt-4o".into(),
            created_at: at,
        }
    }

    #[test]
    fn empty_input_is_all_zero() {
        let stats = summarize(&[]);
        assert_eq!(stats, CreditUsageStats::default());
        assert!(stats.average_credits_per_message.abs() < f64::EPSILON);
    }

    #[test]
    fn totals_and_breakdowns() {
        let day1 = Utc.with_ymd_and_hms(2024, 3, 1, 23, 30, 0).unwrap();
        let day2 = Utc.with_ymd_and_hms(2024, 3, 2, 0, 15, 0).unwrap();
        let costs = vec![
            cost("sage", "openai", 2, day1),
            cost("sage", "openai", 2, day2),
            cost("sage", "anthropic", 1, day2),
            cost("muse", "anthropic", 9, day2),
        ];

        let stats = summarize(&costs);
        assert_eq!(stats.total_messages, 4);
        assert_eq!(stats.total_credits_used, 14);
        assert!((stats.average_credits_per_message - 3.5).abs() < f64::EPSILON);
        assert_eq!(stats.total_api_cost_cents, 8);
        assert_eq!(stats.most_used_avatar.as_deref(), Some("sage"));

        // openai and anthropic tie at two messages each.
        let provider = stats.most_used_provider.unwrap();
        assert!(provider == "openai" || provider == "anthropic");

        let days: Vec<_> = stats.usage_by_day.iter().map(|d| d.key.as_str()).collect();
        assert_eq!(days, vec!["2024-03-01", "2024-03-02"]);
        assert_eq!(stats.usage_by_day[1].credits, 12);
        assert_eq!(stats.usage_by_day[1].messages, 3);

        let avatars: Vec<_> = stats.usage_by_avatar.iter().map(|a| a.key.as_str()).collect();
        assert_eq!(avatars, vec!["muse", "sage"]);
        assert_eq!(stats.usage_by_avatar[1].messages, 3);
    }

    #[test]
    fn window_start_clamps_huge_windows() {
        let now = Utc.with_ymd_and_hms(2024, 3, 2, 0, 0, 0).unwrap();

        assert_eq!(
            window_start(now, 1),
            Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap()
        );
        assert_eq!(window_start(now, 1_000_000_000), DateTime::<Utc>::MIN_UTC);
        assert_eq!(window_start(now, i64::MAX), DateTime::<Utc>::MIN_UTC);
    }
}
