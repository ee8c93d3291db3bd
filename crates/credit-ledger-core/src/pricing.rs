//! Token pricing.
//!
//! Converts token counts reported by the AI-chat pipeline into credits charged
//! to the user and the upstream API cost used for margin analytics.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Pricing for all billable models.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PricingConfig {
    /// Pricing by provider and model.
    pub models: HashMap<ModelKey, ModelPricing>,

    /// Pricing for unknown models.
    pub default_pricing: ModelPricing,
}

impl Default for PricingConfig {
    fn default() -> Self {
        let mut models = HashMap::new();

        models.insert(
            ModelKey::new("anthropic", "claude-3-5-sonnet"),
            ModelPricing {
                input_credits_per_million: 1000,
                output_credits_per_million: 5000,
                input_cost_cents_per_million: 300,   // $3.00 per 1M
                output_cost_cents_per_million: 1500, // $15.00 per 1M
            },
        );
        models.insert(
            ModelKey::new("anthropic", "claude-3-haiku"),
            ModelPricing {
                input_credits_per_million: 100,
                output_credits_per_million: 500,
                input_cost_cents_per_million: 25,
                output_cost_cents_per_million: 125,
            },
        );
        models.insert(
            ModelKey::new("openai", "gpt-4o"),
            ModelPricing {
                input_credits_per_million: 800,
                output_credits_per_million: 3000,
                input_cost_cents_per_million: 250,
                output_cost_cents_per_million: 1000,
            },
        );
        models.insert(
            ModelKey::new("openai", "gpt-4o-mini"),
            ModelPricing {
                input_credits_per_million: 50,
                output_credits_per_million: 200,
                input_cost_cents_per_million: 15,
                output_cost_cents_per_million: 60,
            },
        );

        Self {
            models,
            default_pricing: ModelPricing {
                input_credits_per_million: 500,
                output_credits_per_million: 1500,
                input_cost_cents_per_million: 100,
                output_cost_cents_per_million: 300,
            },
        }
    }
}

impl PricingConfig {
    /// Look up pricing for a model, falling back to the default.
    #[must_use]
    pub fn pricing_for(&self, provider: &str, model: &str) -> &ModelPricing {
        self.models
            .get(&ModelKey::new(provider, model))
            .unwrap_or(&self.default_pricing)
    }

    /// Credits charged for a message.
    ///
    /// Minimum cost is 1 credit for any non-zero usage.
    #[must_use]
    pub fn calculate_credits(
        &self,
        provider: &str,
        model: &str,
        input_tokens: u64,
        output_tokens: u64,
    ) -> i64 {
        let pricing = self.pricing_for(provider, model);
        let total = per_million(input_tokens, pricing.input_credits_per_million)
            + per_million(output_tokens, pricing.output_credits_per_million);

        if total == 0 && (input_tokens > 0 || output_tokens > 0) {
            1
        } else {
            total
        }
    }

    /// Upstream API cost of a message in cents.
    #[must_use]
    pub fn calculate_api_cost_cents(
        &self,
        provider: &str,
        model: &str,
        input_tokens: u64,
        output_tokens: u64,
    ) -> i64 {
        let pricing = self.pricing_for(provider, model);
        per_million(input_tokens, pricing.input_cost_cents_per_million)
            + per_million(output_tokens, pricing.output_cost_cents_per_million)
    }
}

fn per_million(tokens: u64, rate: i64) -> i64 {
    i64::try_from(tokens)
        .unwrap_or(i64::MAX)
        .saturating_mul(rate)
        / 1_000_000
}

/// Key for looking up model pricing.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ModelKey {
    /// Provider name (e.g., "anthropic", "openai").
    pub provider: String,
    /// Model name (e.g., "claude-3-haiku").
    pub model: String,
}

impl ModelKey {
    /// Create a new model key.
    #[must_use]
    pub fn new(provider: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            model: model.into(),
        }
    }
}

// Serialized as "provider/model" so the pricing table can be a JSON object.
impl TryFrom<String> for ModelKey {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value
            .split_once('/')
            .map(|(provider, model)| Self::new(provider, model))
            .ok_or_else(|| format!("model key must be provider/model: {value}"))
    }
}

impl From<ModelKey> for String {
    fn from(key: ModelKey) -> Self {
        format!("{}/{}", key.provider, key.model)
    }
}

/// Pricing for one model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelPricing {
    /// Credits per 1 million input tokens.
    pub input_credits_per_million: i64,
    /// Credits per 1 million output tokens.
    pub output_credits_per_million: i64,
    /// Upstream cost in cents per 1 million input tokens.
    pub input_cost_cents_per_million: i64,
    /// Upstream cost in cents per 1 million output tokens.
    pub output_cost_cents_per_million: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credits_for_known_model() {
        let config = PricingConfig::default();

        // 100k input at 1000/1M = 100, 20k output at 5000/1M = 100
        let credits = config.calculate_credits("anthropic", "claude-3-5-sonnet", 100_000, 20_000);
        assert_eq!(credits, 200);
    }

    #[test]
    fn small_usage_costs_one_credit() {
        let config = PricingConfig::default();
        assert_eq!(config.calculate_credits("openai", "gpt-4o-mini", 100, 50), 1);
    }

    #[test]
    fn zero_usage_is_free() {
        let config = PricingConfig::default();
        assert_eq!(config.calculate_credits("openai", "gpt-4o", 0, 0), 0);
    }

    #[test]
    fn unknown_model_uses_default() {
        let config = PricingConfig::default();
        assert_eq!(config.calculate_credits("acme", "mystery", 1_000_000, 0), 500);
        assert_eq!(
            config.calculate_api_cost_cents("acme", "mystery", 1_000_000, 0),
            100
        );
    }

    #[test]
    fn pricing_table_roundtrips_through_json() {
        let config = PricingConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        assert!(json.contains("anthropic/claude-3-haiku"));

        let parsed: PricingConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.models.len(), config.models.len());
    }
}
