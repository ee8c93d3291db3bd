//! Subscription tiers and one-time credit packages.
//!
//! Catalog rows are reference data administered outside the ledger. The
//! defaults here seed a fresh deployment.

use serde::{Deserialize, Serialize};

/// A recurring subscription plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionTier {
    /// Tier id (e.g. "free", "pro").
    pub id: String,

    /// Display name.
    pub name: String,

    /// Credits granted every cycle.
    pub monthly_credits: i64,

    /// Maximum unused balance carried into the next cycle.
    pub max_rollover: i64,

    /// Monthly price in cents.
    pub price_cents: i64,

    /// Marketing feature bullets.
    #[serde(default)]
    pub features: Vec<String>,

    /// Whether the tier is offered.
    pub is_active: bool,

    /// Catalog position. Recommendation walks tiers in this order.
    pub sort_order: i32,
}

impl SubscriptionTier {
    /// Whether the tier costs money.
    #[must_use]
    pub const fn is_paid(&self) -> bool {
        self.price_cents > 0
    }

    /// Monthly price in dollars.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn price_dollars(&self) -> f64 {
        self.price_cents as f64 / 100.0
    }

    /// Balance after a cycle boundary: unused credits above the rollover cap
    /// are forfeited, then the monthly grant is added.
    #[must_use]
    pub fn rolled_over_balance(&self, current_balance: i64) -> i64 {
        current_balance.min(self.max_rollover).max(0) + self.monthly_credits
    }
}

/// A one-time purchasable bundle of credits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreditPackage {
    /// Package id.
    pub id: String,

    /// Display name.
    pub name: String,

    /// Base credits.
    pub credits: i64,

    /// Bonus credits on top of the base amount.
    #[serde(default)]
    pub bonus_credits: i64,

    /// Price in cents.
    pub price_cents: i64,

    /// Whether the package is offered.
    pub is_active: bool,

    /// Catalog position.
    pub sort_order: i32,
}

impl CreditPackage {
    /// Credits delivered by a purchase.
    #[must_use]
    pub const fn total_credits(&self) -> i64 {
        self.credits + self.bonus_credits
    }
}

/// The full catalog, as loaded from a seed file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Catalog {
    /// Subscription tiers.
    #[serde(default)]
    pub tiers: Vec<SubscriptionTier>,
    /// Credit packages.
    #[serde(default)]
    pub packages: Vec<CreditPackage>,
}

impl Catalog {
    /// Built-in catalog for deployments without a seed file.
    #[must_use]
    pub fn builtin() -> Self {
        Self {
            tiers: vec![
                tier("free", "Free", 10, 0, 0, 0, &["Basic avatars"]),
                tier("starter", "Starter", 100, 50, 499, 1, &["All avatars"]),
                tier(
                    "pro",
                    "Pro",
                    300,
                    150,
                    999,
                    2,
                    &["All avatars", "Priority responses"],
                ),
                tier(
                    "unlimited",
                    "Unlimited",
                    1000,
                    500,
                    2499,
                    3,
                    &["All avatars", "Priority responses", "Early access"],
                ),
            ],
            packages: vec![
                package("small", "Small Pack", 50, 0, 199, 0),
                package("medium", "Medium Pack", 120, 30, 499, 1),
                package("large", "Large Pack", 300, 100, 999, 2),
            ],
        }
    }
}

fn tier(
    id: &str,
    name: &str,
    monthly_credits: i64,
    max_rollover: i64,
    price_cents: i64,
    sort_order: i32,
    features: &[&str],
) -> SubscriptionTier {
    SubscriptionTier {
        id: id.into(),
        name: name.into(),
        monthly_credits,
        max_rollover,
        price_cents,
        features: features.iter().map(|f| (*f).to_string()).collect(),
        is_active: true,
        sort_order,
    }
}

fn package(
    id: &str,
    name: &str,
    credits: i64,
    bonus_credits: i64,
    price_cents: i64,
    sort_order: i32,
) -> CreditPackage {
    CreditPackage {
        id: id.into(),
        name: name.into(),
        credits,
        bonus_credits,
        price_cents,
        is_active: true,
        sort_order,
    }
}
