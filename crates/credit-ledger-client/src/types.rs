//! Request and response types for the credit ledger client.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use credit_ledger_core::{
    CreditPackage, CreditTransaction, SourceType, SubscriptionTier, TransactionType,
    UpgradeRecommendation,
};

/// A user's balance.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
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

#[derive(Debug, Serialize)]
pub(crate) struct CheckBalanceRequest {
    pub required: i64,
}

/// Balance check result.
#[derive(Debug, Clone, Deserialize)]
pub struct CheckBalanceResponse {
    /// Whether the balance covers the required credits.
    pub sufficient: bool,
    /// Credits currently available.
    pub balance: i64,
    /// Required amount.
    pub required: i64,
}

/// A debit request.
#[derive(Debug, Clone, Serialize)]
pub struct SpendRequest {
    /// Credits to debit.
    pub amount: i64,
    /// Source category.
    pub source_type: SourceType,
    /// Correlation id. Retries with the same id are rejected as duplicates.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_id: Option<String>,
    /// Description override.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Additional metadata.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

impl SpendRequest {
    /// A usage debit correlated by `source_id`.
    #[must_use]
    pub fn usage(amount: i64, source_id: impl Into<String>) -> Self {
        Self {
            amount,
            source_type: SourceType::Usage,
            source_id: Some(source_id.into()),
            description: None,
            metadata: None,
        }
    }
}

/// Spend result.
#[derive(Debug, Clone, Deserialize)]
pub struct SpendResponse {
    /// Whether the debit was written.
    pub success: bool,
    /// Balance after the attempt.
    pub balance: i64,
    /// The written transaction.
    #[serde(default)]
    pub transaction: Option<CreditTransaction>,
}

/// A credit request.
#[derive(Debug, Clone, Serialize)]
pub struct GrantRequest {
    /// Credits to add.
    pub amount: i64,
    /// One of earned, purchased, granted, refunded.
    pub transaction_type: TransactionType,
    /// Source category.
    pub source_type: SourceType,
    /// Correlation id, e.g. a verified purchase id.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_id: Option<String>,
    /// Description override.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Additional metadata.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

/// Grant result.
#[derive(Debug, Clone, Deserialize)]
pub struct GrantResponse {
    /// Always true on a 2xx response.
    pub success: bool,
    /// Balance after the grant.
    pub balance: i64,
    /// The written transaction.
    pub transaction: CreditTransaction,
}

/// A message to price and charge.
#[derive(Debug, Clone, Serialize)]
pub struct ChargeMessageRequest {
    /// The message being billed.
    pub message_id: String,
    /// Conversation the message belongs to.
    pub conversation_id: String,
    /// Avatar that produced the reply.
    pub avatar_id: String,
    /// AI provider (e.g., "anthropic").
    pub provider: String,
    /// Model name (e.g., "claude-3-5-sonnet").
    pub model_name: String,
    /// Prompt tokens.
    pub input_tokens: u64,
    /// Completion tokens.
    pub output_tokens: u64,
    /// Pre-calculated credit cost.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credits: Option<i64>,
}

/// Message charge result.
#[derive(Debug, Clone, Deserialize)]
pub struct ChargeMessageResponse {
    /// Whether the debit was written.
    pub success: bool,
    /// Credits the message cost.
    pub credits_charged: i64,
    /// Balance after the attempt.
    pub balance: i64,
    /// Transaction ID, when the debit was written.
    #[serde(default)]
    pub transaction_id: Option<String>,
}

/// A page of transactions, newest first.
#[derive(Debug, Clone, Deserialize)]
pub struct TransactionsResponse {
    /// Transactions.
    pub transactions: Vec<CreditTransaction>,
    /// Whether there are more transactions.
    pub has_more: bool,
}

#[derive(Debug, Serialize)]
pub(crate) struct UpdateSubscriptionRequest<'a> {
    pub tier_id: Option<&'a str>,
}

/// Upgrade recommendation and prompt flag.
#[derive(Debug, Clone, Deserialize)]
pub struct RecommendationResponse {
    /// Suggested tier switch, if one qualifies.
    pub recommendation: Option<UpgradeRecommendation>,
    /// Whether to show an upgrade prompt.
    pub show_prompt: bool,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TiersResponse {
    pub tiers: Vec<SubscriptionTier>,
}

/// A package with its derived total.
#[derive(Debug, Clone, Deserialize)]
pub struct PackageResponse {
    /// The package.
    #[serde(flatten)]
    pub package: CreditPackage,
    /// Base plus bonus credits.
    pub total_credits: i64,
}

#[derive(Debug, Deserialize)]
pub(crate) struct PackagesResponse {
    pub packages: Vec<PackageResponse>,
}

/// API error response.
#[derive(Debug, Deserialize)]
pub(crate) struct ApiErrorResponse {
    pub error: ApiErrorBody,
}

/// API error body.
#[derive(Debug, Deserialize)]
pub(crate) struct ApiErrorBody {
    pub code: String,
    pub message: String,
    pub details: Option<serde_json::Value>,
}
