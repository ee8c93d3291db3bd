//! Core types for the credit ledger.
//!
//! This crate provides the foundational types shared by the store, the engine,
//! the HTTP service and the client SDK:
//!
//! - **Identifiers**: `UserId`, `ConversationId`, `TransactionId`
//! - **Balances**: `CreditBalance`
//! - **Ledger entries**: `CreditTransaction`, `TransactionType`, `SourceType`
//! - **Catalog**: `SubscriptionTier`, `CreditPackage`
//! - **Usage**: `MessageCost`, `MessageUsage`, `PricingConfig`
//! - **Insights**: `CreditUsageStats`, `UpgradeRecommendation`
//!
//! # Credits
//!
//! A credit is the single spendable unit. Amounts are `i64` and never
//! fractional; one AI reply costs one or more credits depending on the model
//! and token counts.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod balance;
pub mod catalog;
pub mod credits;
pub mod error;
pub mod ids;
pub mod insights;
pub mod pricing;
pub mod usage;

pub use balance::{CreditBalance, DEFAULT_INITIAL_BALANCE, DEFAULT_TIER_ID};
pub use catalog::{Catalog, CreditPackage, SubscriptionTier};
pub use credits::{CreditTransaction, SourceType, TransactionSource, TransactionType};
pub use error::{LedgerError, Result};
pub use ids::{ConversationId, IdError, TransactionId, UserId};
pub use insights::{CreditUsageStats, UpgradeRecommendation, UsageBreakdown, UsagePattern};
pub use pricing::{ModelKey, ModelPricing, PricingConfig};
pub use usage::{MessageCost, MessageUsage};
