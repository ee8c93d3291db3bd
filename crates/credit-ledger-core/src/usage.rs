//! Per-message usage records.
//!
//! The AI-chat pipeline reports token counts for every billable reply. Those
//! reports become `MessageCost` rows, which feed usage analytics. The
//! transaction log, not these rows, is authoritative for balances.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{ConversationId, UserId};

/// Cost attribution for one billable AI interaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageCost {
    /// The message that was billed. Doubles as the spend correlation id.
    pub message_id: String,

    /// The user who was charged.
    pub user_id: UserId,

    /// Conversation the message belongs to.
    pub conversation_id: ConversationId,

    /// Avatar (persona) that produced the reply.
    pub avatar_id: String,

    /// Prompt tokens.
    pub input_tokens: u64,

    /// Completion tokens.
    pub output_tokens: u64,

    /// Credits debited for the message.
    pub credits_charged: i64,

    /// Upstream API cost in cents.
    pub api_cost_cents: i64,

    /// AI provider (e.g. "anthropic").
    pub provider: String,

    /// Model name.
    pub model_name: String,

    /// When the message was billed.
    pub created_at: DateTime<Utc>,
}

/// A usage report from the AI-chat pipeline, before pricing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageUsage {
    /// The message being billed.
    pub message_id: String,

    /// The user being charged.
    pub user_id: UserId,

    /// Conversation the message belongs to.
    pub conversation_id: ConversationId,

    /// Avatar that produced the reply.
    pub avatar_id: String,

    /// AI provider.
    pub provider: String,

    /// Model name.
    pub model_name: String,

    /// Prompt tokens.
    pub input_tokens: u64,

    /// Completion tokens.
    pub output_tokens: u64,

    /// Pre-calculated credit cost; computed from pricing when absent.
    #[serde(default)]
    pub credits_override: Option<i64>,
}

impl MessageUsage {
    /// Build the analytics row for this usage once it has been charged.
    #[must_use]
    pub fn into_cost(
        self,
        credits_charged: i64,
        api_cost_cents: i64,
        now: DateTime<Utc>,
    ) -> MessageCost {
        MessageCost {
            message_id: self.message_id,
            user_id: self.user_id,
            conversation_id: self.conversation_id,
            avatar_id: self.avatar_id,
            input_tokens: self.input_tokens,
            output_tokens: self.output_tokens,
            credits_charged,
            api_cost_cents,
            provider: self.provider,
            model_name: self.model_name,
            created_at: now,
        }
    }
}
