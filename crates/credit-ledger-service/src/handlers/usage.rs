//! Message charge and usage statistics handlers.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use credit_ledger_core::{ConversationId, CreditUsageStats, MessageUsage};

use super::parse_user_id;
use crate::auth::ServiceAuth;
use crate::error::ApiError;
use crate::state::AppState;

/// Message charge request from the AI-chat pipeline.
#[derive(Debug, Deserialize)]
pub struct ChargeMessageRequest {
    /// The message being billed. Also the idempotency key.
    pub message_id: String,
    /// Conversation the message belongs to.
    pub conversation_id: String,
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
    /// Pre-calculated credit cost (optional, will be calculated if not provided).
    pub credits: Option<i64>,
}

/// Message charge response.
#[derive(Debug, Serialize)]
pub struct ChargeMessageResponse {
    /// Whether the debit was written.
    pub success: bool,
    /// Credits the message cost.
    pub credits_charged: i64,
    /// Balance after the attempt.
    pub balance: i64,
    /// Transaction ID, when the debit was written.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction_id: Option<String>,
}

/// Price and charge a message from its token counts.
pub async fn charge_message(
    State(state): State<Arc<AppState>>,
    auth: ServiceAuth,
    Path(user_id): Path<String>,
    Json(body): Json<ChargeMessageRequest>,
) -> Result<Json<ChargeMessageResponse>, ApiError> {
    let user_id = parse_user_id(&user_id)?;
    let conversation_id: ConversationId = body
        .conversation_id
        .parse()
        .map_err(|_| ApiError::Validation("invalid conversation id".into()))?;

    tracing::debug!(
        service = %auth.service_name,
        message_id = %body.message_id,
        user_id = %user_id,
        "Processing message charge"
    );

    let usage = MessageUsage {
        message_id: body.message_id,
        user_id,
        conversation_id,
        avatar_id: body.avatar_id,
        provider: body.provider,
        model_name: body.model_name,
        input_tokens: body.input_tokens,
        output_tokens: body.output_tokens,
        credits_override: body.credits,
    };
    let outcome = state.run(move |ledger| ledger.charge_message(usage)).await?;

    Ok(Json(ChargeMessageResponse {
        success: outcome.spend.is_applied(),
        credits_charged: outcome.credits_charged,
        balance: outcome.spend.balance(),
        transaction_id: outcome.spend.transaction().map(|tx| tx.id.to_string()),
    }))
}

/// Query parameters for usage statistics.
#[derive(Debug, Deserialize)]
pub struct UsageStatsQuery {
    /// Window length in days (default: 30).
    #[serde(default = "default_days")]
    pub days: i64,
}

const fn default_days() -> i64 {
    30
}

/// Usage statistics for a user.
pub async fn get_usage_stats(
    State(state): State<Arc<AppState>>,
    _auth: ServiceAuth,
    Path(user_id): Path<String>,
    Query(query): Query<UsageStatsQuery>,
) -> Result<Json<CreditUsageStats>, ApiError> {
    let user_id = parse_user_id(&user_id)?;
    let stats = state
        .run(move |ledger| ledger.get_usage_stats(&user_id, query.days, ledger.now()))
        .await?;

    Ok(Json(stats))
}
