//! Balance, spend and grant handlers.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use credit_ledger_core::{CreditTransaction, SourceType, TransactionSource, TransactionType};
use credit_ledger_engine::SpendOutcome;

use super::{parse_user_id, BalanceResponse};
use crate::auth::ServiceAuth;
use crate::error::ApiError;
use crate::state::AppState;

/// Get a user's balance, creating it on first access.
pub async fn get_balance(
    State(state): State<Arc<AppState>>,
    _auth: ServiceAuth,
    Path(user_id): Path<String>,
) -> Result<Json<BalanceResponse>, ApiError> {
    let user_id = parse_user_id(&user_id)?;
    let balance = state.run(move |ledger| ledger.get_balance(&user_id)).await?;
    Ok(Json(balance.into()))
}

/// Check balance request.
#[derive(Debug, Deserialize)]
pub struct CheckBalanceRequest {
    /// Credits the caller wants to spend.
    pub required: i64,
}

/// Check balance response.
#[derive(Debug, Serialize)]
pub struct CheckBalanceResponse {
    /// Whether the balance covers the required credits.
    pub sufficient: bool,
    /// Credits currently available.
    pub balance: i64,
    /// Required amount.
    pub required: i64,
}

/// Check whether a user can afford a spend. Never writes.
pub async fn check_balance(
    State(state): State<Arc<AppState>>,
    _auth: ServiceAuth,
    Path(user_id): Path<String>,
    Json(body): Json<CheckBalanceRequest>,
) -> Result<Json<CheckBalanceResponse>, ApiError> {
    let user_id = parse_user_id(&user_id)?;
    let required = body.required;
    let (sufficient, balance) = state
        .run(move |ledger| {
            let sufficient = ledger.has_sufficient_credits(&user_id, required)?;
            Ok((sufficient, ledger.available_credits(&user_id)?))
        })
        .await?;

    Ok(Json(CheckBalanceResponse {
        sufficient,
        balance,
        required,
    }))
}

/// Spend request.
#[derive(Debug, Deserialize)]
pub struct SpendRequest {
    /// Credits to debit.
    pub amount: i64,
    /// Source category (e.g. "usage").
    pub source_type: String,
    /// Correlation id for idempotency.
    pub source_id: Option<String>,
    /// Description override.
    pub description: Option<String>,
    /// Additional metadata.
    #[serde(default)]
    pub metadata: serde_json::Value,
}

/// Spend response.
///
/// A declined spend is a normal outcome: `success` is false and no
/// transaction is returned.
#[derive(Debug, Serialize)]
pub struct SpendResponse {
    /// Whether the debit was written.
    pub success: bool,
    /// Balance after the attempt.
    pub balance: i64,
    /// The written transaction.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction: Option<CreditTransaction>,
}

impl From<SpendOutcome> for SpendResponse {
    fn from(outcome: SpendOutcome) -> Self {
        let balance = outcome.balance();
        match outcome {
            SpendOutcome::Applied(tx) => Self {
                success: true,
                balance,
                transaction: Some(tx),
            },
            SpendOutcome::Declined { .. } => Self {
                success: false,
                balance,
                transaction: None,
            },
        }
    }
}

/// Debit credits if the balance covers them.
pub async fn spend(
    State(state): State<Arc<AppState>>,
    auth: ServiceAuth,
    Path(user_id): Path<String>,
    Json(body): Json<SpendRequest>,
) -> Result<Json<SpendResponse>, ApiError> {
    let user_id = parse_user_id(&user_id)?;
    let source_type: SourceType = body.source_type.parse()?;
    let source = TransactionSource::new(source_type)
        .with_source_id(body.source_id)
        .with_description(body.description)
        .with_metadata(body.metadata);

    tracing::debug!(
        service = %auth.service_name,
        user_id = %user_id,
        amount = %body.amount,
        "Processing spend"
    );

    let amount = body.amount;
    let outcome = state
        .run(move |ledger| ledger.spend(&user_id, amount, source))
        .await?;

    Ok(Json(outcome.into()))
}

/// Grant request.
#[derive(Debug, Deserialize)]
pub struct GrantRequest {
    /// Credits to add.
    pub amount: i64,
    /// One of "earned", "purchased", "granted", "refunded".
    pub transaction_type: String,
    /// Source category (e.g. "purchase").
    pub source_type: String,
    /// Correlation id for idempotency (e.g. a verified purchase id).
    pub source_id: Option<String>,
    /// Description override.
    pub description: Option<String>,
    /// Additional metadata.
    #[serde(default)]
    pub metadata: serde_json::Value,
}

/// Grant response.
#[derive(Debug, Serialize)]
pub struct GrantResponse {
    /// Always true; failures are reported as errors.
    pub success: bool,
    /// Balance after the grant.
    pub balance: i64,
    /// The written transaction.
    pub transaction: CreditTransaction,
}

/// Credit a user's balance.
pub async fn grant(
    State(state): State<Arc<AppState>>,
    auth: ServiceAuth,
    Path(user_id): Path<String>,
    Json(body): Json<GrantRequest>,
) -> Result<Json<GrantResponse>, ApiError> {
    let user_id = parse_user_id(&user_id)?;
    let transaction_type: TransactionType = body.transaction_type.parse()?;
    let source_type: SourceType = body.source_type.parse()?;
    let source = TransactionSource::new(source_type)
        .with_source_id(body.source_id)
        .with_description(body.description)
        .with_metadata(body.metadata);

    let amount = body.amount;
    let tx = state
        .run(move |ledger| ledger.grant(&user_id, amount, transaction_type, source))
        .await?;

    tracing::info!(
        service = %auth.service_name,
        user_id = %user_id,
        amount = %amount,
        transaction_id = %tx.id,
        "Grant applied via API"
    );

    Ok(Json(GrantResponse {
        success: true,
        balance: tx.balance_after,
        transaction: tx,
    }))
}
