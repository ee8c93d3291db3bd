//! Subscription tier and monthly grant handlers.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use credit_ledger_core::CreditTransaction;

use super::{parse_user_id, BalanceResponse};
use crate::auth::ServiceAuth;
use crate::error::ApiError;
use crate::state::AppState;

/// Subscription update request.
#[derive(Debug, Deserialize)]
pub struct UpdateSubscriptionRequest {
    /// New tier, or null to clear the subscription.
    pub tier_id: Option<String>,
}

/// Change a user's subscription tier. Does not grant credits.
pub async fn update_subscription(
    State(state): State<Arc<AppState>>,
    auth: ServiceAuth,
    Path(user_id): Path<String>,
    Json(body): Json<UpdateSubscriptionRequest>,
) -> Result<Json<BalanceResponse>, ApiError> {
    let user_id = parse_user_id(&user_id)?;

    tracing::debug!(
        service = %auth.service_name,
        user_id = %user_id,
        tier_id = ?body.tier_id,
        "Updating subscription"
    );

    let balance = state
        .run(move |ledger| ledger.update_subscription_tier(&user_id, body.tier_id.as_deref()))
        .await?;

    Ok(Json(balance.into()))
}

/// Monthly grant response.
#[derive(Debug, Serialize)]
pub struct MonthlyGrantResponse {
    /// Whether a grant was applied.
    pub granted: bool,
    /// Entries written, oldest first.
    pub transactions: Vec<CreditTransaction>,
}

/// Apply the monthly grant for a user if one is due.
pub async fn apply_monthly_grant(
    State(state): State<Arc<AppState>>,
    auth: ServiceAuth,
    Path(user_id): Path<String>,
) -> Result<Json<MonthlyGrantResponse>, ApiError> {
    let user_id = parse_user_id(&user_id)?;

    let entries = state
        .run(move |ledger| ledger.apply_monthly_grant(&user_id, ledger.now()))
        .await?;

    tracing::debug!(
        service = %auth.service_name,
        user_id = %user_id,
        granted = %entries.is_some(),
        "Monthly grant requested"
    );

    Ok(Json(MonthlyGrantResponse {
        granted: entries.is_some(),
        transactions: entries.unwrap_or_default(),
    }))
}
