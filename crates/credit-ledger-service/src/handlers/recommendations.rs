//! Upgrade recommendation handlers.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;
use serde::Serialize;

use credit_ledger_core::UpgradeRecommendation;

use super::parse_user_id;
use crate::auth::ServiceAuth;
use crate::error::ApiError;
use crate::state::AppState;

/// Recommendation response.
///
/// `show_prompt` may be true while `recommendation` is null; clients then
/// fall back to generic upgrade messaging.
#[derive(Debug, Serialize)]
pub struct RecommendationResponse {
    /// Suggested tier switch, if one qualifies.
    pub recommendation: Option<UpgradeRecommendation>,
    /// Whether to show an upgrade prompt.
    pub show_prompt: bool,
}

/// Get the upgrade recommendation and prompt flag for a user.
pub async fn get_recommendation(
    State(state): State<Arc<AppState>>,
    _auth: ServiceAuth,
    Path(user_id): Path<String>,
) -> Result<Json<RecommendationResponse>, ApiError> {
    let user_id = parse_user_id(&user_id)?;
    let (recommendation, show_prompt) = state
        .run(move |ledger| {
            let now = ledger.now();
            Ok((
                ledger.get_upgrade_recommendation(&user_id, now)?,
                ledger.should_show_upgrade_prompt(&user_id, now)?,
            ))
        })
        .await?;

    Ok(Json(RecommendationResponse {
        recommendation,
        show_prompt,
    }))
}
