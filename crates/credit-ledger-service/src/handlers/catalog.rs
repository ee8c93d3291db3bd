//! Tier and package catalog handlers.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use credit_ledger_core::{CreditPackage, SubscriptionTier};

use crate::auth::ServiceAuth;
use crate::error::ApiError;
use crate::state::AppState;

/// Tiers response.
#[derive(Debug, Serialize)]
pub struct TiersResponse {
    /// Active tiers in catalog order.
    pub tiers: Vec<SubscriptionTier>,
}

/// List active subscription tiers.
pub async fn list_tiers(
    State(state): State<Arc<AppState>>,
    _auth: ServiceAuth,
) -> Result<Json<TiersResponse>, ApiError> {
    let tiers = state.run(|ledger| ledger.list_tiers()).await?;
    Ok(Json(TiersResponse { tiers }))
}

/// Package as returned by the API, with the derived total.
#[derive(Debug, Serialize)]
pub struct PackageResponse {
    /// The package.
    #[serde(flatten)]
    pub package: CreditPackage,
    /// Base plus bonus credits.
    pub total_credits: i64,
}

/// Packages response.
#[derive(Debug, Serialize)]
pub struct PackagesResponse {
    /// Active packages in catalog order.
    pub packages: Vec<PackageResponse>,
}

/// List active credit packages.
pub async fn list_packages(
    State(state): State<Arc<AppState>>,
    _auth: ServiceAuth,
) -> Result<Json<PackagesResponse>, ApiError> {
    let packages = state.run(|ledger| ledger.list_packages()).await?;
    Ok(Json(PackagesResponse {
        packages: packages
            .into_iter()
            .map(|package| PackageResponse {
                total_credits: package.total_credits(),
                package,
            })
            .collect(),
    }))
}
