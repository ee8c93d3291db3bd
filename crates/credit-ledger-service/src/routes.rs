//! Router configuration.
//!
//! This module sets up the Axum router with all routes and middleware.

use std::sync::Arc;
use std::time::Duration;

use axum::routing::{get, post, put};
use axum::Router;
use tower::limit::ConcurrencyLimitLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::handlers::{
    balance, catalog, health, recommendations, subscriptions, transactions, usage,
};
use crate::state::AppState;

// ============================================================================
// Concurrency Limiting Constants
// ============================================================================

/// Maximum concurrent requests for the spend and charge endpoints.
/// These carry per-message traffic from the chat pipeline.
const METERING_MAX_CONCURRENT_REQUESTS: usize = 100;

/// Maximum concurrent requests for general API endpoints.
const API_MAX_CONCURRENT_REQUESTS: usize = 50;

/// Create the service router with all routes and middleware.
///
/// # Routes
///
/// ## Public
/// - `GET /health` - Health check
///
/// ## Metering (Service API Key auth, rate-limited)
/// - `POST /v1/users/{user_id}/balance/check` - Sufficiency check
/// - `POST /v1/users/{user_id}/spend` - Debit credits
/// - `POST /v1/users/{user_id}/messages` - Charge a message by token counts
///
/// ## Ledger (Service API Key auth)
/// - `GET /v1/users/{user_id}/balance` - Get balance
/// - `POST /v1/users/{user_id}/grant` - Credit a balance
/// - `GET /v1/users/{user_id}/transactions` - List transaction history
/// - `PUT /v1/users/{user_id}/subscription` - Change subscription tier
/// - `POST /v1/users/{user_id}/monthly-grant` - Apply the monthly grant
/// - `GET /v1/users/{user_id}/usage` - Usage statistics
/// - `GET /v1/users/{user_id}/recommendation` - Upgrade recommendation
/// - `GET /v1/tiers` - Active subscription tiers
/// - `GET /v1/packages` - Active credit packages
pub fn create_router(state: AppState) -> Router {
    // Extract config values before moving state
    let cors_origins = state.config.cors_origins.clone();
    let max_body_bytes = state.config.max_body_bytes;
    let request_timeout_seconds = state.config.request_timeout_seconds;

    // Build CORS layer
    let cors = build_cors_layer(&cors_origins);

    let state = Arc::new(state);

    let metering_routes = Router::new()
        .route("/:user_id/balance/check", post(balance::check_balance))
        .route("/:user_id/spend", post(balance::spend))
        .route("/:user_id/messages", post(usage::charge_message))
        .layer(ConcurrencyLimitLayer::new(METERING_MAX_CONCURRENT_REQUESTS));

    let user_routes = Router::new()
        .route("/:user_id/balance", get(balance::get_balance))
        .route("/:user_id/grant", post(balance::grant))
        .route("/:user_id/transactions", get(transactions::list_transactions))
        .route("/:user_id/subscription", put(subscriptions::update_subscription))
        .route("/:user_id/monthly-grant", post(subscriptions::apply_monthly_grant))
        .route("/:user_id/usage", get(usage::get_usage_stats))
        .route("/:user_id/recommendation", get(recommendations::get_recommendation))
        .layer(ConcurrencyLimitLayer::new(API_MAX_CONCURRENT_REQUESTS))
        .merge(metering_routes);

    let api_routes = Router::new()
        .nest("/users", user_routes)
        .route("/tiers", get(catalog::list_tiers))
        .route("/packages", get(catalog::list_packages));

    Router::new()
        // Health (public, no rate limit)
        .route("/health", get(health::health))
        .nest("/v1", api_routes)
        // Global middleware
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(RequestBodyLimitLayer::new(max_body_bytes))
        .layer(TimeoutLayer::new(Duration::from_secs(
            request_timeout_seconds,
        )))
        .with_state(state)
}

/// Build the CORS layer from configured origins.
fn build_cors_layer(origins: &[String]) -> CorsLayer {
    if origins.iter().any(|o| o == "*") {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let origins: Vec<_> = origins.iter().filter_map(|o| o.parse().ok()).collect();

        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any)
    }
}
