//! Credit Ledger HTTP API Service.
//!
//! This crate exposes the credit ledger engine over HTTP:
//!
//! - Balances, sufficiency checks, spends and grants
//! - Message charges reported by the AI-chat pipeline
//! - Transaction history and subscription changes
//! - Usage statistics, upgrade recommendations and the catalog
//!
//! # Authentication
//!
//! Every `/v1` route requires the service API key in the `x-api-key` header.
//! End-user authentication happens upstream; callers pass user ids through.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
// Allow some pedantic lints that are noisy for Axum handler functions
#![allow(clippy::missing_errors_doc)] // Axum handlers all return Result

pub mod auth;
pub mod config;
pub mod crypto;
pub mod error;
pub mod handlers;
pub mod routes;
pub mod state;

pub use config::{ConfigError, ServiceConfig};
pub use error::ApiError;
pub use routes::create_router;
pub use state::AppState;
