//! Credit Ledger Client SDK.
//!
//! This crate provides a client library for the app layer to talk to the
//! credit ledger service.
//!
//! # Example
//!
//! ```no_run
//! use credit_ledger_client::{CreditsClient, SpendRequest};
//! use credit_ledger_core::UserId;
//!
//! # async fn example() -> Result<(), credit_ledger_client::ClientError> {
//! let client = CreditsClient::new("http://credit-ledger:8080", "your-service-api-key")?;
//! let user_id = UserId::generate();
//!
//! if client.has_sufficient_credits(&user_id, 5).await? {
//!     let applied = client.spend(&user_id, &SpendRequest::usage(5, "msg-123")).await?;
//!     println!("applied: {applied}, balance: {}", client.refresh_balance(&user_id).await?);
//! }
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

mod client;
mod error;
mod types;

pub use client::{ClientOptions, CreditsClient};
pub use error::ClientError;
pub use types::*;
