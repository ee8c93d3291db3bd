//! Credit ledger engine.
//!
//! [`CreditLedger`] owns every balance mutation and the read-side views built
//! on the ledger:
//!
//! - **Balances**: lazy creation with a welcome grant, sufficiency checks
//! - **Mutations**: spends, grants, message charges, monthly subscription grants
//! - **Catalog**: active tiers and packages, seeding
//! - **Analytics**: usage statistics over recorded message costs
//! - **Recommendations**: upgrade suggestions and the upgrade prompt heuristic
//!
//! The engine is synchronous and holds an injected [`Store`](credit_ledger_store::Store).
//! Async callers run it on a blocking thread.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//!
//! use credit_ledger_core::{SourceType, TransactionSource, UserId};
//! use credit_ledger_engine::{CreditLedger, LedgerConfig};
//! use credit_ledger_store::MemoryStore;
//!
//! let ledger = CreditLedger::new(Arc::new(MemoryStore::new()), LedgerConfig::default());
//! let user_id = UserId::generate();
//!
//! let outcome = ledger
//!     .spend(&user_id, 3, TransactionSource::new(SourceType::Usage))
//!     .unwrap();
//! assert!(outcome.is_applied());
//! assert_eq!(ledger.get_balance(&user_id).unwrap().current_balance, 7);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

mod analytics;
mod catalog;
pub mod clock;
pub mod config;
pub mod ledger;
mod recommendation;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::LedgerConfig;
pub use ledger::{ChargeOutcome, CreditLedger, MonthlyGrantReport, SpendOutcome, TransactionPage};
