//! Application state.

use std::sync::Arc;

use credit_ledger_engine::CreditLedger;
use credit_ledger_store::Store;

use crate::config::ServiceConfig;
use crate::error::ApiError;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    /// The credit ledger engine.
    pub ledger: Arc<CreditLedger>,

    /// Service configuration.
    pub config: ServiceConfig,
}

impl AppState {
    /// Create a new application state on top of `store`.
    #[must_use]
    pub fn new(store: Arc<dyn Store>, config: ServiceConfig) -> Self {
        let ledger = Arc::new(CreditLedger::new(store, config.ledger.clone()));
        Self { ledger, config }
    }

    /// Run a ledger operation on the blocking pool.
    ///
    /// The engine and its store are synchronous; running them here keeps
    /// lock waits and disk writes off the async workers.
    pub async fn run<T, F>(&self, op: F) -> Result<T, ApiError>
    where
        T: Send + 'static,
        F: FnOnce(&CreditLedger) -> credit_ledger_core::Result<T> + Send + 'static,
    {
        let ledger = Arc::clone(&self.ledger);
        tokio::task::spawn_blocking(move || op(&ledger))
            .await
            .map_err(|e| ApiError::Internal(format!("ledger task failed: {e}")))?
            .map_err(ApiError::from)
    }
}
