//! Credit Ledger Service - HTTP API for credit balances and usage metering
//!
//! This is the main entry point for the credit ledger service.

use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use credit_ledger_service::{create_router, AppState, ServiceConfig};
use credit_ledger_store::{MemoryStore, Store};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,credit_ledger=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Credit Ledger Service");

    // Load configuration from environment
    let config = ServiceConfig::from_env();

    tracing::info!(
        listen_addr = %config.listen_addr,
        data_dir = ?config.data_dir,
        catalog_path = ?config.catalog_path,
        api_key_configured = %config.service_api_key.is_some(),
        initial_balance = %config.ledger.initial_balance,
        grant_cycle_days = %config.ledger.grant_cycle_days,
        "Service configuration loaded"
    );

    if config.service_api_key.is_none() {
        tracing::warn!("SERVICE_API_KEY not set - all /v1 requests will be rejected");
    }

    let store = open_store(&config)?;

    // Build app state and load the catalog
    let state = AppState::new(store, config.clone());
    let catalog = config.load_catalog()?;
    state.ledger.seed_catalog(&catalog)?;
    tracing::info!(
        tiers = %catalog.tiers.len(),
        packages = %catalog.packages.len(),
        "Catalog loaded"
    );

    // Create the router
    let app = create_router(state);
    tracing::info!("Router configured with all API endpoints");

    // Start HTTP server
    tracing::info!(listen_addr = %config.listen_addr, "Starting HTTP server");
    let listener = tokio::net::TcpListener::bind(&config.listen_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

#[cfg(feature = "rocksdb-backend")]
fn open_store(config: &ServiceConfig) -> Result<Arc<dyn Store>, Box<dyn std::error::Error>> {
    use credit_ledger_store::RocksStore;

    if let Some(data_dir) = &config.data_dir {
        tracing::info!(path = %data_dir, "Opening RocksDB store");
        return Ok(Arc::new(RocksStore::open(data_dir)?));
    }

    tracing::warn!("DATA_DIR not set - using in-memory store, data will not persist");
    Ok(Arc::new(MemoryStore::new()))
}

#[cfg(not(feature = "rocksdb-backend"))]
fn open_store(config: &ServiceConfig) -> Result<Arc<dyn Store>, Box<dyn std::error::Error>> {
    if config.data_dir.is_some() {
        tracing::warn!("DATA_DIR ignored - built without the rocksdb-backend feature");
    }

    tracing::warn!("Using in-memory store, data will not persist");
    Ok(Arc::new(MemoryStore::new()))
}
