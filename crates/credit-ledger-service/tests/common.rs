//! Common test utilities for credit ledger integration tests.

#![allow(dead_code)] // Some utilities are used by different test files

use std::sync::Arc;

use axum::Router;
use axum_test::TestServer;
use tempfile::TempDir;

use credit_ledger_core::{Catalog, UserId};
use credit_ledger_service::{create_router, AppState, ServiceConfig};
use credit_ledger_store::RocksStore;

/// Test harness containing everything needed for integration tests.
pub struct TestHarness {
    /// The test server for making HTTP requests.
    pub server: TestServer,
    /// Temporary directory for the database (kept alive for test duration).
    pub _temp_dir: TempDir,
    /// A test user ID.
    pub test_user_id: UserId,
    /// The service API key for service-to-service requests.
    pub service_api_key: String,
}

impl TestHarness {
    /// Create a new test harness with a fresh database and the built-in catalog.
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let store = RocksStore::open(temp_dir.path()).expect("Failed to open store");

        let service_api_key = "test-service-key".to_string();

        let config = ServiceConfig {
            listen_addr: "127.0.0.1:0".into(),
            data_dir: Some(temp_dir.path().to_string_lossy().to_string()),
            service_api_key: Some(service_api_key.clone()),
            ..ServiceConfig::default()
        };

        let state = AppState::new(Arc::new(store), config);
        state
            .ledger
            .seed_catalog(&Catalog::builtin())
            .expect("Failed to seed catalog");
        let router: Router = create_router(state);

        let server = TestServer::new(router).expect("Failed to create test server");
        let test_user_id = UserId::generate();

        Self {
            server,
            _temp_dir: temp_dir,
            test_user_id,
            service_api_key,
        }
    }

    /// Path under the test user's routes.
    pub fn user_path(&self, suffix: &str) -> String {
        format!("/v1/users/{}/{suffix}", self.test_user_id)
    }

    /// Current balance of the test user.
    pub async fn balance(&self) -> i64 {
        let response = self
            .server
            .get(&self.user_path("balance"))
            .add_header("x-api-key", &self.service_api_key)
            .await;
        response.assert_status_ok();
        let body: serde_json::Value = response.json();
        body["current_balance"].as_i64().expect("balance is a number")
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}
