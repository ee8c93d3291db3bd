//! Service configuration.

use std::path::Path;

use serde::Deserialize;

use credit_ledger_core::Catalog;
use credit_ledger_engine::LedgerConfig;

/// Errors loading configuration files.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("failed to read {path}: {source}")]
    Io {
        /// The file path.
        path: String,
        /// The underlying error.
        source: std::io::Error,
    },

    /// The file is not valid JSON for the expected shape.
    #[error("failed to parse {path}: {source}")]
    Parse {
        /// The file path.
        path: String,
        /// The underlying error.
        source: serde_json::Error,
    },
}

/// Service configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Address to listen on (default: "0.0.0.0:8080").
    pub listen_addr: String,

    /// Path to `RocksDB` data directory. In-memory storage when unset.
    pub data_dir: Option<String>,

    /// Service API key for service-to-service auth.
    pub service_api_key: Option<String>,

    /// JSON file with `{tiers, packages}`. Built-in catalog when unset.
    pub catalog_path: Option<String>,

    /// CORS allowed origins.
    pub cors_origins: Vec<String>,

    /// Maximum request body size in bytes.
    pub max_body_bytes: usize,

    /// Request timeout in seconds.
    pub request_timeout_seconds: u64,

    /// Engine configuration.
    pub ledger: LedgerConfig,
}

/// Service secrets file structure.
#[derive(Debug, Deserialize)]
struct ServiceSecrets {
    api_key: String,
}

impl ServiceConfig {
    /// Load configuration from environment variables and secrets files.
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = LedgerConfig::default();
        let ledger = LedgerConfig {
            initial_balance: env_parse("INITIAL_BALANCE").unwrap_or(defaults.initial_balance),
            grant_cycle_days: env_parse("GRANT_CYCLE_DAYS").unwrap_or(defaults.grant_cycle_days),
            ..defaults
        };

        Self {
            listen_addr: std::env::var("LISTEN_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".into()),
            data_dir: std::env::var("DATA_DIR").ok(),
            service_api_key: load_service_api_key(),
            catalog_path: std::env::var("CATALOG_PATH").ok(),
            cors_origins: std::env::var("CORS_ORIGINS")
                .unwrap_or_else(|_| "*".into())
                .split(',')
                .map(|s| s.trim().to_string())
                .collect(),
            max_body_bytes: env_parse("MAX_BODY_BYTES").unwrap_or(64 * 1024), // 64KB
            request_timeout_seconds: env_parse("REQUEST_TIMEOUT_SECONDS").unwrap_or(30),
            ledger,
        }
    }

    /// Load the catalog from `catalog_path`, or the built-in catalog.
    ///
    /// # Errors
    ///
    /// Returns an error if the configured file cannot be read or parsed.
    pub fn load_catalog(&self) -> Result<Catalog, ConfigError> {
        match &self.catalog_path {
            Some(path) => load_json_file(path),
            None => Ok(Catalog::builtin()),
        }
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|s| s.parse().ok())
}

/// Load the service API key from a secrets file or the environment.
fn load_service_api_key() -> Option<String> {
    let secret_paths = [".secrets/service.json", "../.secrets/service.json"];

    for path in &secret_paths {
        if Path::new(path).exists() {
            match load_json_file::<ServiceSecrets>(path) {
                Ok(secrets) => {
                    tracing::info!(path = %path, "Loaded service API key from file");
                    return Some(secrets.api_key);
                }
                Err(e) => tracing::warn!(error = %e, "Ignoring unreadable secrets file"),
            }
        }
    }

    tracing::debug!("Secrets file not found, using environment variables");
    std::env::var("SERVICE_API_KEY").ok()
}

/// Load a JSON file.
fn load_json_file<T: serde::de::DeserializeOwned>(path: &str) -> Result<T, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_string(),
        source,
    })?;
    serde_json::from_str(&contents).map_err(|source| ConfigError::Parse {
        path: path.to_string(),
        source,
    })
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8080".into(),
            data_dir: None,
            service_api_key: None,
            catalog_path: None,
            cors_origins: vec!["*".into()],
            max_body_bytes: 64 * 1024,
            request_timeout_seconds: 30,
            ledger: LedgerConfig::default(),
        }
    }
}
