//! Credit ledger HTTP client implementation.

use reqwest::{Client, Method, RequestBuilder};
use serde::de::DeserializeOwned;
use std::time::Duration;

use credit_ledger_core::{CreditUsageStats, SubscriptionTier, UserId};

use crate::error::ClientError;
use crate::types::{
    ApiErrorResponse, BalanceResponse, ChargeMessageRequest, ChargeMessageResponse,
    CheckBalanceRequest, CheckBalanceResponse, GrantRequest, GrantResponse, PackageResponse,
    PackagesResponse, RecommendationResponse, SpendRequest, SpendResponse, TiersResponse,
    TransactionsResponse, UpdateSubscriptionRequest,
};

/// Credit ledger API client.
///
/// Thin facade for the app layer: balance checks, spends, grants and the
/// insight views.
#[derive(Debug, Clone)]
pub struct CreditsClient {
    client: Client,
    base_url: String,
    api_key: String,
    service_name: String,
}

impl CreditsClient {
    /// Create a new client.
    ///
    /// # Arguments
    ///
    /// * `base_url` - Base URL of the ledger service (e.g., `"http://credit-ledger:8080"`)
    /// * `api_key` - Service API key for authentication
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Configuration` if the HTTP client cannot be built.
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Result<Self, ClientError> {
        Self::with_options(base_url, api_key, ClientOptions::default())
    }

    /// Create a new client with custom options.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Configuration` if the HTTP client cannot be built.
    pub fn with_options(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        options: ClientOptions,
    ) -> Result<Self, ClientError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(options.timeout_seconds))
            .build()
            .map_err(|e| ClientError::Configuration(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            service_name: options.service_name,
        })
    }

    /// Get a user's balance, creating it on first access.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the server returns an error.
    pub async fn get_balance(&self, user_id: &UserId) -> Result<BalanceResponse, ClientError> {
        let request = self.request(Method::GET, &format!("/v1/users/{user_id}/balance"));
        self.send(request).await
    }

    /// Fetch the spendable credits for display after a change.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the server returns an error.
    pub async fn refresh_balance(&self, user_id: &UserId) -> Result<i64, ClientError> {
        Ok(self.get_balance(user_id).await?.current_balance)
    }

    /// Check whether a user can afford `required` credits.
    ///
    /// Optimistic: a later spend may still be declined.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the server returns an error.
    pub async fn has_sufficient_credits(
        &self,
        user_id: &UserId,
        required: i64,
    ) -> Result<bool, ClientError> {
        let request = self
            .request(Method::POST, &format!("/v1/users/{user_id}/balance/check"))
            .json(&CheckBalanceRequest { required });
        let response: CheckBalanceResponse = self.send(request).await?;
        Ok(response.sufficient)
    }

    /// Debit credits. `Ok(false)` means the balance did not cover the amount.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::StoreUnavailable` when the outcome is unknown and
    /// `ClientError::DuplicateOperation` when the source id was already charged.
    pub async fn spend(&self, user_id: &UserId, request: &SpendRequest) -> Result<bool, ClientError> {
        let response = self.spend_detailed(user_id, request).await?;
        if !response.success {
            tracing::debug!(
                user_id = %user_id,
                amount = %request.amount,
                balance = %response.balance,
                "Spend declined"
            );
        }
        Ok(response.success)
    }

    /// Debit credits, returning the balance and written transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the server returns an error.
    pub async fn spend_detailed(
        &self,
        user_id: &UserId,
        request: &SpendRequest,
    ) -> Result<SpendResponse, ClientError> {
        let request = self
            .request(Method::POST, &format!("/v1/users/{user_id}/spend"))
            .json(request);
        self.send(request).await
    }

    /// Credit a user's balance.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the server returns an error.
    pub async fn grant(
        &self,
        user_id: &UserId,
        request: &GrantRequest,
    ) -> Result<GrantResponse, ClientError> {
        let request = self
            .request(Method::POST, &format!("/v1/users/{user_id}/grant"))
            .json(request);
        self.send(request).await
    }

    /// Price and charge an AI reply.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the server returns an error.
    pub async fn charge_message(
        &self,
        user_id: &UserId,
        request: &ChargeMessageRequest,
    ) -> Result<ChargeMessageResponse, ClientError> {
        let request = self
            .request(Method::POST, &format!("/v1/users/{user_id}/messages"))
            .json(request);
        self.send(request).await
    }

    /// List a user's transactions, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the server returns an error.
    pub async fn list_transactions(
        &self,
        user_id: &UserId,
        limit: usize,
        offset: usize,
    ) -> Result<TransactionsResponse, ClientError> {
        let request = self
            .request(Method::GET, &format!("/v1/users/{user_id}/transactions"))
            .query(&[("limit", limit), ("offset", offset)]);
        self.send(request).await
    }

    /// Change a user's subscription tier. Does not grant credits.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the server returns an error.
    pub async fn update_subscription_tier(
        &self,
        user_id: &UserId,
        tier_id: Option<&str>,
    ) -> Result<BalanceResponse, ClientError> {
        let request = self
            .request(Method::PUT, &format!("/v1/users/{user_id}/subscription"))
            .json(&UpdateSubscriptionRequest { tier_id });
        self.send(request).await
    }

    /// Usage statistics over the last `days` days.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the server returns an error.
    pub async fn get_usage_stats(
        &self,
        user_id: &UserId,
        days: u32,
    ) -> Result<CreditUsageStats, ClientError> {
        let request = self
            .request(Method::GET, &format!("/v1/users/{user_id}/usage"))
            .query(&[("days", days)]);
        self.send(request).await
    }

    /// Upgrade recommendation and prompt flag.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the server returns an error.
    pub async fn get_recommendation(
        &self,
        user_id: &UserId,
    ) -> Result<RecommendationResponse, ClientError> {
        let request = self.request(Method::GET, &format!("/v1/users/{user_id}/recommendation"));
        self.send(request).await
    }

    /// Active subscription tiers in display order.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the server returns an error.
    pub async fn list_tiers(&self) -> Result<Vec<SubscriptionTier>, ClientError> {
        let response: TiersResponse = self.send(self.request(Method::GET, "/v1/tiers")).await?;
        Ok(response.tiers)
    }

    /// Active credit packages in display order.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the server returns an error.
    pub async fn list_packages(&self) -> Result<Vec<PackageResponse>, ClientError> {
        let response: PackagesResponse =
            self.send(self.request(Method::GET, "/v1/packages")).await?;
        Ok(response.packages)
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.client
            .request(method, format!("{}{path}", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("x-service-name", &self.service_name)
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ClientError> {
        let response = request.send().await?;
        self.handle_response(response).await
    }

    /// Handle API response and convert errors.
    async fn handle_response<T: DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> Result<T, ClientError> {
        let status = response.status();

        if status.is_success() {
            let body = response.bytes().await?;
            return Ok(serde_json::from_slice(&body)?);
        }

        // Try to parse error response
        let error_body: Result<ApiErrorResponse, _> = response.json().await;

        match error_body {
            Ok(api_error) => {
                let code = api_error.error.code.as_str();
                let message = api_error.error.message;
                let detail = |key: &str| {
                    api_error
                        .error
                        .details
                        .as_ref()
                        .and_then(|d| d.get(key))
                        .and_then(serde_json::Value::as_str)
                        .unwrap_or_default()
                        .to_string()
                };

                // Map specific error codes to typed errors
                match code {
                    "store_unavailable" => Err(ClientError::StoreUnavailable { message }),
                    "duplicate_operation" => Err(ClientError::DuplicateOperation {
                        source_id: detail("source_id"),
                        transaction_id: detail("transaction_id"),
                    }),
                    "validation_error" => Err(ClientError::Validation { message }),
                    _ => Err(ClientError::Api {
                        code: code.to_string(),
                        message,
                        status: status.as_u16(),
                    }),
                }
            }
            Err(_) if status == reqwest::StatusCode::SERVICE_UNAVAILABLE => {
                Err(ClientError::StoreUnavailable {
                    message: format!("HTTP {status}"),
                })
            }
            Err(_) => Err(ClientError::Api {
                code: "unknown".to_string(),
                message: format!("HTTP {status}"),
                status: status.as_u16(),
            }),
        }
    }
}

/// Client options for customization.
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// Request timeout in seconds (default: 30).
    pub timeout_seconds: u64,
    /// Service name to include in requests.
    pub service_name: String,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            timeout_seconds: 30,
            service_name: "unknown".to_string(),
        }
    }
}

impl ClientOptions {
    /// Create options with a service name.
    #[must_use]
    pub fn with_service_name(name: impl Into<String>) -> Self {
        Self {
            service_name: name.into(),
            ..Self::default()
        }
    }
}
