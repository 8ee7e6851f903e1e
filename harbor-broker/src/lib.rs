//! Harbor Broker Client
//!
//! HTTP client for the asynchronous job broker that fronts the container
//! platform. Submitting an action returns an operation handle; the outcome is
//! read later from `GET /v1/operations/{id}`.
//!
//! The [`OperationBroker`] trait is the seam the gateway's polling layer is
//! written against, so it can be driven by a scripted broker in tests.
//!
//! # Example
//!
//! ```no_run
//! use harbor_broker::{BrokerClient, OperationBroker};
//! use harbor_core::domain::action::BrokerAction;
//!
//! # async fn example() -> harbor_broker::Result<()> {
//! let client = BrokerClient::new("http://localhost:9000");
//! let handle = client
//!     .submit(&BrokerAction::DeleteProject {
//!         cluster: "clusterA".to_string(),
//!         project: "demo".to_string(),
//!     })
//!     .await?;
//! let result = client.fetch(&handle).await?;
//! println!("{:?}", result.state());
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod error;
mod operations;
mod projects;

pub use auth::{ClientCredentials, TokenProvider};
pub use error::{BrokerError, Result};

use std::sync::Arc;

use async_trait::async_trait;
use harbor_core::domain::action::BrokerAction;
use harbor_core::domain::broker::RawOperationResult;
use harbor_core::domain::operation::OperationHandle;
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;

/// Operations the polling layer needs from the job broker
#[async_trait]
pub trait OperationBroker: Send + Sync {
    /// Submits an action and returns the handle the broker queued it under
    async fn submit(&self, action: &BrokerAction) -> Result<OperationHandle>;

    /// Reads the current status of an operation; safe to call repeatedly
    async fn fetch(&self, handle: &OperationHandle) -> Result<RawOperationResult>;

    /// Lists the projects of a cluster (answered synchronously by the broker)
    async fn list_projects(&self, cluster: &str) -> Result<Vec<String>>;
}

/// HTTP client for the job broker API
#[derive(Debug, Clone)]
pub struct BrokerClient {
    /// Base URL of the broker (e.g., "https://broker.example.com")
    base_url: String,
    /// HTTP client instance
    client: Client,
    /// Bearer token source; requests go out unauthenticated without one
    tokens: Option<Arc<TokenProvider>>,
}

impl BrokerClient {
    /// Create a new broker client
    ///
    /// # Arguments
    /// * `base_url` - The base URL of the broker API
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(base_url, Client::new())
    }

    /// Create a new broker client with a custom HTTP client
    ///
    /// This allows you to configure timeouts, proxies, TLS settings, etc.
    pub fn with_client(base_url: impl Into<String>, client: Client) -> Self {
        let base_url = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
            tokens: None,
        }
    }

    /// Attach a token provider used for every authenticated call
    pub fn with_token_provider(mut self, tokens: Arc<TokenProvider>) -> Self {
        self.tokens = Some(tokens);
        self
    }

    /// Get the base URL of the broker
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Adds the bearer header when a token provider is configured
    async fn authorized(&self, request: RequestBuilder) -> Result<RequestBuilder> {
        match &self.tokens {
            Some(tokens) => Ok(request.bearer_auth(tokens.bearer().await?)),
            None => Ok(request),
        }
    }

    // =============================================================================
    // Response Handlers
    // =============================================================================

    /// Handle a broker response and deserialize JSON
    ///
    /// Non-2xx answers become [`BrokerError::Rejected`] carrying the broker's
    /// own body so it can be passed through to callers.
    async fn handle_response<T: DeserializeOwned>(&self, response: reqwest::Response) -> Result<T> {
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BrokerError::rejected(status.as_u16(), &body));
        }

        response
            .json()
            .await
            .map_err(|e| BrokerError::Parse(format!("Failed to parse JSON response: {}", e)))
    }
}

#[async_trait]
impl OperationBroker for BrokerClient {
    async fn submit(&self, action: &BrokerAction) -> Result<OperationHandle> {
        self.submit_action(action).await
    }

    async fn fetch(&self, handle: &OperationHandle) -> Result<RawOperationResult> {
        self.fetch_operation(handle).await
    }

    async fn list_projects(&self, cluster: &str) -> Result<Vec<String>> {
        self.cluster_projects(cluster).await
    }
}
