//! OAuth2 client-credentials tokens for the broker API

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tokio::time::{Duration, Instant};
use tracing::debug;

use crate::error::{BrokerError, Result};

/// Tokens are refreshed this long before the identity provider says they expire
const EXPIRY_MARGIN: Duration = Duration::from_secs(30);

/// Lifetime assumed when the identity provider does not send `expires_in`
const DEFAULT_LIFETIME: Duration = Duration::from_secs(300);

/// Client credentials registered with the identity provider
#[derive(Debug, Clone)]
pub struct ClientCredentials {
    /// Base URL of the identity provider (e.g., "https://iam.example.com")
    pub token_url: String,
    pub client_id: String,
    pub client_secret: String,
    pub scope: Option<String>,
}

#[derive(Debug, Serialize)]
struct TokenRequest<'a> {
    grant_type: &'static str,
    client_id: &'a str,
    client_secret: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    scope: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: Option<u64>,
}

#[derive(Debug)]
struct CachedToken {
    value: String,
    refresh_at: Instant,
}

/// Fetches and caches bearer tokens
///
/// A single cached token is shared by every request; it is refreshed lazily
/// the first time it is needed after it went stale.
#[derive(Debug)]
pub struct TokenProvider {
    client: Client,
    credentials: ClientCredentials,
    cached: Mutex<Option<CachedToken>>,
}

impl TokenProvider {
    pub fn new(credentials: ClientCredentials) -> Self {
        Self::with_client(credentials, Client::new())
    }

    pub fn with_client(credentials: ClientCredentials, client: Client) -> Self {
        Self {
            client,
            credentials,
            cached: Mutex::new(None),
        }
    }

    /// Returns a valid access token, fetching a new one if needed
    pub async fn bearer(&self) -> Result<String> {
        let mut cached = self.cached.lock().await;

        if let Some(token) = cached.as_ref() {
            if Instant::now() < token.refresh_at {
                return Ok(token.value.clone());
            }
        }

        let fresh = self.fetch_token().await?;
        let value = fresh.value.clone();
        *cached = Some(fresh);

        Ok(value)
    }

    async fn fetch_token(&self) -> Result<CachedToken> {
        let url = format!(
            "{}/v2/oauth2/token",
            self.credentials.token_url.trim_end_matches('/')
        );
        debug!("Requesting access token from {}", url);

        let response = self
            .client
            .post(&url)
            .json(&TokenRequest {
                grant_type: "client_credentials",
                client_id: &self.credentials.client_id,
                client_secret: &self.credentials.client_secret,
                scope: self.credentials.scope.as_deref(),
            })
            .send()
            .await
            .map_err(|e| BrokerError::Auth(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BrokerError::Auth(format!(
                "token endpoint answered {}: {}",
                status, body
            )));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| BrokerError::Auth(format!("invalid token response: {}", e)))?;

        let lifetime = token
            .expires_in
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_LIFETIME);

        Ok(CachedToken {
            value: token.access_token,
            refresh_at: Instant::now() + lifetime.saturating_sub(EXPIRY_MARGIN),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn credentials(server: &MockServer) -> ClientCredentials {
        ClientCredentials {
            token_url: server.uri(),
            client_id: "harbor".to_string(),
            client_secret: "s3cret".to_string(),
            scope: Some("openshift".to_string()),
        }
    }

    #[tokio::test]
    async fn test_token_is_cached() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v2/oauth2/token"))
            .and(body_partial_json(json!({
                "grant_type": "client_credentials",
                "client_id": "harbor",
                "scope": "openshift",
            })))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "access_token": "t-1", "expires_in": 3600 })),
            )
            .expect(1)
            .mount(&server)
            .await;

        let provider = TokenProvider::new(credentials(&server));
        assert_eq!(provider.bearer().await.unwrap(), "t-1");
        assert_eq!(provider.bearer().await.unwrap(), "t-1");
    }

    #[tokio::test]
    async fn test_token_endpoint_failure_is_auth_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v2/oauth2/token"))
            .respond_with(ResponseTemplate::new(401).set_body_string("bad client"))
            .mount(&server)
            .await;

        let provider = TokenProvider::new(credentials(&server));
        let err = provider.bearer().await.unwrap_err();
        assert!(matches!(err, BrokerError::Auth(msg) if msg.contains("bad client")));
    }
}
