//! Version-control hosting pass-through
//!
//! Relays `/github/{*path}` to the configured hosting API with the gateway's
//! token attached. Status and body are returned untouched.

use axum::{
    body::Bytes,
    extract::{Path, RawQuery, State},
    http::{Method, header},
    response::{IntoResponse, Response},
};
use reqwest::Client;

use crate::api::AppState;
use crate::api::error::{ApiError, ApiResult};

const USER_AGENT: &str = concat!("harbor-gateway/", env!("CARGO_PKG_VERSION"));

/// Client for the hosting API
#[derive(Debug, Clone)]
pub struct GithubProxy {
    base_url: String,
    token: Option<String>,
    client: Client,
}

impl GithubProxy {
    pub fn new(base_url: impl Into<String>, token: Option<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token,
            client: Client::new(),
        }
    }

    fn url(&self, path: &str, query: Option<&str>) -> String {
        match query {
            Some(query) if !query.is_empty() => format!("{}/{}?{}", self.base_url, path, query),
            _ => format!("{}/{}", self.base_url, path),
        }
    }

    async fn relay(
        &self,
        method: Method,
        path: &str,
        query: Option<&str>,
        body: Bytes,
    ) -> Result<Response, reqwest::Error> {
        let mut request = self
            .client
            .request(method, self.url(path, query))
            .header(header::USER_AGENT, USER_AGENT)
            .header(header::ACCEPT, "application/vnd.github+json");

        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }
        if !body.is_empty() {
            request = request
                .header(header::CONTENT_TYPE, "application/json")
                .body(body);
        }

        let response = request.send().await?;
        let status = response.status();
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .cloned()
            .unwrap_or_else(|| header::HeaderValue::from_static("application/json"));
        let bytes = response.bytes().await?;

        Ok((status, [(header::CONTENT_TYPE, content_type)], bytes).into_response())
    }
}

/// ANY /github/{*path}
/// Relay a request to the hosting API
pub async fn proxy(
    State(state): State<AppState>,
    method: Method,
    Path(path): Path<String>,
    RawQuery(query): RawQuery,
    body: Bytes,
) -> ApiResult<Response> {
    let Some(github) = &state.github else {
        return Err(ApiError::NotFound("github pass-through is not configured".to_string()));
    };

    tracing::debug!("Relaying {} /{} to hosting API", method, path);

    github
        .relay(method, &path, query.as_deref(), body)
        .await
        .map_err(|e| ApiError::UpstreamUnavailable(e.to_string()))
}
