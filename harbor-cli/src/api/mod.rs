//! API client module
//!
//! HTTP client for communicating with the Harbor gateway API.
//!
//! Gateway answers are passed through from the job broker, so the client
//! does not deserialize them into typed values: every call returns the
//! status code together with the raw JSON body.

use anyhow::{Context, Result};
use harbor_core::dto::operation::SubmitMode;
use harbor_core::dto::project::{AddRoleBinding, CreateProject};
use reqwest::{Client, StatusCode, header};
use serde_json::Value;

/// A gateway answer
#[derive(Debug, Clone)]
pub struct Reply {
    pub status: StatusCode,
    /// Lookup URL; only set on in-flight answers
    pub location: Option<String>,
    pub body: Value,
}

impl Reply {
    /// The operation has not resolved yet
    ///
    /// A resolved outcome may itself be a `202` passed through from the
    /// platform; only in-flight answers carry a `Location` header.
    pub fn is_pending(&self) -> bool {
        self.status == StatusCode::ACCEPTED && self.location.is_some()
    }

    /// Handle of a pending operation
    pub fn operation_id(&self) -> Option<&str> {
        self.body.get("operation_id").and_then(Value::as_str)
    }
}

/// HTTP client for the Harbor gateway API
pub struct GatewayClient {
    base_url: String,
    client: Client,
}

impl GatewayClient {
    /// Create a new API client
    ///
    /// # Arguments
    /// * `base_url` - The base URL of the gateway API
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: Client::new(),
        }
    }

    /// Create a project owned by a user
    pub async fn create_project(&self, req: &CreateProject, mode: SubmitMode) -> Result<Reply> {
        let url = self.submit_url("/openshift/projects", mode);
        let response = self
            .client
            .post(&url)
            .json(req)
            .send()
            .await
            .context("Failed to send create project request")?;

        Self::reply(response).await
    }

    /// Delete a project
    pub async fn delete_project(&self, project: &str, mode: SubmitMode) -> Result<Reply> {
        let url = self.submit_url(&format!("/openshift/projects/{}", project), mode);
        let response = self
            .client
            .delete(&url)
            .send()
            .await
            .context("Failed to send delete project request")?;

        Self::reply(response).await
    }

    /// List the projects a user is a member of
    pub async fn list_projects(&self, username: &str) -> Result<Reply> {
        let url = format!("{}/openshift/projects", self.base_url);
        let response = self
            .client
            .get(&url)
            .query(&[("username", username)])
            .send()
            .await
            .context("Failed to send list projects request")?;

        Self::reply(response).await
    }

    /// List a project's role bindings
    pub async fn list_role_bindings(&self, project: &str, mode: SubmitMode) -> Result<Reply> {
        let url = self.submit_url(&format!("/openshift/projects/{}/rolebindings", project), mode);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .context("Failed to send list role bindings request")?;

        Self::reply(response).await
    }

    /// Bind a user to a role inside a project
    pub async fn add_role_binding(
        &self,
        project: &str,
        req: &AddRoleBinding,
        mode: SubmitMode,
    ) -> Result<Reply> {
        let url = self.submit_url(&format!("/openshift/projects/{}/rolebindings", project), mode);
        let response = self
            .client
            .post(&url)
            .json(req)
            .send()
            .await
            .context("Failed to send add role binding request")?;

        Self::reply(response).await
    }

    /// Remove a user's role binding
    pub async fn remove_role_binding(
        &self,
        project: &str,
        username: &str,
        role: &str,
        mode: SubmitMode,
    ) -> Result<Reply> {
        let url = self.submit_url(
            &format!("/openshift/projects/{}/rolebindings/{}/{}", project, username, role),
            mode,
        );
        let response = self
            .client
            .delete(&url)
            .send()
            .await
            .context("Failed to send remove role binding request")?;

        Self::reply(response).await
    }

    /// Look up a tracked operation
    pub async fn get_operation(&self, id: &str) -> Result<Reply> {
        let url = format!("{}/operations/{}", self.base_url, id);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .context("Failed to send get operation request")?;

        Self::reply(response).await
    }

    // =============================================================================
    // Helper Methods
    // =============================================================================

    fn submit_url(&self, path: &str, mode: SubmitMode) -> String {
        match mode {
            SubmitMode::Sync => format!("{}{}", self.base_url, path),
            SubmitMode::Async => format!("{}{}?mode=async", self.base_url, path),
        }
    }

    /// Reads the status and body; non-JSON bodies are kept as a string
    async fn reply(response: reqwest::Response) -> Result<Reply> {
        let status = response.status();
        let location = response
            .headers()
            .get(header::LOCATION)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        let text = response
            .text()
            .await
            .context("Failed to read gateway response")?;

        let body = if text.is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&text).unwrap_or(Value::String(text))
        };

        Ok(Reply {
            status,
            location,
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_submit_url() {
        let client = GatewayClient::new("http://localhost:3000/");
        assert_eq!(
            client.submit_url("/openshift/projects/demo", SubmitMode::Sync),
            "http://localhost:3000/openshift/projects/demo"
        );
        assert_eq!(
            client.submit_url("/openshift/projects/demo", SubmitMode::Async),
            "http://localhost:3000/openshift/projects/demo?mode=async"
        );
    }

    #[test]
    fn test_pending_reply() {
        let reply = Reply {
            status: StatusCode::ACCEPTED,
            location: Some("/operations/op-1".to_string()),
            body: json!({ "operation_id": "op-1", "state": "running" }),
        };
        assert!(reply.is_pending());
        assert_eq!(reply.operation_id(), Some("op-1"));

        let reply = Reply {
            status: StatusCode::OK,
            location: None,
            body: json!({ "kind": "RoleBinding" }),
        };
        assert!(!reply.is_pending());
        assert_eq!(reply.operation_id(), None);
    }

    #[test]
    fn test_resolved_accepted_outcome_is_not_pending() {
        let reply = Reply {
            status: StatusCode::ACCEPTED,
            location: None,
            body: json!({ "kind": "Status", "status": "Success" }),
        };
        assert!(!reply.is_pending());
    }
}
