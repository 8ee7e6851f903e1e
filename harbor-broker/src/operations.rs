//! Action submission and operation status endpoints

use harbor_core::domain::action::BrokerAction;
use harbor_core::domain::broker::{RawOperationResult, SubmitResponse};
use harbor_core::domain::operation::OperationHandle;
use serde_json::json;
use tracing::debug;

use crate::BrokerClient;
use crate::error::Result;

/// Business line every project is filed under
const BUSINESS_LINE: &str = "GTS";

impl BrokerClient {
    // =============================================================================
    // Submission
    // =============================================================================

    /// Submit an action to the broker
    ///
    /// # Returns
    /// The handle of the queued operation
    pub(crate) async fn submit_action(&self, action: &BrokerAction) -> Result<OperationHandle> {
        let request = match action {
            BrokerAction::CreateProject {
                cluster, project, ..
            } => self
                .client
                .post(format!("{}/v1/clusters/{}/projects", self.base_url, cluster))
                .json(&json!({ "businessLine": BUSINESS_LINE, "projectSuffix": project })),
            BrokerAction::AddRoleBinding {
                cluster,
                project,
                grant,
            } => self
                .client
                .put(format!(
                    "{}/v1/clusters/{}/projects/{}/rolebindings/users",
                    self.base_url, cluster, project
                ))
                .json(&json!({ "user": grant.username, "role": grant.role })),
            BrokerAction::RemoveRoleBinding {
                cluster,
                project,
                grant,
            } => self
                .client
                .delete(format!(
                    "{}/v1/clusters/{}/projects/{}/rolebindings/users/{}",
                    self.base_url, cluster, project, grant.username
                ))
                .query(&[("role", grant.role.as_str())]),
            BrokerAction::DeleteProject { cluster, project } => self.client.delete(format!(
                "{}/v1/clusters/{}/projects/{}",
                self.base_url, cluster, project
            )),
            BrokerAction::ListRoleBindings { cluster, project } => self.client.get(format!(
                "{}/v1/clusters/{}/projects/{}/rolebindings",
                self.base_url, cluster, project
            )),
        };

        debug!("Submitting {} to broker", action.name());

        let response = self.authorized(request).await?.send().await?;
        let accepted: SubmitResponse = self.handle_response(response).await?;

        Ok(accepted.operation_id)
    }

    // =============================================================================
    // Operation Status
    // =============================================================================

    /// Get the current status of an operation
    ///
    /// The operations endpoint is read without credentials.
    pub(crate) async fn fetch_operation(
        &self,
        handle: &OperationHandle,
    ) -> Result<RawOperationResult> {
        let url = format!("{}/v1/operations/{}", self.base_url, handle);
        let response = self.client.get(&url).send().await?;

        self.handle_response(response).await
    }
}
