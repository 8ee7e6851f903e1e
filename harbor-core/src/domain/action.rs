//! Broker actions
//!
//! The closed set of actions the gateway submits to the job broker. Each
//! action knows which sub-action key its outcome is reported under and which
//! dependent action, if any, must run after it succeeds.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::operation::OperationOutcome;

/// Role granted to project owners and used to find a user's projects
pub const PROJECT_MEMBER_ROLE: &str = "edit";

/// A user bound to a cluster role inside a project
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleGrant {
    pub username: String,
    pub role: String,
}

impl RoleGrant {
    pub fn new(username: impl Into<String>, role: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            role: role.into(),
        }
    }

    /// Name of the nested detail entry the broker reports this grant under
    pub fn entry_key(&self) -> String {
        format!("User-{}-{}", self.username, self.role)
    }
}

/// Where a sub-action's outcome lives inside a broker result
///
/// `detail` is the top-level key in `details`; `entry` names a nested value
/// when the broker groups several outcomes under one key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionKey {
    pub detail: String,
    pub entry: Option<String>,
}

impl ActionKey {
    pub fn new(detail: impl Into<String>) -> Self {
        Self {
            detail: detail.into(),
            entry: None,
        }
    }

    pub fn with_entry(mut self, entry: impl Into<String>) -> Self {
        self.entry = Some(entry.into());
        self
    }
}

impl fmt::Display for ActionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.entry {
            Some(entry) => write!(f, "{}/{}", self.detail, entry),
            None => f.write_str(&self.detail),
        }
    }
}

/// An action submitted to the job broker
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BrokerAction {
    /// Create a project; when `owner` is set, bind it once the project exists
    CreateProject {
        cluster: String,
        project: String,
        owner: Option<RoleGrant>,
    },
    AddRoleBinding {
        cluster: String,
        project: String,
        grant: RoleGrant,
    },
    RemoveRoleBinding {
        cluster: String,
        project: String,
        grant: RoleGrant,
    },
    DeleteProject {
        cluster: String,
        project: String,
    },
    ListRoleBindings {
        cluster: String,
        project: String,
    },
}

impl BrokerAction {
    /// Stable name used in logs and diagnostics
    pub fn name(&self) -> &'static str {
        match self {
            BrokerAction::CreateProject { .. } => "create_project",
            BrokerAction::AddRoleBinding { .. } => "add_role_binding",
            BrokerAction::RemoveRoleBinding { .. } => "remove_role_binding",
            BrokerAction::DeleteProject { .. } => "delete_project",
            BrokerAction::ListRoleBindings { .. } => "list_role_bindings",
        }
    }

    pub fn cluster(&self) -> &str {
        match self {
            BrokerAction::CreateProject { cluster, .. }
            | BrokerAction::AddRoleBinding { cluster, .. }
            | BrokerAction::RemoveRoleBinding { cluster, .. }
            | BrokerAction::DeleteProject { cluster, .. }
            | BrokerAction::ListRoleBindings { cluster, .. } => cluster,
        }
    }

    /// Key under which the broker reports this action's outcome
    pub fn action_key(&self) -> ActionKey {
        match self {
            BrokerAction::CreateProject { cluster, .. } => {
                ActionKey::new(format!("post_project_{}", cluster))
            }
            BrokerAction::AddRoleBinding { cluster, grant, .. } => {
                ActionKey::new(format!("post_rolebinding_{}", cluster))
                    .with_entry(grant.entry_key())
            }
            BrokerAction::RemoveRoleBinding { cluster, grant, .. } => {
                ActionKey::new(format!("delete_rolebinding_{}", cluster))
                    .with_entry(grant.entry_key())
            }
            BrokerAction::DeleteProject { cluster, .. } => {
                ActionKey::new(format!("delete_project_{}", cluster))
            }
            BrokerAction::ListRoleBindings { cluster, .. } => {
                ActionKey::new(format!("get_rolebindings_{}", cluster))
            }
        }
    }

    /// Dependent action triggered by a successful outcome of this one
    ///
    /// Only project creation with an owner chains: the owner is bound to the
    /// project name the platform actually assigned (`body.metadata.name`),
    /// falling back to the requested name.
    pub fn follow_up(&self, outcome: &OperationOutcome) -> Option<BrokerAction> {
        if !outcome.is_success() {
            return None;
        }

        match self {
            BrokerAction::CreateProject {
                cluster,
                project,
                owner: Some(owner),
            } => {
                let assigned = outcome
                    .body
                    .pointer("/metadata/name")
                    .and_then(|name| name.as_str())
                    .unwrap_or(project);

                Some(BrokerAction::AddRoleBinding {
                    cluster: cluster.clone(),
                    project: assigned.to_string(),
                    grant: owner.clone(),
                })
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn create_demo() -> BrokerAction {
        BrokerAction::CreateProject {
            cluster: "clusterA".to_string(),
            project: "demo".to_string(),
            owner: Some(RoleGrant::new("alice", "edit")),
        }
    }

    #[test]
    fn test_action_keys() {
        assert_eq!(create_demo().action_key(), ActionKey::new("post_project_clusterA"));

        let bind = BrokerAction::AddRoleBinding {
            cluster: "clusterA".to_string(),
            project: "demo".to_string(),
            grant: RoleGrant::new("alice", "edit"),
        };
        let key = bind.action_key();
        assert_eq!(key.detail, "post_rolebinding_clusterA");
        assert_eq!(key.entry.as_deref(), Some("User-alice-edit"));
        assert_eq!(key.to_string(), "post_rolebinding_clusterA/User-alice-edit");
    }

    #[test]
    fn test_create_project_chains_role_binding_on_assigned_name() {
        let outcome = OperationOutcome::new(201, json!({ "metadata": { "name": "demo-gts" } }));

        assert_eq!(
            create_demo().follow_up(&outcome),
            Some(BrokerAction::AddRoleBinding {
                cluster: "clusterA".to_string(),
                project: "demo-gts".to_string(),
                grant: RoleGrant::new("alice", "edit"),
            })
        );
    }

    #[test]
    fn test_create_project_falls_back_to_requested_name() {
        let outcome = OperationOutcome::new(201, json!({}));
        match create_demo().follow_up(&outcome) {
            Some(BrokerAction::AddRoleBinding { project, .. }) => assert_eq!(project, "demo"),
            other => panic!("unexpected follow-up: {:?}", other),
        }
    }

    #[test]
    fn test_no_follow_up_on_failure_or_single_leg_actions() {
        let conflict = OperationOutcome::new(409, json!({ "reason": "AlreadyExists" }));
        assert_eq!(create_demo().follow_up(&conflict), None);

        let ok = OperationOutcome::new(200, json!({}));
        let delete = BrokerAction::DeleteProject {
            cluster: "clusterA".to_string(),
            project: "demo".to_string(),
        };
        assert_eq!(delete.follow_up(&ok), None);

        let ownerless = BrokerAction::CreateProject {
            cluster: "clusterA".to_string(),
            project: "demo".to_string(),
            owner: None,
        };
        assert_eq!(ownerless.follow_up(&ok), None);
    }
}
