//! Project and role binding DTOs

use serde::{Deserialize, Serialize};

use crate::domain::action::PROJECT_MEMBER_ROLE;

fn default_role() -> String {
    PROJECT_MEMBER_ROLE.to_string()
}

/// Request to create a tenant project owned by a user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateProject {
    pub project: String,
    pub username: String,
    #[serde(default = "default_role")]
    pub role: String,
}

/// Request to bind a user to a role inside a project
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddRoleBinding {
    pub username: String,
    pub role: String,
}

/// Query parameters of `GET /openshift/projects`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProjectsQuery {
    pub username: Option<String>,
}
