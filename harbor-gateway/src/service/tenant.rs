//! Tenant Service
//!
//! Business logic for tenant projects and their role bindings. Every write
//! is submitted to the job broker and tracked by the operation poller; the
//! caller decides how long to wait for the outcome.

use std::time::Duration;

use harbor_broker::BrokerError;
use harbor_core::domain::action::{BrokerAction, PROJECT_MEMBER_ROLE, RoleGrant};
use harbor_core::domain::operation::OperationHandle;
use harbor_core::dto::project::{AddRoleBinding, CreateProject};
use serde_json::Value;
use thiserror::Error;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::scheduler::OperationPoller;
use crate::service::table::Lookup;

/// Longest project name the platform accepts
const MAX_PROJECT_NAME_LEN: usize = 63;

/// Service error type
#[derive(Debug, Error)]
pub enum TenantError {
    #[error("{0}")]
    ValidationError(String),

    #[error(transparent)]
    Broker(#[from] BrokerError),
}

/// Submit the creation of a project owned by a user
///
/// The owner's role binding is chained automatically once the project
/// exists, so the returned handle resolves to the binding's outcome.
pub async fn create_project(
    poller: &OperationPoller,
    cluster: &str,
    req: CreateProject,
) -> Result<OperationHandle, TenantError> {
    validate_project_name(&req.project)?;
    validate_grant(&req.username, &req.role)?;

    let handle = poller
        .submit_and_track(BrokerAction::CreateProject {
            cluster: cluster.to_string(),
            project: req.project.clone(),
            owner: Some(RoleGrant::new(req.username, req.role)),
        })
        .await?;

    info!("Project {} creation submitted as {}", req.project, handle);
    Ok(handle)
}

/// Submit the deletion of a project
pub async fn delete_project(
    poller: &OperationPoller,
    cluster: &str,
    project: &str,
) -> Result<OperationHandle, TenantError> {
    validate_project_name(project)?;

    let handle = poller
        .submit_and_track(BrokerAction::DeleteProject {
            cluster: cluster.to_string(),
            project: project.to_string(),
        })
        .await?;

    Ok(handle)
}

/// Submit a listing of a project's role bindings
pub async fn list_role_bindings(
    poller: &OperationPoller,
    cluster: &str,
    project: &str,
) -> Result<OperationHandle, TenantError> {
    validate_project_name(project)?;

    let handle = poller
        .submit_and_track(BrokerAction::ListRoleBindings {
            cluster: cluster.to_string(),
            project: project.to_string(),
        })
        .await?;

    Ok(handle)
}

/// Submit a role binding for a user inside a project
pub async fn add_role_binding(
    poller: &OperationPoller,
    cluster: &str,
    project: &str,
    req: AddRoleBinding,
) -> Result<OperationHandle, TenantError> {
    validate_project_name(project)?;
    validate_grant(&req.username, &req.role)?;

    let handle = poller
        .submit_and_track(BrokerAction::AddRoleBinding {
            cluster: cluster.to_string(),
            project: project.to_string(),
            grant: RoleGrant::new(req.username, req.role),
        })
        .await?;

    Ok(handle)
}

/// Submit the removal of a user's role binding
pub async fn remove_role_binding(
    poller: &OperationPoller,
    cluster: &str,
    project: &str,
    username: &str,
    role: &str,
) -> Result<OperationHandle, TenantError> {
    validate_project_name(project)?;
    validate_grant(username, role)?;

    let handle = poller
        .submit_and_track(BrokerAction::RemoveRoleBinding {
            cluster: cluster.to_string(),
            project: project.to_string(),
            grant: RoleGrant::new(username, role),
        })
        .await?;

    Ok(handle)
}

/// Names of the projects `username` is a member of
///
/// Lists the cluster's projects, then tracks one role binding listing per
/// project and waits for all of them under a single deadline. Projects
/// whose listing fails or does not resolve in time are left out.
pub async fn projects_for_user(
    poller: &OperationPoller,
    cluster: &str,
    username: &str,
    wait: Duration,
) -> Result<Vec<String>, TenantError> {
    let deadline = Instant::now() + wait;
    let projects = poller.broker().list_projects(cluster).await?;
    debug!("Checking {} project(s) for user {}", projects.len(), username);

    let mut pending = Vec::with_capacity(projects.len());
    for project in projects {
        let action = BrokerAction::ListRoleBindings {
            cluster: cluster.to_string(),
            project: project.clone(),
        };
        match poller.submit_and_track(action).await {
            Ok(handle) => pending.push((project, handle)),
            Err(e) => warn!("Skipping project {}: {}", project, e),
        }
    }

    let mut member_of = Vec::new();
    for (project, handle) in pending {
        let remaining = deadline.saturating_duration_since(Instant::now());
        match poller.table().wait_for(&handle, remaining).await {
            Ok(Lookup::Resolved(outcome)) if outcome.is_success() => {
                if has_member_binding(&outcome.body, username) {
                    member_of.push(project);
                }
            }
            Ok(Lookup::Resolved(outcome)) => {
                warn!(
                    "Skipping project {}: listing failed with status {}",
                    project, outcome.code
                );
            }
            Ok(Lookup::InFlight { .. }) => {
                warn!("Skipping project {}: listing still running", project);
            }
            Err(e) => warn!("Skipping project {}: {}", project, e),
        }
    }

    Ok(member_of)
}

/// Whether a role binding listing binds `username` to the member role
pub fn has_member_binding(bindings: &Value, username: &str) -> bool {
    let Some(items) = bindings.get("items").and_then(Value::as_array) else {
        return false;
    };

    items
        .iter()
        .filter(|binding| {
            binding.pointer("/metadata/name").and_then(Value::as_str) == Some(PROJECT_MEMBER_ROLE)
        })
        .filter_map(|binding| binding.get("subjects").and_then(Value::as_array))
        .flatten()
        .any(|subject| subject.get("name").and_then(Value::as_str) == Some(username))
}

/// Project names must be valid DNS labels
pub fn validate_project_name(name: &str) -> Result<(), TenantError> {
    if name.is_empty() {
        return Err(TenantError::ValidationError(
            "project name cannot be empty".to_string(),
        ));
    }

    if name.len() > MAX_PROJECT_NAME_LEN {
        return Err(TenantError::ValidationError(format!(
            "project name cannot exceed {} characters",
            MAX_PROJECT_NAME_LEN
        )));
    }

    let valid_chars = name
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-');
    if !valid_chars || name.starts_with('-') || name.ends_with('-') {
        return Err(TenantError::ValidationError(format!(
            "invalid project name '{}': use lowercase letters, digits and inner dashes",
            name
        )));
    }

    Ok(())
}

fn validate_grant(username: &str, role: &str) -> Result<(), TenantError> {
    if username.trim().is_empty() {
        return Err(TenantError::ValidationError(
            "username cannot be empty".to_string(),
        ));
    }

    if role.trim().is_empty() {
        return Err(TenantError::ValidationError("role cannot be empty".to_string()));
    }

    Ok(())
}
