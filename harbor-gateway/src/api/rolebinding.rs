//! Role Binding API Handlers
//!
//! HTTP endpoints for user role bindings inside a project.

use axum::{
    Json,
    extract::{Path, Query, State},
    response::Response,
};
use harbor_core::dto::operation::SubmitQuery;
use harbor_core::dto::project::AddRoleBinding;

use crate::api::AppState;
use crate::api::error::ApiResult;
use crate::api::operation::respond_tracked;
use crate::service::tenant_service;

/// GET /openshift/projects/{project}/rolebindings
/// List a project's role bindings
pub async fn list_role_bindings(
    State(state): State<AppState>,
    Path(project): Path<String>,
    Query(query): Query<SubmitQuery>,
) -> ApiResult<Response> {
    tracing::debug!("Listing role bindings of {}", project);

    let handle =
        tenant_service::list_role_bindings(&state.poller, &state.cluster, &project).await?;
    respond_tracked(&state, handle, query.mode).await
}

/// POST /openshift/projects/{project}/rolebindings
/// Bind a user to a role
pub async fn add_role_binding(
    State(state): State<AppState>,
    Path(project): Path<String>,
    Query(query): Query<SubmitQuery>,
    Json(req): Json<AddRoleBinding>,
) -> ApiResult<Response> {
    tracing::info!(
        "Binding {} to role {} in {}",
        req.username,
        req.role,
        project
    );

    let handle =
        tenant_service::add_role_binding(&state.poller, &state.cluster, &project, req).await?;
    respond_tracked(&state, handle, query.mode).await
}

/// DELETE /openshift/projects/{project}/rolebindings/{username}/{role}
/// Remove a user's role binding
pub async fn remove_role_binding(
    State(state): State<AppState>,
    Path((project, username, role)): Path<(String, String, String)>,
    Query(query): Query<SubmitQuery>,
) -> ApiResult<Response> {
    tracing::info!("Removing role {} of {} in {}", role, username, project);

    let handle = tenant_service::remove_role_binding(
        &state.poller,
        &state.cluster,
        &project,
        &username,
        &role,
    )
    .await?;
    respond_tracked(&state, handle, query.mode).await
}
