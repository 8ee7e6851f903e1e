//! Project API Handlers
//!
//! HTTP endpoints for tenant project management.

use axum::{
    Json,
    extract::{Path, Query, State},
    response::Response,
};
use harbor_core::dto::operation::SubmitQuery;
use harbor_core::dto::project::{CreateProject, ProjectsQuery};

use crate::api::AppState;
use crate::api::error::ApiResult;
use crate::api::operation::respond_tracked;
use crate::service::tenant_service;

/// POST /openshift/projects
/// Create a project and bind its owner
pub async fn create_project(
    State(state): State<AppState>,
    Query(query): Query<SubmitQuery>,
    Json(req): Json<CreateProject>,
) -> ApiResult<Response> {
    tracing::info!("Creating project {} for user {}", req.project, req.username);

    let handle = tenant_service::create_project(&state.poller, &state.cluster, req).await?;
    respond_tracked(&state, handle, query.mode).await
}

/// GET /openshift/projects?username=
/// List the projects a user is a member of
pub async fn list_projects(
    State(state): State<AppState>,
    Query(query): Query<ProjectsQuery>,
) -> ApiResult<Json<Vec<String>>> {
    let Some(username) = query.username.filter(|u| !u.is_empty()) else {
        return Ok(Json(Vec::new()));
    };

    tracing::debug!("Listing projects of user {}", username);

    let projects =
        tenant_service::projects_for_user(&state.poller, &state.cluster, &username, state.sync_wait)
            .await?;

    Ok(Json(projects))
}

/// DELETE /openshift/projects/{project}
/// Delete a project
pub async fn delete_project(
    State(state): State<AppState>,
    Path(project): Path<String>,
    Query(query): Query<SubmitQuery>,
) -> ApiResult<Response> {
    tracing::info!("Deleting project {}", project);

    let handle = tenant_service::delete_project(&state.poller, &state.cluster, &project).await?;
    respond_tracked(&state, handle, query.mode).await
}
