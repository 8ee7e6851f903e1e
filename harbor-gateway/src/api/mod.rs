//! API Module
//!
//! HTTP API layer for the gateway.
//! Each submodule handles endpoints for a specific domain.

pub mod error;
pub mod github;
pub mod health;
pub mod operation;
pub mod project;
pub mod rolebinding;

use std::time::Duration;

use axum::{
    Router,
    routing::{any, delete, get},
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::scheduler::OperationPoller;
use github::GithubProxy;

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub poller: OperationPoller,
    /// Cluster every project route targets
    pub cluster: String,
    /// How long a submitting request waits before answering 202
    pub sync_wait: Duration,
    /// Hosting API pass-through, when configured
    pub github: Option<GithubProxy>,
}

/// Create the main API router with all endpoints
pub fn create_router(state: AppState) -> Router {
    let mut router = Router::new()
        // Health check
        .route("/", get(health::home))
        .route("/health", get(health::health_check))
        // Project endpoints
        .route(
            "/openshift/projects",
            get(project::list_projects).post(project::create_project),
        )
        .route("/openshift/projects/{project}", delete(project::delete_project))
        // Role binding endpoints
        .route(
            "/openshift/projects/{project}/rolebindings",
            get(rolebinding::list_role_bindings).post(rolebinding::add_role_binding),
        )
        .route(
            "/openshift/projects/{project}/rolebindings/{username}/{role}",
            delete(rolebinding::remove_role_binding),
        )
        // Operation lookup
        .route("/operations/{id}", get(operation::get_operation));

    if state.github.is_some() {
        router = router.route("/github/{*path}", any(github::proxy));
    }

    // Add state and middleware
    router
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
