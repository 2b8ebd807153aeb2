//! Route definitions for the API server
//!
//! Every route under `/api/v1` is authenticated. Routes that touch a project
//! or a resource additionally carry an authorization guard as a route layer,
//! so the policy runs before the handler and only for the matched method.

use crate::{
    authorization::{
        require_project_capability, require_project_role, require_resource_role,
        ProjectCapabilityGuard, ProjectRoleGuard, ResourceRoleGuard,
    },
    handlers, middleware,
    state::AppState,
};
use axum::{
    middleware as axum_middleware,
    routing::{delete, get, post, put},
    Router,
};
use shelf_authz::types::{actions, resources, roles};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// Route parameter carrying a file id
pub const FILE_ID_PARAM: &str = "file_id";

/// Create the application router with all routes and middleware
pub fn create_router(state: Arc<AppState>) -> Router {
    let project_viewer = ProjectRoleGuard::new(state.clone(), roles::VIEWER);
    let api_key_manager =
        ProjectCapabilityGuard::new(state.clone(), resources::API_KEY, actions::MANAGE);
    let file_viewer = ResourceRoleGuard::new(state.clone(), FILE_ID_PARAM, roles::VIEWER);
    let file_editor = ResourceRoleGuard::new(state.clone(), FILE_ID_PARAM, roles::EDITOR);
    let file_admin = ResourceRoleGuard::new(state.clone(), FILE_ID_PARAM, roles::ADMIN);

    let api_routes = Router::new()
        .route("/policy", get(handlers::get_policy))
        // Project endpoints (project id in the route)
        .route(
            "/projects/:project_id",
            get(handlers::get_project).route_layer(axum_middleware::from_fn_with_state(
                project_viewer,
                require_project_role,
            )),
        )
        .route(
            "/projects/:project_id/api-keys",
            post(handlers::create_api_key).route_layer(axum_middleware::from_fn_with_state(
                api_key_manager,
                require_project_capability,
            )),
        )
        // File endpoints (project derived from the file)
        .route(
            "/files/:file_id",
            get(handlers::get_file).route_layer(axum_middleware::from_fn_with_state(
                file_viewer,
                require_resource_role,
            )),
        )
        .route(
            "/files/:file_id",
            put(handlers::update_file).route_layer(axum_middleware::from_fn_with_state(
                file_editor,
                require_resource_role,
            )),
        )
        .route(
            "/files/:file_id",
            delete(handlers::delete_file).route_layer(axum_middleware::from_fn_with_state(
                file_admin,
                require_resource_role,
            )),
        )
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::authenticate,
        ));

    Router::new()
        // Health (no auth required)
        .route("/health", get(handlers::health_check))
        .nest("/api/v1", api_routes)
        .with_state(state)
        // Executed bottom to top
        .layer(axum_middleware::from_fn(middleware::logging_middleware))
        .layer(axum_middleware::from_fn(middleware::request_id_middleware))
        .layer(middleware::cors_layer())
        .layer(TraceLayer::new_for_http())
}
