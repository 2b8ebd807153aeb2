//! Authorization guards
//!
//! Route-level middleware that runs the policy before any handler:
//!
//! - [`require_project_role`]: the project id is in the route; the caller
//!   needs at least a minimum role in that project.
//! - [`require_resource_role`]: only a resource id is in the route; the owning
//!   project is derived from the resource record.
//! - [`require_project_capability`]: the project id is in the route; the
//!   caller needs a (resource, action) capability in that project.
//!
//! # Security properties
//!
//! - An API key bound to another project is rejected before any data-layer
//!   call is made (project routes).
//! - A resource owned by another project answers exactly like a resource
//!   that does not exist (resource routes).
//! - Denial reasons are logged; responses only say "forbidden"/"not found".
//! - A slow or failing data layer denies the request.

use crate::context::{ApiKeyClaims, Identity, ResolvedProject, ResolvedResource};
use crate::error::{ApiError, Result};
use crate::repository::{RepositoryResult, ResourceRecord};
use crate::state::AppState;
use axum::{
    extract::{Path, Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use shelf_authz::types::{permissions, roles};
use shelf_authz::{Action, AuthzError, Checker, Resource, Role};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};
use uuid::Uuid;

/// Route parameter carrying the project id
pub const PROJECT_ID_PARAM: &str = "project_id";

/// Permission an API key needs to pass a minimum-role requirement.
///
/// This table is fixed and does not come from the policy's permission
/// mapping.
const MIN_ROLE_PERMISSIONS: [(&str, &str); 3] = [
    (roles::VIEWER, permissions::READ),
    (roles::EDITOR, permissions::WRITE),
    (roles::ADMIN, permissions::DELETE),
];

/// Permission that stands in for `min_role` when the caller is an API key
pub fn permission_for_min_role(min_role: &str) -> Option<&'static str> {
    MIN_ROLE_PERMISSIONS
        .iter()
        .find(|(role, _)| *role == min_role)
        .map(|(_, permission)| *permission)
}

// =============================================================================
// Guards
// =============================================================================

/// Minimum project role for routes carrying `:project_id`
#[derive(Clone)]
pub struct ProjectRoleGuard {
    state: Arc<AppState>,
    min_role: Role,
}

impl ProjectRoleGuard {
    pub fn new(state: Arc<AppState>, min_role: impl Into<Role>) -> Self {
        Self {
            state,
            min_role: min_role.into(),
        }
    }
}

/// Minimum project role for routes carrying only a resource id
#[derive(Clone)]
pub struct ResourceRoleGuard {
    state: Arc<AppState>,
    min_role: Role,
    param: &'static str,
}

impl ResourceRoleGuard {
    /// `param` is the route parameter holding the resource id
    pub fn new(state: Arc<AppState>, param: &'static str, min_role: impl Into<Role>) -> Self {
        Self {
            state,
            min_role: min_role.into(),
            param,
        }
    }
}

/// Capability requirement for routes carrying `:project_id`
#[derive(Clone)]
pub struct ProjectCapabilityGuard {
    state: Arc<AppState>,
    resource: Resource,
    action: Action,
}

impl ProjectCapabilityGuard {
    pub fn new(state: Arc<AppState>, resource: impl Into<Resource>, action: impl Into<Action>) -> Self {
        Self {
            state,
            resource: resource.into(),
            action: action.into(),
        }
    }
}

// =============================================================================
// Middleware
// =============================================================================

/// Enforce a [`ProjectRoleGuard`]
pub async fn require_project_role(
    State(guard): State<ProjectRoleGuard>,
    Path(params): Path<HashMap<String, String>>,
    mut request: Request,
    next: Next,
) -> Response {
    let identity = request.extensions().get::<Identity>().cloned();
    let raw_project_id = params.get(PROJECT_ID_PARAM).map(String::as_str).unwrap_or_default();

    let decision = authorize_project(
        &guard.state,
        identity.as_ref(),
        raw_project_id,
        guard.min_role.as_str(),
    )
    .await;

    match decision {
        Ok(project_id) => {
            request.extensions_mut().insert(ResolvedProject(project_id));
            next.run(request).await
        }
        Err(err) => err.into_response(),
    }
}

/// Enforce a [`ResourceRoleGuard`]
pub async fn require_resource_role(
    State(guard): State<ResourceRoleGuard>,
    Path(params): Path<HashMap<String, String>>,
    mut request: Request,
    next: Next,
) -> Response {
    let identity = request.extensions().get::<Identity>().cloned();
    let raw_resource_id = params.get(guard.param).map(String::as_str).unwrap_or_default();

    let decision = authorize_resource(
        &guard.state,
        identity.as_ref(),
        raw_resource_id,
        guard.min_role.as_str(),
    )
    .await;

    match decision {
        Ok(record) => {
            request.extensions_mut().insert(ResolvedProject(record.project_id));
            request.extensions_mut().insert(ResolvedResource(record));
            next.run(request).await
        }
        Err(err) => err.into_response(),
    }
}

/// Enforce a [`ProjectCapabilityGuard`]
pub async fn require_project_capability(
    State(guard): State<ProjectCapabilityGuard>,
    Path(params): Path<HashMap<String, String>>,
    mut request: Request,
    next: Next,
) -> Response {
    let identity = request.extensions().get::<Identity>().cloned();
    let raw_project_id = params.get(PROJECT_ID_PARAM).map(String::as_str).unwrap_or_default();

    let decision = authorize_project_capability(
        &guard.state,
        identity.as_ref(),
        raw_project_id,
        guard.resource.as_str(),
        guard.action.as_str(),
    )
    .await;

    match decision {
        Ok(project_id) => {
            request.extensions_mut().insert(ResolvedProject(project_id));
            next.run(request).await
        }
        Err(err) => err.into_response(),
    }
}

// =============================================================================
// Decision flows
// =============================================================================

/// Project-scoped minimum-role check
///
/// Returns the parsed project id when the caller is allowed.
pub async fn authorize_project(
    state: &AppState,
    identity: Option<&Identity>,
    raw_project_id: &str,
    min_role: &str,
) -> Result<Uuid> {
    let identity = identity.ok_or_else(|| ApiError::from(AuthzError::NilSubject))?;
    let project_id = parse_id(raw_project_id, "invalid project id")?;

    require_project_binding(identity, project_id)?;

    match identity {
        Identity::ApiKey(claims) => {
            require_min_role_permission(claims, min_role)?;
        }
        Identity::User { user_id } => {
            let role = resolve_role(state, project_id, *user_id)
                .await?
                .ok_or(ApiError::ProjectNotFound)?;
            let subject = Identity::user_subject(role);
            state
                .checker
                .require_role(Some(&subject), min_role)
                .map_err(|err| deny(identity, err))?;
        }
    }

    debug!(
        principal = %identity.log_id(),
        project = %project_id,
        min_role,
        "Project access granted"
    );
    Ok(project_id)
}

/// Resource-scoped minimum-role check
///
/// The owning project is derived from the resource. A resource in another
/// project is reported as not found, exactly like a missing one.
pub async fn authorize_resource(
    state: &AppState,
    identity: Option<&Identity>,
    raw_resource_id: &str,
    min_role: &str,
) -> Result<ResourceRecord> {
    let identity = identity.ok_or_else(|| ApiError::from(AuthzError::NilSubject))?;
    let resource_id = parse_id(raw_resource_id, "invalid resource id")?;

    let record = with_timeout(state.lookup_timeout, state.resources.find_resource(resource_id))
        .await?
        .ok_or(ApiError::ResourceNotFound)?;

    if let Some(bound) = identity.bound_project_id() {
        if bound != record.project_id {
            warn!(
                principal = %identity.log_id(),
                bound_project = %bound,
                resource = %resource_id,
                "API key requested a resource of another project"
            );
            return Err(ApiError::ResourceNotFound);
        }
    }

    match identity {
        Identity::ApiKey(claims) => {
            require_min_role_permission(claims, min_role)?;
        }
        Identity::User { user_id } => {
            let role = resolve_role(state, record.project_id, *user_id)
                .await?
                .ok_or(ApiError::ResourceNotFound)?;
            let subject = Identity::user_subject(role);
            state
                .checker
                .require_role(Some(&subject), min_role)
                .map_err(|err| deny(identity, err))?;
        }
    }

    debug!(
        principal = %identity.log_id(),
        resource = %resource_id,
        min_role,
        "Resource access granted"
    );
    Ok(record)
}

/// Project-scoped capability check through the policy's own decision paths
pub async fn authorize_project_capability(
    state: &AppState,
    identity: Option<&Identity>,
    raw_project_id: &str,
    resource: &str,
    action: &str,
) -> Result<Uuid> {
    let identity = identity.ok_or_else(|| ApiError::from(AuthzError::NilSubject))?;
    let project_id = parse_id(raw_project_id, "invalid project id")?;

    require_project_binding(identity, project_id)?;

    let subject = match identity {
        Identity::ApiKey(claims) => Identity::api_key_subject(claims),
        Identity::User { user_id } => {
            let role = resolve_role(state, project_id, *user_id)
                .await?
                .ok_or(ApiError::ProjectNotFound)?;
            Identity::user_subject(role)
        }
    };

    state
        .checker
        .authorize(Some(&subject), resource, action)
        .map_err(|err| deny(identity, err))?;

    Ok(project_id)
}

// =============================================================================
// Helpers
// =============================================================================

/// Reject a project-bound credential used on another project
///
/// Runs before any data-layer call.
fn require_project_binding(identity: &Identity, project_id: Uuid) -> Result<()> {
    match identity.bound_project_id() {
        Some(bound) if bound != project_id => {
            warn!(
                principal = %identity.log_id(),
                bound_project = %bound,
                requested_project = %project_id,
                "API key used outside its project"
            );
            Err(ApiError::Forbidden("project scope mismatch".to_string()))
        }
        _ => Ok(()),
    }
}

fn parse_id(raw: &str, message: &str) -> Result<Uuid> {
    Uuid::parse_str(raw).map_err(|_| ApiError::BadRequest(message.to_string()))
}

fn require_min_role_permission(claims: &ApiKeyClaims, min_role: &str) -> Result<()> {
    let identity_for_log = claims.key_id;

    let Some(required) = permission_for_min_role(min_role) else {
        warn!(key_id = %identity_for_log, min_role, "No API key permission stands in for role");
        return Err(ApiError::Forbidden(format!(
            "role `{min_role}` has no API key equivalent"
        )));
    };

    if Checker::has_permission(&claims.permissions, required) {
        Ok(())
    } else {
        warn!(key_id = %identity_for_log, required, "API key lacks permission");
        Err(ApiError::Forbidden(format!("missing `{required}` permission")))
    }
}

async fn resolve_role(state: &AppState, project_id: Uuid, user_id: Uuid) -> Result<Option<Role>> {
    with_timeout(
        state.lookup_timeout,
        state.memberships.membership_role(project_id, user_id),
    )
    .await
}

/// Bound a data-layer call; timeouts and failures become errors, never allows
async fn with_timeout<T>(
    timeout: Duration,
    lookup: impl Future<Output = RepositoryResult<T>>,
) -> Result<T> {
    match tokio::time::timeout(timeout, lookup).await {
        Ok(result) => result.map_err(ApiError::from),
        Err(_) => {
            warn!(timeout_ms = timeout.as_millis() as u64, "Data layer lookup timed out");
            Err(ApiError::Timeout)
        }
    }
}

fn deny(identity: &Identity, err: AuthzError) -> ApiError {
    warn!(
        principal = %identity.log_id(),
        auth_type = %identity.auth_type(),
        code = %err.code(),
        reason = %err,
        "Authorization denied"
    );
    ApiError::from(err)
}
