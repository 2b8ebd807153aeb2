//! HTTP handlers
//!
//! Handlers behind an authorization guard read the resolved project or
//! resource from request extensions; they never re-run the policy.

use crate::{
    context::{ApiKeyClaims, Identity, ResolvedProject, ResolvedResource},
    error::{ApiError, Result},
    models::{
        ApiKeyResponse, CreateApiKeyRequest, FileResponse, HealthResponse, PolicySummary,
        ProjectResponse, UpdateFileRequest,
    },
    state::AppState,
};
use axum::{extract::State, http::StatusCode, Extension, Json};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

/// Prefix of minted API key tokens
pub const API_KEY_TOKEN_PREFIX: &str = "shelf_";

/// Health check endpoint
pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: state.version.clone(),
        uptime_seconds: state.uptime_seconds(),
    })
}

/// Read-only view of the active policy
pub async fn get_policy(State(state): State<Arc<AppState>>) -> Json<PolicySummary> {
    Json(PolicySummary::from_checker(&state.checker))
}

/// Project lookup (viewer and above)
pub async fn get_project(
    Extension(ResolvedProject(project_id)): Extension<ResolvedProject>,
    Extension(identity): Extension<Identity>,
) -> Json<ProjectResponse> {
    Json(ProjectResponse {
        project_id,
        access: identity.auth_type().to_string(),
    })
}

/// Mint an API key bound to the project
pub async fn create_api_key(
    State(state): State<Arc<AppState>>,
    Extension(ResolvedProject(project_id)): Extension<ResolvedProject>,
    Json(req): Json<CreateApiKeyRequest>,
) -> Result<(StatusCode, Json<ApiKeyResponse>)> {
    state
        .checker
        .validate_permissions(&req.permissions)
        .map_err(|err| {
            warn!(
                project = %project_id,
                code = %err.code(),
                reason = %err,
                "Rejected API key permissions"
            );
            ApiError::BadRequest("invalid permissions".to_string())
        })?;

    let key_id = Uuid::new_v4();
    let token = format!("{API_KEY_TOKEN_PREFIX}{}", Uuid::new_v4().simple());
    let claims = ApiKeyClaims {
        key_id,
        project_id,
        permissions: req.permissions.clone(),
    };

    state
        .credentials
        .insert(token.clone(), Identity::ApiKey(claims))
        .await?;

    info!(
        key_id = %key_id,
        project = %project_id,
        permissions = ?req.permissions,
        "API key created"
    );

    Ok((
        StatusCode::CREATED,
        Json(ApiKeyResponse {
            key_id,
            project_id,
            name: req.name,
            permissions: req.permissions,
            token,
            created_at: chrono::Utc::now(),
        }),
    ))
}

/// Read a file (viewer and above)
pub async fn get_file(
    Extension(ResolvedResource(record)): Extension<ResolvedResource>,
) -> Json<FileResponse> {
    Json(record.into())
}

/// Rename a file (editor and above)
pub async fn update_file(
    State(state): State<Arc<AppState>>,
    Extension(ResolvedResource(mut record)): Extension<ResolvedResource>,
    Json(req): Json<UpdateFileRequest>,
) -> Result<Json<FileResponse>> {
    let name = req.name.trim();
    if name.is_empty() {
        return Err(ApiError::BadRequest("name must not be empty".to_string()));
    }

    record.name = name.to_string();
    if !state.resources.update_resource(record.clone()).await? {
        return Err(ApiError::ResourceNotFound);
    }

    info!(resource = %record.id, project = %record.project_id, "File renamed");
    Ok(Json(record.into()))
}

/// Delete a file (admin)
pub async fn delete_file(
    State(state): State<Arc<AppState>>,
    Extension(ResolvedResource(record)): Extension<ResolvedResource>,
) -> Result<StatusCode> {
    if !state.resources.delete_resource(record.id).await? {
        return Err(ApiError::ResourceNotFound);
    }

    info!(resource = %record.id, project = %record.project_id, "File deleted");
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::{InMemoryStore, ResourceRecord};
    use shelf_authz::{Checker, PolicyDefinition, Resource};

    fn state_with(store: Arc<InMemoryStore>) -> Arc<AppState> {
        let checker = Arc::new(Checker::new(PolicyDefinition::builtin()).unwrap());
        Arc::new(AppState::in_memory(checker, store))
    }

    fn record() -> ResourceRecord {
        ResourceRecord {
            id: Uuid::new_v4(),
            project_id: Uuid::new_v4(),
            kind: Resource::new("file"),
            name: "draft.md".to_string(),
        }
    }

    #[tokio::test]
    async fn test_update_file_renames() {
        let store = Arc::new(InMemoryStore::new());
        let record = record();
        store.add_resource(record.clone());

        let Json(updated) = update_file(
            State(state_with(store.clone())),
            Extension(ResolvedResource(record.clone())),
            Json(UpdateFileRequest {
                name: "  final.md ".to_string(),
            }),
        )
        .await
        .unwrap();

        assert_eq!(updated.name, "final.md");
        assert_eq!(store.resource_count(), 1);
    }

    #[tokio::test]
    async fn test_update_file_does_not_resurrect_deleted_file() {
        let store = Arc::new(InMemoryStore::new());
        let record = record();

        // Resolved by the guard, then deleted before the handler saves
        let err = update_file(
            State(state_with(store.clone())),
            Extension(ResolvedResource(record)),
            Json(UpdateFileRequest {
                name: "final.md".to_string(),
            }),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, ApiError::ResourceNotFound));
        assert_eq!(store.resource_count(), 0);
    }

    #[tokio::test]
    async fn test_invalid_permissions_get_generic_message() {
        let store = Arc::new(InMemoryStore::new());

        let err = create_api_key(
            State(state_with(store.clone())),
            Extension(ResolvedProject(Uuid::new_v4())),
            Json(CreateApiKeyRequest {
                permissions: ["read", "admin"].into_iter().map(Into::into).collect(),
                name: None,
            }),
        )
        .await
        .unwrap_err();

        assert_eq!(err.public_message(), "invalid permissions");
        assert_eq!(store.credential_count(), 0);
    }
}
