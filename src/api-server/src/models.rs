use crate::repository::ResourceRecord;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shelf_authz::{Checker, PermissionSet, Resource, Role};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
}

/// One role of the active policy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoleSummary {
    pub name: Role,
    pub level: u32,
}

/// Read-only view of the active policy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicySummary {
    /// Roles ordered by level
    pub roles: Vec<RoleSummary>,

    /// Declared permissions
    pub permissions: Vec<String>,

    /// Resource kinds API keys may touch; empty when API keys are disabled
    pub machine_resource_scope: Vec<Resource>,

    /// Action lists per role and resource
    pub capabilities: BTreeMap<Role, BTreeMap<Resource, Vec<String>>>,
}

impl PolicySummary {
    pub fn from_checker(checker: &Checker) -> Self {
        let policy = checker.policy();

        let roles = checker
            .roles()
            .into_iter()
            .map(|(name, level)| RoleSummary {
                name: name.clone(),
                level,
            })
            .collect();

        let capabilities = policy
            .capabilities
            .iter()
            .map(|(role, resources)| {
                let actions = resources
                    .iter()
                    .map(|(resource, actions)| {
                        let mut names: Vec<String> =
                            actions.iter().map(|a| a.as_str().to_string()).collect();
                        names.sort();
                        names.dedup();
                        (resource.clone(), names)
                    })
                    .collect();
                (role.clone(), actions)
            })
            .collect();

        Self {
            roles,
            permissions: policy.permissions.iter().map(|p| p.as_str().to_string()).collect(),
            machine_resource_scope: policy.machine_resource_scope.clone().unwrap_or_default(),
            capabilities,
        }
    }
}

/// Project the caller was authorized for
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectResponse {
    pub project_id: Uuid,
    pub access: String,
}

/// API key creation request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateApiKeyRequest {
    /// Permissions to grant; must be non-empty and declared
    pub permissions: PermissionSet,

    /// Human-readable label
    #[serde(default)]
    pub name: Option<String>,
}

/// Newly minted API key
///
/// The token is only ever returned here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiKeyResponse {
    pub key_id: Uuid,
    pub project_id: Uuid,
    pub name: Option<String>,
    pub permissions: PermissionSet,
    pub token: String,
    pub created_at: DateTime<Utc>,
}

/// Rename request for a file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateFileRequest {
    pub name: String,
}

/// Stored file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileResponse {
    pub id: Uuid,
    pub project_id: Uuid,
    pub kind: Resource,
    pub name: String,
}

impl From<ResourceRecord> for FileResponse {
    fn from(record: ResourceRecord) -> Self {
        Self {
            id: record.id,
            project_id: record.project_id,
            kind: record.kind,
            name: record.name,
        }
    }
}
