//! Per-request context values
//!
//! These live in request extensions. [`Identity`] is inserted by the
//! authentication middleware; [`ResolvedProject`] and [`ResolvedResource`] are
//! inserted by the authorization guards once a request has been allowed.

use crate::repository::ResourceRecord;
use serde::Serialize;
use shelf_authz::{AuthSubject, AuthType, PermissionSet, Role};
use uuid::Uuid;

/// Claims carried by a verified API key
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApiKeyClaims {
    /// Key identifier (never the secret)
    pub key_id: Uuid,

    /// The one project this key may act on
    pub project_id: Uuid,

    /// Permissions granted when the key was minted
    pub permissions: PermissionSet,
}

/// Authenticated caller of the current request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Identity {
    /// Interactive user session
    User { user_id: Uuid },

    /// Machine credential
    ApiKey(ApiKeyClaims),
}

impl Identity {
    pub fn auth_type(&self) -> AuthType {
        match self {
            Self::User { .. } => AuthType::User,
            Self::ApiKey(_) => AuthType::ApiKey,
        }
    }

    /// Project an API key is bound to; users are not project-bound
    pub fn bound_project_id(&self) -> Option<Uuid> {
        match self {
            Self::User { .. } => None,
            Self::ApiKey(claims) => Some(claims.project_id),
        }
    }

    /// Identifier to put in log lines
    pub fn log_id(&self) -> Uuid {
        match self {
            Self::User { user_id } => *user_id,
            Self::ApiKey(claims) => claims.key_id,
        }
    }

    /// Subject for an interactive caller whose project role is known
    pub fn user_subject(role: Role) -> AuthSubject {
        AuthSubject::User { role }
    }

    /// Subject for a machine caller
    pub fn api_key_subject(claims: &ApiKeyClaims) -> AuthSubject {
        AuthSubject::ApiKey {
            permissions: claims.permissions.clone(),
        }
    }
}

/// Project id an authorization guard resolved for this request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedProject(pub Uuid);

/// Resource record a resource guard resolved for this request
#[derive(Debug, Clone)]
pub struct ResolvedResource(pub ResourceRecord);
