//! Authenticated subject of a single request

use crate::error::{AuthzError, Result};
use crate::types::{Permission, PermissionSet, Role};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Trust model under which a subject is authorized
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthType {
    /// Interactive session, authorized by role
    User,
    /// Machine credential, authorized by permission set
    ApiKey,
}

impl AuthType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::ApiKey => "api_key",
        }
    }
}

impl fmt::Display for AuthType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AuthType {
    type Err = AuthzError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "user" => Ok(Self::User),
            "api_key" => Ok(Self::ApiKey),
            other => Err(AuthzError::UnknownAuthType(other.to_string())),
        }
    }
}

/// The caller being authorized
///
/// Exactly one of role or permissions exists, selected by the variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AuthSubject {
    /// Interactive identity with its resolved role
    User { role: Role },

    /// Machine credential with its granted permissions
    ApiKey { permissions: PermissionSet },
}

impl AuthSubject {
    /// Interactive subject holding `role`
    pub fn user(role: impl Into<Role>) -> Self {
        Self::User { role: role.into() }
    }

    /// Machine subject holding `permissions`
    pub fn api_key<I, P>(permissions: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<Permission>,
    {
        Self::ApiKey {
            permissions: permissions.into_iter().map(Into::into).collect(),
        }
    }

    /// Build a subject from an untyped trust-model tag
    ///
    /// Fails with `UnknownAuthType` for an unrecognised tag, and with
    /// `InvalidRole` when a user tag arrives without a role.
    pub fn from_parts(
        auth_type: &str,
        role: Option<Role>,
        permissions: PermissionSet,
    ) -> Result<Self> {
        match auth_type.parse::<AuthType>()? {
            AuthType::User => {
                let role = role.ok_or_else(|| {
                    AuthzError::InvalidRole("user subject carries no role".to_string())
                })?;
                Ok(Self::User { role })
            }
            AuthType::ApiKey => Ok(Self::ApiKey { permissions }),
        }
    }

    /// Trust model of this subject
    pub fn auth_type(&self) -> AuthType {
        match self {
            Self::User { .. } => AuthType::User,
            Self::ApiKey { .. } => AuthType::ApiKey,
        }
    }

    /// Role of an interactive subject
    pub fn role(&self) -> Option<&Role> {
        match self {
            Self::User { role } => Some(role),
            Self::ApiKey { .. } => None,
        }
    }

    /// Permissions of a machine subject
    pub fn permissions(&self) -> Option<&PermissionSet> {
        match self {
            Self::User { .. } => None,
            Self::ApiKey { permissions } => Some(permissions),
        }
    }
}
