//! Authorization engine
//!
//! The [`Checker`] is compiled once from a validated [`PolicyDefinition`] and
//! is read-only afterwards. Share it behind an `Arc`; every decision is a pure
//! function of the compiled state and its arguments.
//!
//! # Decision paths
//!
//! ```text
//! AuthSubject::User   → role → CapabilityIndex(role, resource, action)
//! AuthSubject::ApiKey → machine scope(resource) → action→permission → held?
//! ```

pub mod matrix;

pub use matrix::CapabilityIndex;

use crate::error::{AuthzError, ConfigError, Result};
use crate::policy::PolicyDefinition;
use crate::subject::AuthSubject;
use crate::types::{Action, Permission, PermissionSet, Resource, Role};
use crate::validator;
use std::collections::{HashMap, HashSet};
use tracing::{debug, info};

/// Compiled, immutable authorization engine
#[derive(Debug, Clone)]
pub struct Checker {
    /// Role → privilege level
    role_levels: HashMap<Role, u32>,

    /// Role → resource → action
    capabilities: CapabilityIndex,

    /// Action → the permission a machine credential needs for it
    action_to_permission: HashMap<Action, Permission>,

    /// Permission → the action it grants
    permission_to_action: HashMap<Permission, Action>,

    /// Declared permissions
    permissions: HashSet<Permission>,

    /// Resources reachable by machine credentials; `None` when disabled
    machine_scope: Option<HashSet<Resource>>,

    /// Definition this checker was compiled from
    policy: PolicyDefinition,
}

impl Checker {
    /// Validate and compile a policy
    ///
    /// An error here means the policy is broken; callers must not start
    /// serving requests.
    pub fn new(policy: PolicyDefinition) -> std::result::Result<Self, ConfigError> {
        validator::validate(&policy)?;

        let role_levels = policy
            .roles
            .iter()
            .map(|r| (r.name.clone(), r.level))
            .collect();

        let capabilities = CapabilityIndex::compile(&policy.capabilities);

        let action_to_permission = policy
            .permission_mapping
            .iter()
            .map(|m| (m.action.clone(), m.permission.clone()))
            .collect();

        let permission_to_action = policy
            .permission_mapping
            .iter()
            .map(|m| (m.permission.clone(), m.action.clone()))
            .collect();

        let permissions = policy.permissions.iter().cloned().collect();

        let machine_scope = policy
            .machine_resource_scope
            .as_ref()
            .map(|scope| scope.iter().cloned().collect());

        let checker = Self {
            role_levels,
            capabilities,
            action_to_permission,
            permission_to_action,
            permissions,
            machine_scope,
            policy,
        };

        info!(
            roles = checker.role_levels.len(),
            permissions = checker.permissions.len(),
            grants = checker.capabilities.grant_count(),
            machine_credentials = checker.machine_scope.is_some(),
            "Compiled authorization policy"
        );

        Ok(checker)
    }

    /// Decide whether `subject` may perform `action` on `resource`
    pub fn authorize(
        &self,
        subject: Option<&AuthSubject>,
        resource: &str,
        action: &str,
    ) -> Result<()> {
        let subject = subject.ok_or(AuthzError::NilSubject)?;

        let decision = match subject {
            AuthSubject::User { role } => self.authorize_user(role, resource, action),
            AuthSubject::ApiKey { permissions } => {
                self.authorize_api_key(permissions, resource, action)
            }
        };

        debug!(
            auth_type = %subject.auth_type(),
            resource,
            action,
            allowed = decision.is_ok(),
            "Authorization decision"
        );

        decision
    }

    fn authorize_user(&self, role: &Role, resource: &str, action: &str) -> Result<()> {
        if role.is_empty() {
            return Err(AuthzError::InvalidRole("empty role".to_string()));
        }

        if self.capabilities.allows(role.as_str(), resource, action) {
            Ok(())
        } else {
            Err(AuthzError::Denied(format!(
                "role `{role}` may not {action} {resource}"
            )))
        }
    }

    fn authorize_api_key(
        &self,
        permissions: &PermissionSet,
        resource: &str,
        action: &str,
    ) -> Result<()> {
        let Some(scope) = &self.machine_scope else {
            return Err(AuthzError::Denied(
                "API keys are not enabled by this policy".to_string(),
            ));
        };

        if !scope.contains(resource) {
            return Err(AuthzError::Denied(format!(
                "resource `{resource}` is not reachable by API keys"
            )));
        }

        let Some(required) = self.action_to_permission.get(action) else {
            return Err(AuthzError::Denied(format!(
                "action `{action}` has no API key permission"
            )));
        };

        if Self::has_permission(permissions, required.as_str()) {
            Ok(())
        } else {
            Err(AuthzError::Denied(format!(
                "API key lacks `{required}` permission"
            )))
        }
    }

    /// Require an interactive subject holding at least `min_role`
    pub fn require_role(&self, subject: Option<&AuthSubject>, min_role: &str) -> Result<()> {
        let subject = subject.ok_or(AuthzError::NilSubject)?;

        let role = match subject {
            AuthSubject::User { role } => role,
            AuthSubject::ApiKey { .. } => {
                return Err(AuthzError::Denied(
                    "role requirements do not apply to API keys".to_string(),
                ))
            }
        };

        let Some(actual) = self.role_level(role.as_str()) else {
            return Err(AuthzError::InvalidRole(format!("unknown role `{role}`")));
        };
        let Some(required) = self.role_level(min_role) else {
            return Err(AuthzError::InvalidRole(format!("unknown role `{min_role}`")));
        };

        if actual >= required {
            Ok(())
        } else {
            Err(AuthzError::Denied(format!(
                "role `{role}` is below `{min_role}`"
            )))
        }
    }

    /// Plain membership test over a permission set
    pub fn has_permission(permissions: &PermissionSet, required: &str) -> bool {
        permissions.contains(required)
    }

    /// Check a permission set before it is granted to a new API key
    pub fn validate_permissions(&self, permissions: &PermissionSet) -> Result<()> {
        if permissions.is_empty() {
            return Err(AuthzError::InvalidPermission(
                "at least one permission is required".to_string(),
            ));
        }

        match permissions.iter().find(|p| !self.permissions.contains(*p)) {
            Some(undeclared) => Err(AuthzError::InvalidPermission(format!(
                "undeclared permission `{undeclared}`"
            ))),
            None => Ok(()),
        }
    }

    /// Raw capability lookup for a role
    pub fn can(&self, role: &str, resource: &str, action: &str) -> bool {
        self.capabilities.allows(role, resource, action)
    }

    /// Actions `role` may perform on `resource`, sorted by name
    pub fn allowed_actions(&self, role: &str, resource: &str) -> Vec<Action> {
        self.capabilities.actions_for(role, resource)
    }

    /// Privilege level of a declared role
    pub fn role_level(&self, role: &str) -> Option<u32> {
        self.role_levels.get(role).copied()
    }

    pub fn is_valid_role(&self, role: &str) -> bool {
        self.role_levels.contains_key(role)
    }

    pub fn is_valid_permission(&self, permission: &str) -> bool {
        self.permissions.contains(permission)
    }

    /// Permission a machine credential needs for `action`
    pub fn permission_for_action(&self, action: &str) -> Option<&Permission> {
        self.action_to_permission.get(action)
    }

    /// Action granted by `permission`
    pub fn action_for_permission(&self, permission: &str) -> Option<&Action> {
        self.permission_to_action.get(permission)
    }

    /// Declared roles ordered by ascending level
    pub fn roles(&self) -> Vec<(&Role, u32)> {
        let mut roles: Vec<(&Role, u32)> = self.role_levels.iter().map(|(r, l)| (r, *l)).collect();
        roles.sort_by_key(|(_, level)| *level);
        roles
    }

    /// Whether machine credentials are enabled at all
    pub fn machine_credentials_enabled(&self) -> bool {
        self.machine_scope.is_some()
    }

    /// The validated definition this checker was compiled from
    pub fn policy(&self) -> &PolicyDefinition {
        &self.policy
    }
}
