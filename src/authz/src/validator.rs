//! Policy validation
//!
//! Checks the referential integrity of a [`PolicyDefinition`] before it is
//! compiled. Validation is all-or-nothing: the first violation is returned and
//! there is no partially valid policy.

use crate::error::ConfigError;
use crate::policy::PolicyDefinition;
use std::collections::{HashMap, HashSet};

/// Validate a policy definition
///
/// Checks run in a fixed order so the reported error is deterministic:
/// required sections, role names, role levels, permission/resource/action
/// names, capability references, permission mapping, machine resource scope.
pub fn validate(policy: &PolicyDefinition) -> Result<(), ConfigError> {
    check_required_sections(policy)?;
    check_roles(policy)?;

    let permissions = unique_names("permission", policy.permissions.iter().map(|p| p.as_str()))?;
    let resources = unique_names("resource", policy.resources.iter().map(|r| r.as_str()))?;
    let actions = unique_names("action", policy.actions.iter().map(|a| a.as_str()))?;

    check_capabilities(policy, &resources, &actions)?;
    check_permission_mapping(policy, &permissions, &actions)?;
    check_machine_scope(policy, &resources)?;

    Ok(())
}

fn check_required_sections(policy: &PolicyDefinition) -> Result<(), ConfigError> {
    let sections = [
        ("roles", policy.roles.is_empty()),
        ("permissions", policy.permissions.is_empty()),
        ("resources", policy.resources.is_empty()),
        ("actions", policy.actions.is_empty()),
        ("capabilities", policy.capabilities.is_empty()),
        ("permission_mapping", policy.permission_mapping.is_empty()),
        (
            "machine_resource_scope",
            policy
                .machine_resource_scope
                .as_ref()
                .is_some_and(|scope| scope.is_empty()),
        ),
    ];

    for (name, empty) in sections {
        if empty {
            return Err(ConfigError::EmptySection(name));
        }
    }
    Ok(())
}

fn check_roles(policy: &PolicyDefinition) -> Result<(), ConfigError> {
    let mut names = HashSet::new();
    for role in &policy.roles {
        if role.name.is_empty() {
            return Err(ConfigError::EmptyName { kind: "role" });
        }
        if !names.insert(role.name.as_str()) {
            return Err(ConfigError::DuplicateName {
                kind: "role",
                name: role.name.to_string(),
            });
        }
    }

    let mut levels: HashMap<u32, &str> = HashMap::new();
    for role in &policy.roles {
        if let Some(first) = levels.insert(role.level, role.name.as_str()) {
            return Err(ConfigError::DuplicateRoleLevel {
                level: role.level,
                first: first.to_string(),
                second: role.name.to_string(),
            });
        }
    }

    Ok(())
}

fn unique_names<'a>(
    kind: &'static str,
    names: impl Iterator<Item = &'a str>,
) -> Result<HashSet<&'a str>, ConfigError> {
    let mut seen = HashSet::new();
    for name in names {
        if name.is_empty() {
            return Err(ConfigError::EmptyName { kind });
        }
        if !seen.insert(name) {
            return Err(ConfigError::DuplicateName {
                kind,
                name: name.to_string(),
            });
        }
    }
    Ok(seen)
}

fn check_capabilities(
    policy: &PolicyDefinition,
    resources: &HashSet<&str>,
    actions: &HashSet<&str>,
) -> Result<(), ConfigError> {
    let roles: HashSet<&str> = policy.roles.iter().map(|r| r.name.as_str()).collect();

    for (role, by_resource) in &policy.capabilities {
        if !roles.contains(role.as_str()) {
            return Err(undeclared("role", role.as_str(), "capabilities".to_string()));
        }
        for (resource, allowed) in by_resource {
            if !resources.contains(resource.as_str()) {
                return Err(undeclared(
                    "resource",
                    resource.as_str(),
                    format!("capabilities for role `{role}`"),
                ));
            }
            for action in allowed {
                if !actions.contains(action.as_str()) {
                    return Err(undeclared(
                        "action",
                        action.as_str(),
                        format!("capabilities for role `{role}` on `{resource}`"),
                    ));
                }
            }
        }
    }

    Ok(())
}

fn check_permission_mapping(
    policy: &PolicyDefinition,
    permissions: &HashSet<&str>,
    actions: &HashSet<&str>,
) -> Result<(), ConfigError> {
    let mut mapped_permissions = HashSet::new();
    let mut mapped_actions = HashSet::new();

    for mapping in &policy.permission_mapping {
        let permission = mapping.permission.as_str();
        let action = mapping.action.as_str();

        if !permissions.contains(permission) {
            return Err(undeclared("permission", permission, "permission_mapping".to_string()));
        }
        if !actions.contains(action) {
            return Err(undeclared("action", action, "permission_mapping".to_string()));
        }
        if !mapped_permissions.insert(permission) {
            return Err(ConfigError::DuplicateMapping {
                kind: "permission",
                name: permission.to_string(),
            });
        }
        if !mapped_actions.insert(action) {
            return Err(ConfigError::DuplicateMapping {
                kind: "action",
                name: action.to_string(),
            });
        }
    }

    Ok(())
}

fn check_machine_scope(
    policy: &PolicyDefinition,
    resources: &HashSet<&str>,
) -> Result<(), ConfigError> {
    let Some(scope) = &policy.machine_resource_scope else {
        return Ok(());
    };

    for resource in scope {
        if !resources.contains(resource.as_str()) {
            return Err(undeclared(
                "resource",
                resource.as_str(),
                "machine_resource_scope".to_string(),
            ));
        }
    }
    Ok(())
}

fn undeclared(kind: &'static str, name: &str, context: String) -> ConfigError {
    ConfigError::Undeclared {
        kind,
        name: name.to_string(),
        context,
    }
}
