//! Declarative policy definition
//!
//! A [`PolicyDefinition`] is the single source of truth for what is allowed.
//! It is built once at startup, either from [`PolicyDefinition::builtin`] or
//! from a JSON document, and handed to [`crate::Checker::new`].

use crate::error::ConfigError;
use crate::types::{actions, permissions, resources, roles, Action, Permission, Resource, Role};
use serde::de::{Deserializer, MapAccess, Visitor};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::marker::PhantomData;
use std::path::Path;

/// Role declaration with its privilege level
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleDefinition {
    /// Role name (e.g., "editor")
    pub name: Role,

    /// Privilege level; higher is more privileged
    pub level: u32,
}

impl RoleDefinition {
    pub fn new(name: impl Into<Role>, level: u32) -> Self {
        Self {
            name: name.into(),
            level,
        }
    }
}

/// Link between one permission and one action
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionMapping {
    pub permission: Permission,
    pub action: Action,
}

impl PermissionMapping {
    pub fn new(permission: impl Into<Permission>, action: impl Into<Action>) -> Self {
        Self {
            permission: permission.into(),
            action: action.into(),
        }
    }
}

/// Role → resource → allowed actions
pub type CapabilityMatrix = BTreeMap<Role, BTreeMap<Resource, Vec<Action>>>;

/// Complete declarative policy
///
/// Deserialization rejects a role listed twice under `capabilities`, or a
/// resource listed twice under one role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawPolicy")]
pub struct PolicyDefinition {
    /// Interactive roles
    pub roles: Vec<RoleDefinition>,

    /// Permissions grantable to machine credentials
    pub permissions: Vec<Permission>,

    /// Protected resource categories
    pub resources: Vec<Resource>,

    /// Operations on resources
    pub actions: Vec<Action>,

    /// What each role may do
    pub capabilities: CapabilityMatrix,

    /// Permission ↔ action pairs
    pub permission_mapping: Vec<PermissionMapping>,

    /// Resources reachable by machine credentials; `None` disables them
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub machine_resource_scope: Option<Vec<Resource>>,
}

impl PolicyDefinition {
    /// The built-in Shelf policy
    pub fn builtin() -> Self {
        let acts = |list: &[&str]| -> Vec<Action> { list.iter().map(|a| Action::from(*a)).collect() };

        let mut capabilities = CapabilityMatrix::new();

        let viewer = capabilities.entry(Role::from(roles::VIEWER)).or_default();
        viewer.insert(resources::PROJECT.into(), acts(&[actions::READ]));
        viewer.insert(resources::FILE.into(), acts(&[actions::READ]));
        viewer.insert(resources::FOLDER.into(), acts(&[actions::READ]));
        viewer.insert(resources::MEMBER.into(), acts(&[actions::READ]));

        let editor = capabilities.entry(Role::from(roles::EDITOR)).or_default();
        editor.insert(resources::PROJECT.into(), acts(&[actions::READ]));
        editor.insert(resources::FILE.into(), acts(&[actions::READ, actions::WRITE]));
        editor.insert(resources::FOLDER.into(), acts(&[actions::READ, actions::WRITE]));
        editor.insert(resources::MEMBER.into(), acts(&[actions::READ]));

        let all = [actions::READ, actions::WRITE, actions::DELETE, actions::MANAGE];
        let admin = capabilities.entry(Role::from(roles::ADMIN)).or_default();
        admin.insert(resources::PROJECT.into(), acts(&[actions::READ, actions::WRITE]));
        admin.insert(
            resources::FILE.into(),
            acts(&[actions::READ, actions::WRITE, actions::DELETE]),
        );
        admin.insert(
            resources::FOLDER.into(),
            acts(&[actions::READ, actions::WRITE, actions::DELETE]),
        );
        admin.insert(resources::API_KEY.into(), acts(&all));
        admin.insert(resources::MEMBER.into(), acts(&all));

        Self {
            roles: vec![
                RoleDefinition::new(roles::VIEWER, 1),
                RoleDefinition::new(roles::EDITOR, 2),
                RoleDefinition::new(roles::ADMIN, 3),
            ],
            permissions: vec![
                permissions::READ.into(),
                permissions::WRITE.into(),
                permissions::DELETE.into(),
            ],
            resources: vec![
                resources::PROJECT.into(),
                resources::FILE.into(),
                resources::FOLDER.into(),
                resources::API_KEY.into(),
                resources::MEMBER.into(),
            ],
            actions: all.iter().map(|a| Action::from(*a)).collect(),
            capabilities,
            permission_mapping: vec![
                PermissionMapping::new(permissions::READ, actions::READ),
                PermissionMapping::new(permissions::WRITE, actions::WRITE),
                PermissionMapping::new(permissions::DELETE, actions::DELETE),
            ],
            machine_resource_scope: Some(vec![resources::FILE.into(), resources::FOLDER.into()]),
        }
    }

    /// Parse a policy from a JSON document
    ///
    /// Parsing does not validate; pass the result to [`crate::Checker::new`].
    pub fn from_json_str(source: &str) -> Result<Self, ConfigError> {
        let raw: RawPolicy = serde_json::from_str(source)?;
        Self::try_from(raw)
    }

    /// Load a policy from a JSON file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json_str(&contents)
    }
}

/// Map entries in document order, duplicates kept
struct MapEntries<K, V>(Vec<(K, V)>);

impl<'de, K, V> Deserialize<'de> for MapEntries<K, V>
where
    K: Deserialize<'de>,
    V: Deserialize<'de>,
{
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct EntriesVisitor<K, V>(PhantomData<(K, V)>);

        impl<'de, K, V> Visitor<'de> for EntriesVisitor<K, V>
        where
            K: Deserialize<'de>,
            V: Deserialize<'de>,
        {
            type Value = MapEntries<K, V>;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
                let mut entries = Vec::with_capacity(map.size_hint().unwrap_or(0));
                while let Some(entry) = map.next_entry()? {
                    entries.push(entry);
                }
                Ok(MapEntries(entries))
            }
        }

        deserializer.deserialize_map(EntriesVisitor(PhantomData))
    }
}

/// Wire shape of [`PolicyDefinition`] before duplicate keys are checked
#[derive(Deserialize)]
struct RawPolicy {
    roles: Vec<RoleDefinition>,
    permissions: Vec<Permission>,
    resources: Vec<Resource>,
    actions: Vec<Action>,
    capabilities: MapEntries<Role, MapEntries<Resource, Vec<Action>>>,
    permission_mapping: Vec<PermissionMapping>,
    #[serde(default)]
    machine_resource_scope: Option<Vec<Resource>>,
}

impl TryFrom<RawPolicy> for PolicyDefinition {
    type Error = ConfigError;

    fn try_from(raw: RawPolicy) -> Result<Self, Self::Error> {
        let mut capabilities = CapabilityMatrix::new();

        for (role, MapEntries(grants)) in raw.capabilities.0 {
            if capabilities.contains_key(&role) {
                return Err(ConfigError::DuplicateName {
                    kind: "capability role",
                    name: role.to_string(),
                });
            }

            let mut by_resource = BTreeMap::new();
            for (resource, actions) in grants {
                if by_resource.contains_key(&resource) {
                    return Err(ConfigError::DuplicateName {
                        kind: "capability resource",
                        name: format!("{role}/{resource}"),
                    });
                }
                by_resource.insert(resource, actions);
            }

            capabilities.insert(role, by_resource);
        }

        Ok(Self {
            roles: raw.roles,
            permissions: raw.permissions,
            resources: raw.resources,
            actions: raw.actions,
            capabilities,
            permission_mapping: raw.permission_mapping,
            machine_resource_scope: raw.machine_resource_scope,
        })
    }
}
