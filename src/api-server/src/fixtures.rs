//! Startup fixtures for the in-memory store
//!
//! ```json
//! {
//!   "members": [{ "project_id": "...", "user_id": "...", "role": "editor" }],
//!   "files": [{ "id": "...", "project_id": "...", "name": "plan.md" }],
//!   "credentials": [
//!     { "token": "alice", "kind": "user", "user_id": "..." },
//!     { "token": "ci", "kind": "api_key", "project_id": "...", "permissions": ["read"] }
//!   ]
//! }
//! ```

use crate::context::{ApiKeyClaims, Identity};
use crate::repository::{InMemoryStore, ResourceRecord};
use anyhow::{bail, Context, Result};
use serde::Deserialize;
use shelf_authz::types::resources;
use shelf_authz::{AuthType, Checker, PermissionSet, Resource, Role};
use std::path::Path;
use tracing::info;
use uuid::Uuid;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Fixtures {
    #[serde(default)]
    pub members: Vec<MemberFixture>,
    #[serde(default)]
    pub files: Vec<FileFixture>,
    #[serde(default)]
    pub credentials: Vec<CredentialFixture>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MemberFixture {
    pub project_id: Uuid,
    pub user_id: Uuid,
    pub role: Role,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FileFixture {
    pub id: Uuid,
    pub project_id: Uuid,
    pub name: String,
    #[serde(default = "default_file_kind")]
    pub kind: Resource,
}

fn default_file_kind() -> Resource {
    Resource::new(resources::FILE)
}

/// A bearer token and the identity it stands for
///
/// `kind` stays a string until seeding so an unknown tag is reported as an
/// authorization error rather than a JSON shape error.
#[derive(Debug, Clone, Deserialize)]
pub struct CredentialFixture {
    pub token: String,
    pub kind: String,
    #[serde(default)]
    pub user_id: Option<Uuid>,
    #[serde(default)]
    pub key_id: Option<Uuid>,
    #[serde(default)]
    pub project_id: Option<Uuid>,
    #[serde(default)]
    pub permissions: PermissionSet,
}

impl CredentialFixture {
    fn identity(&self, checker: &Checker) -> Result<Identity> {
        let kind: AuthType = self
            .kind
            .parse()
            .with_context(|| format!("credential `{}`", self.token))?;

        match kind {
            AuthType::User => {
                let user_id = self
                    .user_id
                    .with_context(|| format!("user credential `{}` has no user_id", self.token))?;
                Ok(Identity::User { user_id })
            }
            AuthType::ApiKey => {
                let project_id = self.project_id.with_context(|| {
                    format!("API key credential `{}` has no project_id", self.token)
                })?;
                checker
                    .validate_permissions(&self.permissions)
                    .with_context(|| format!("API key credential `{}`", self.token))?;
                Ok(Identity::ApiKey(ApiKeyClaims {
                    key_id: self.key_id.unwrap_or_else(Uuid::new_v4),
                    project_id,
                    permissions: self.permissions.clone(),
                }))
            }
        }
    }
}

impl Fixtures {
    pub fn from_json_str(source: &str) -> Result<Self> {
        serde_json::from_str(source).context("Failed to parse fixtures")
    }

    pub fn load(path: &Path) -> Result<Self> {
        let source = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read fixtures from {}", path.display()))?;
        Self::from_json_str(&source)
    }

    /// Insert every fixture into `store`
    ///
    /// Roles must be declared by the active policy. Nothing is inserted when
    /// any entry is invalid.
    pub fn seed(&self, store: &InMemoryStore, checker: &Checker) -> Result<()> {
        for member in &self.members {
            if !checker.is_valid_role(member.role.as_str()) {
                bail!(
                    "member {} of project {} has undeclared role `{}`",
                    member.user_id,
                    member.project_id,
                    member.role
                );
            }
        }

        let identities = self
            .credentials
            .iter()
            .map(|credential| Ok((credential.token.clone(), credential.identity(checker)?)))
            .collect::<Result<Vec<_>>>()?;

        for member in &self.members {
            store.add_member(member.project_id, member.user_id, member.role.clone());
        }
        for file in &self.files {
            store.add_resource(ResourceRecord {
                id: file.id,
                project_id: file.project_id,
                kind: file.kind.clone(),
                name: file.name.clone(),
            });
        }
        for (token, identity) in identities {
            store.add_credential(token, identity);
        }

        info!(
            members = store.member_count(),
            files = store.resource_count(),
            credentials = store.credential_count(),
            "Seeded fixtures"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shelf_authz::{AuthzError, PolicyDefinition};
    use std::io::Write;

    fn checker() -> Checker {
        Checker::new(PolicyDefinition::builtin()).unwrap()
    }

    #[test]
    fn test_seed_fixtures() {
        let project = Uuid::new_v4();
        let user = Uuid::new_v4();
        let source = format!(
            r#"{{
                "members": [{{"project_id": "{project}", "user_id": "{user}", "role": "editor"}}],
                "files": [{{"id": "{file}", "project_id": "{project}", "name": "plan.md"}}],
                "credentials": [
                    {{"token": "alice", "kind": "user", "user_id": "{user}"}},
                    {{"token": "ci", "kind": "api_key", "project_id": "{project}", "permissions": ["read"]}}
                ]
            }}"#,
            file = Uuid::new_v4()
        );

        let store = InMemoryStore::new();
        Fixtures::from_json_str(&source).unwrap().seed(&store, &checker()).unwrap();

        assert_eq!(store.member_count(), 1);
        assert_eq!(store.resource_count(), 1);
        assert_eq!(store.credential_count(), 2);
    }

    #[test]
    fn test_unknown_credential_kind_aborts() {
        let source = r#"{"credentials": [{"token": "x", "kind": "service_account"}]}"#;
        let store = InMemoryStore::new();

        let err = Fixtures::from_json_str(source)
            .unwrap()
            .seed(&store, &checker())
            .unwrap_err();

        assert_eq!(
            err.downcast_ref::<AuthzError>(),
            Some(&AuthzError::UnknownAuthType("service_account".to_string()))
        );
        assert_eq!(store.credential_count(), 0);
    }

    #[test]
    fn test_undeclared_role_aborts_before_inserting() {
        let source = format!(
            r#"{{
                "members": [{{"project_id": "{}", "user_id": "{}", "role": "owner"}}],
                "credentials": [{{"token": "a", "kind": "user", "user_id": "{}"}}]
            }}"#,
            Uuid::new_v4(),
            Uuid::new_v4(),
            Uuid::new_v4()
        );
        let store = InMemoryStore::new();

        assert!(Fixtures::from_json_str(&source).unwrap().seed(&store, &checker()).is_err());
        assert_eq!(store.member_count(), 0);
        assert_eq!(store.credential_count(), 0);
    }

    #[test]
    fn test_api_key_with_undeclared_permission_aborts() {
        let source = format!(
            r#"{{"credentials": [{{"token": "k", "kind": "api_key", "project_id": "{}", "permissions": ["admin"]}}]}}"#,
            Uuid::new_v4()
        );
        let store = InMemoryStore::new();

        assert!(Fixtures::from_json_str(&source).unwrap().seed(&store, &checker()).is_err());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"members": []}}"#).unwrap();

        let fixtures = Fixtures::load(file.path()).unwrap();
        assert!(fixtures.members.is_empty());
        assert!(Fixtures::load(Path::new("/nonexistent/fixtures.json")).is_err());
    }
}
