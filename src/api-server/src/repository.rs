//! Data-layer collaborators used by the authorization middleware
//!
//! The traits are the boundary to persistence. [`InMemoryStore`] implements
//! all of them over `DashMap`s for the demo server and tests.

use crate::context::Identity;
use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use shelf_authz::{Resource, Role};
use thiserror::Error;
use uuid::Uuid;

/// Data-layer failures
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Backing store could not answer
    #[error("Data layer unavailable: {0}")]
    Unavailable(String),
}

/// Result type for repository operations
pub type RepositoryResult<T> = std::result::Result<T, RepositoryError>;

/// A stored resource and the project that owns it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceRecord {
    pub id: Uuid,
    pub project_id: Uuid,
    pub kind: Resource,
    pub name: String,
}

/// Project membership lookup
#[async_trait]
pub trait MembershipRepository: Send + Sync {
    /// Role `user_id` holds in `project_id`, or `None` if not a member
    async fn membership_role(&self, project_id: Uuid, user_id: Uuid)
        -> RepositoryResult<Option<Role>>;
}

/// Resource lookup and storage
#[async_trait]
pub trait ResourceRepository: Send + Sync {
    /// Find a resource by id
    async fn find_resource(&self, id: Uuid) -> RepositoryResult<Option<ResourceRecord>>;

    /// Replace an existing resource; returns whether it existed
    async fn update_resource(&self, record: ResourceRecord) -> RepositoryResult<bool>;

    /// Remove a resource; returns whether it existed
    async fn delete_resource(&self, id: Uuid) -> RepositoryResult<bool>;
}

/// Bearer token → identity lookup
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Identity a token authenticates as
    async fn resolve(&self, token: &str) -> RepositoryResult<Option<Identity>>;

    /// Register a newly minted token
    async fn insert(&self, token: String, identity: Identity) -> RepositoryResult<()>;
}

/// In-memory implementation of every collaborator
#[derive(Debug, Default)]
pub struct InMemoryStore {
    memberships: DashMap<(Uuid, Uuid), Role>,
    resources: DashMap<Uuid, ResourceRecord>,
    credentials: DashMap<String, Identity>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_member(&self, project_id: Uuid, user_id: Uuid, role: impl Into<Role>) {
        self.memberships.insert((project_id, user_id), role.into());
    }

    pub fn add_resource(&self, record: ResourceRecord) {
        self.resources.insert(record.id, record);
    }

    pub fn add_credential(&self, token: impl Into<String>, identity: Identity) {
        self.credentials.insert(token.into(), identity);
    }

    pub fn member_count(&self) -> usize {
        self.memberships.len()
    }

    pub fn resource_count(&self) -> usize {
        self.resources.len()
    }

    pub fn credential_count(&self) -> usize {
        self.credentials.len()
    }
}

#[async_trait]
impl MembershipRepository for InMemoryStore {
    async fn membership_role(
        &self,
        project_id: Uuid,
        user_id: Uuid,
    ) -> RepositoryResult<Option<Role>> {
        Ok(self
            .memberships
            .get(&(project_id, user_id))
            .map(|entry| entry.value().clone()))
    }
}

#[async_trait]
impl ResourceRepository for InMemoryStore {
    async fn find_resource(&self, id: Uuid) -> RepositoryResult<Option<ResourceRecord>> {
        Ok(self.resources.get(&id).map(|entry| entry.value().clone()))
    }

    async fn update_resource(&self, record: ResourceRecord) -> RepositoryResult<bool> {
        match self.resources.get_mut(&record.id) {
            Some(mut entry) => {
                *entry = record;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_resource(&self, id: Uuid) -> RepositoryResult<bool> {
        Ok(self.resources.remove(&id).is_some())
    }
}

#[async_trait]
impl CredentialStore for InMemoryStore {
    async fn resolve(&self, token: &str) -> RepositoryResult<Option<Identity>> {
        Ok(self.credentials.get(token).map(|entry| entry.value().clone()))
    }

    async fn insert(&self, token: String, identity: Identity) -> RepositoryResult<()> {
        self.credentials.insert(token, identity);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_membership_lookup() {
        let store = InMemoryStore::new();
        let project = Uuid::new_v4();
        let user = Uuid::new_v4();
        store.add_member(project, user, "editor");

        let role = store.membership_role(project, user).await.unwrap();
        assert_eq!(role, Some(Role::new("editor")));
        assert!(store
            .membership_role(Uuid::new_v4(), user)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_resource_lifecycle() {
        let store = InMemoryStore::new();
        let record = ResourceRecord {
            id: Uuid::new_v4(),
            project_id: Uuid::new_v4(),
            kind: Resource::new("file"),
            name: "report.pdf".to_string(),
        };
        assert!(!store.update_resource(record.clone()).await.unwrap());
        assert!(store.find_resource(record.id).await.unwrap().is_none());

        store.add_resource(record.clone());
        let renamed = ResourceRecord {
            name: "report-v2.pdf".to_string(),
            ..record.clone()
        };
        assert!(store.update_resource(renamed.clone()).await.unwrap());
        assert_eq!(store.find_resource(record.id).await.unwrap(), Some(renamed));

        assert!(store.delete_resource(record.id).await.unwrap());
        assert!(!store.delete_resource(record.id).await.unwrap());
        assert!(store.find_resource(record.id).await.unwrap().is_none());

        // A deleted resource is not brought back by a late update
        assert!(!store.update_resource(record).await.unwrap());
        assert_eq!(store.resource_count(), 0);
    }

    #[tokio::test]
    async fn test_credential_resolution() {
        let store = InMemoryStore::new();
        let user_id = Uuid::new_v4();
        store
            .insert("tok".to_string(), Identity::User { user_id })
            .await
            .unwrap();
        assert_eq!(
            store.resolve("tok").await.unwrap(),
            Some(Identity::User { user_id })
        );
        assert!(store.resolve("other").await.unwrap().is_none());
        assert_eq!(store.credential_count(), 1);
    }
}
