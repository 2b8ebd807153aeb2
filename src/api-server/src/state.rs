use crate::repository::{CredentialStore, InMemoryStore, MembershipRepository, ResourceRepository};
use shelf_authz::Checker;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Default bound on a single data-layer lookup
pub const DEFAULT_LOOKUP_TIMEOUT: Duration = Duration::from_secs(5);

/// Application state shared across handlers and guards
#[derive(Clone)]
pub struct AppState {
    /// Compiled authorization policy
    pub checker: Arc<Checker>,

    /// Project membership lookup
    pub memberships: Arc<dyn MembershipRepository>,

    /// Resource lookup and storage
    pub resources: Arc<dyn ResourceRepository>,

    /// Bearer token lookup
    pub credentials: Arc<dyn CredentialStore>,

    /// Bound on each membership/resource lookup
    pub lookup_timeout: Duration,

    /// Server start time for uptime calculation
    pub start_time: Instant,

    /// Application version
    pub version: String,
}

impl AppState {
    pub fn new(
        checker: Arc<Checker>,
        memberships: Arc<dyn MembershipRepository>,
        resources: Arc<dyn ResourceRepository>,
        credentials: Arc<dyn CredentialStore>,
    ) -> Self {
        Self {
            checker,
            memberships,
            resources,
            credentials,
            lookup_timeout: DEFAULT_LOOKUP_TIMEOUT,
            start_time: Instant::now(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    /// State whose collaborators are all backed by one in-memory store
    pub fn in_memory(checker: Arc<Checker>, store: Arc<InMemoryStore>) -> Self {
        Self::new(checker, store.clone(), store.clone(), store)
    }

    pub fn with_lookup_timeout(mut self, timeout: Duration) -> Self {
        self.lookup_timeout = timeout;
        self
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}
