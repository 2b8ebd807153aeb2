//! Compiled capability matrix
//!
//! Lookups are total: a missing role, resource or action yields `false`.

use crate::policy::CapabilityMatrix;
use crate::types::{Action, Resource, Role};
use std::collections::{HashMap, HashSet};

/// Role → resource → action lookup table
#[derive(Debug, Clone, Default)]
pub struct CapabilityIndex {
    entries: HashMap<Role, HashMap<Resource, HashSet<Action>>>,
}

impl CapabilityIndex {
    /// Compile a declarative matrix into hash lookups
    pub fn compile(matrix: &CapabilityMatrix) -> Self {
        let entries = matrix
            .iter()
            .map(|(role, by_resource)| {
                let by_resource = by_resource
                    .iter()
                    .map(|(resource, actions)| {
                        (resource.clone(), actions.iter().cloned().collect())
                    })
                    .collect();
                (role.clone(), by_resource)
            })
            .collect();

        Self { entries }
    }

    /// Whether `role` may perform `action` on `resource`
    pub fn allows(&self, role: &str, resource: &str, action: &str) -> bool {
        self.entries
            .get(role)
            .and_then(|by_resource| by_resource.get(resource))
            .is_some_and(|actions| actions.contains(action))
    }

    /// Actions `role` may perform on `resource`, sorted by name
    pub fn actions_for(&self, role: &str, resource: &str) -> Vec<Action> {
        let mut actions: Vec<Action> = self
            .entries
            .get(role)
            .and_then(|by_resource| by_resource.get(resource))
            .map(|actions| actions.iter().cloned().collect())
            .unwrap_or_default();
        actions.sort();
        actions
    }

    /// Total number of (role, resource, action) grants
    pub fn grant_count(&self) -> usize {
        self.entries
            .values()
            .flat_map(|by_resource| by_resource.values())
            .map(HashSet::len)
            .sum()
    }
}
