//! Client script -> injected fragment dependencies.
//!
//! The forward map is the only thing persisted. Reverse lookups scan it; a
//! client's dependency set is always replaced as a whole, and a client with
//! no dependencies has no entry.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

/// Persisted `client -> dependency paths` table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DependencyGraph {
    edges: BTreeMap<PathBuf, BTreeSet<PathBuf>>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the dependency set of `client`. An empty set removes it.
    pub fn set_dependencies(&mut self, client: &Path, deps: BTreeSet<PathBuf>) {
        if deps.is_empty() {
            self.edges.remove(client);
        } else {
            self.edges.insert(client.to_path_buf(), deps);
        }
    }

    /// Every client whose dependency set contains `dependency`.
    pub fn clients_depending_on(&self, dependency: &Path) -> BTreeSet<PathBuf> {
        self.edges
            .iter()
            .filter(|(_, deps)| deps.contains(dependency))
            .map(|(client, _)| client.clone())
            .collect()
    }

    /// Clients that must be reprocessed because a dependency is stale.
    pub fn clients_invalidated_by<'a>(
        &self,
        stale_dependencies: impl IntoIterator<Item = &'a Path>,
    ) -> BTreeSet<PathBuf> {
        stale_dependencies.into_iter().flat_map(|dep| self.clients_depending_on(dep)).collect()
    }

    /// The recorded dependencies of `client`.
    pub fn dependencies_of(&self, client: &Path) -> Option<&BTreeSet<PathBuf>> {
        self.edges.get(client)
    }

    /// `dependency -> clients` index, derived from the forward map.
    pub fn reverse_index(&self) -> BTreeMap<PathBuf, BTreeSet<PathBuf>> {
        let mut reverse: BTreeMap<PathBuf, BTreeSet<PathBuf>> = BTreeMap::new();
        for (client, deps) in &self.edges {
            for dep in deps {
                reverse.entry(dep.clone()).or_default().insert(client.clone());
            }
        }
        reverse
    }

    /// Remove a client entirely (e.g. the script was deleted).
    pub fn remove_client(&mut self, client: &Path) -> bool {
        self.edges.remove(client).is_some()
    }

    pub fn clients(&self) -> impl Iterator<Item = &PathBuf> {
        self.edges.keys()
    }

    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }
}
