//! Global graph-id registry shared by all components of one store.
//!
//! Graph ids are never reused: ids of deleted graphs stay behind as
//! tombstones and can not be claimed again by any component.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{PoisonError, RwLock};

use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::graph::{ComponentId, GraphId};

/// Live ids with their owning component, plus retired ids.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdRegistry {
    #[serde(default)]
    pub graphs: BTreeMap<GraphId, ComponentId>,
    #[serde(default)]
    pub retired: BTreeSet<GraphId>,
}

impl IdRegistry {
    /// Register ids for `component`. Nothing is registered if any id is
    /// retired or owned by a different component.
    pub fn claim(&mut self, component: &ComponentId, ids: &[GraphId]) -> Result<(), StoreError> {
        for id in ids {
            if self.retired.contains(id) {
                return Err(StoreError::RetiredGraphId(id.clone()));
            }
            if self.graphs.get(id).is_some_and(|owner| owner != component) {
                return Err(StoreError::DuplicateGraphId(id.clone()));
            }
        }
        for id in ids {
            self.graphs.insert(id.clone(), component.clone());
        }
        Ok(())
    }

    /// Turn live ids into tombstones.
    pub fn retire(&mut self, ids: &[GraphId]) {
        for id in ids {
            self.graphs.remove(id);
            self.retired.insert(id.clone());
        }
    }
}

/// In-memory, thread-safe [`IdRegistry`].
#[derive(Debug, Default)]
pub struct IdIndex {
    registry: RwLock<IdRegistry>,
}

impl IdIndex {
    pub fn owner(&self, graph_id: &GraphId) -> Option<ComponentId> {
        self.read().graphs.get(graph_id).cloned()
    }

    pub fn is_retired(&self, graph_id: &GraphId) -> bool {
        self.read().retired.contains(graph_id)
    }

    /// Number of live ids.
    pub fn len(&self) -> usize {
        self.read().graphs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn claim(&self, component: &ComponentId, ids: &[GraphId]) -> Result<(), StoreError> {
        self.write().claim(component, ids)
    }

    pub fn retire(&self, ids: &[GraphId]) {
        self.write().retire(ids);
    }

    /// Swap in a registry loaded from elsewhere, e.g. a store's index file.
    pub fn replace(&self, registry: IdRegistry) {
        *self.write() = registry;
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, IdRegistry> {
        self.registry.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, IdRegistry> {
        self.registry.write().unwrap_or_else(PoisonError::into_inner)
    }
}
