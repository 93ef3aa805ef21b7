//! In-process graph store.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};
use std::time::Duration;

use tracing::debug;

use crate::error::StoreError;
use crate::graph::{ComponentId, Graph};
use crate::lock::{LockGuard, LockManager};

use super::index::IdIndex;
use super::transaction::{Staged, Transaction};
use super::GraphStore;

/// Default timeout for acquiring a component lock.
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(30);

/// Graph rows kept in memory, one sorted vector per component.
pub struct MemoryStore {
    components: RwLock<HashMap<ComponentId, Vec<Graph>>>,
    index: IdIndex,
    locks: LockManager,
    lock_timeout: Duration,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_lock_timeout(DEFAULT_LOCK_TIMEOUT)
    }

    pub fn with_lock_timeout(lock_timeout: Duration) -> Self {
        Self {
            components: RwLock::new(HashMap::new()),
            index: IdIndex::default(),
            locks: LockManager::new(),
            lock_timeout,
        }
    }

    /// Components that currently own at least one graph.
    pub fn components(&self) -> Vec<ComponentId> {
        let mut ids: Vec<ComponentId> = self
            .components
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        ids.sort();
        ids
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl GraphStore for MemoryStore {
    fn list(&self, component_id: &ComponentId) -> Result<Vec<Graph>, StoreError> {
        Ok(self
            .components
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(component_id)
            .cloned()
            .unwrap_or_default())
    }

    fn begin(&self, component_id: &ComponentId) -> Result<Transaction<'_>, StoreError> {
        let guard = LockGuard::acquire(&self.locks, component_id, self.lock_timeout)?;
        let rows = self.list(component_id)?;
        Ok(Transaction::new(rows, &self.index, guard))
    }

    fn commit(&self, tx: Transaction<'_>) -> Result<(), StoreError> {
        if !tx.opened_on(&self.index) {
            return Err(StoreError::ForeignTransaction(tx.component_id().clone()));
        }
        let Staged {
            component_id,
            rows,
            added,
            removed,
            guard,
        } = tx.finish()?;

        self.index.claim(&component_id, &added)?;
        {
            let mut components = self
                .components
                .write()
                .unwrap_or_else(PoisonError::into_inner);
            debug!(component = %component_id, rows = rows.len(), "publishing component");
            if rows.is_empty() {
                components.remove(&component_id);
            } else {
                components.insert(component_id, rows);
            }
        }
        self.index.retire(&removed);

        drop(guard);
        Ok(())
    }
}
