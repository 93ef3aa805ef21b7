//! Storage layer for graph catalogs.
//!
//! Handles persistence of graph rows:
//! - Per-component transactions holding the component lock
//! - Atomic publication of a validated working set
//! - A global graph-id registry so ids are never shared between components
//!   and never reused once deleted
//!
//! Two backends are provided: [`MemoryStore`] and the file-backed [`FsStore`].

mod fs;
mod index;
mod memory;
mod transaction;

pub use fs::FsStore;
pub use index::{IdIndex, IdRegistry};
pub use memory::MemoryStore;
pub use transaction::{Staged, Transaction};

use crate::error::StoreError;
use crate::graph::{ComponentId, Graph, GraphId};

/// Persistent ordered collection of graph rows.
///
/// Reads through [`GraphStore::list`] and [`GraphStore::get`] see committed
/// state only. Mutations go through [`GraphStore::begin`], which blocks
/// until no other transaction holds the same component, and become visible
/// all at once on [`GraphStore::commit`].
pub trait GraphStore: Send + Sync {
    /// Committed rows of a component, ascending by sequence.
    fn list(&self, component_id: &ComponentId) -> Result<Vec<Graph>, StoreError>;

    /// Open a transaction on one component.
    fn begin(&self, component_id: &ComponentId) -> Result<Transaction<'_>, StoreError>;

    /// Validate and publish a transaction's working set.
    fn commit(&self, tx: Transaction<'_>) -> Result<(), StoreError>;

    fn get(&self, component_id: &ComponentId, graph_id: &GraphId) -> Result<Graph, StoreError> {
        self.list(component_id)?
            .into_iter()
            .find(|g| &g.graph_id == graph_id)
            .ok_or_else(|| StoreError::NotFound {
                component_id: component_id.clone(),
                graph_id: graph_id.clone(),
            })
    }

    /// Remove every row of a component. Returns how many were removed.
    fn delete_component(&self, component_id: &ComponentId) -> Result<usize, StoreError> {
        let mut tx = self.begin(component_id)?;
        let removed = tx.delete_all();
        self.commit(tx)?;
        Ok(removed)
    }
}
