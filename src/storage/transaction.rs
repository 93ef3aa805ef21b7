//! Component-scoped unit of work.
//!
//! A [`Transaction`] holds the component lock and a private working copy of
//! the component's rows. Nothing is visible to readers until the owning
//! store commits it; dropping it discards every staged change.

use std::collections::HashSet;

use crate::error::StoreError;
use crate::graph::{ComponentId, Graph, GraphId, GraphPatch};
use crate::lock::LockGuard;

use super::index::IdIndex;

type StoreResult<T> = std::result::Result<T, StoreError>;

pub struct Transaction<'a> {
    component_id: ComponentId,
    rows: Vec<Graph>,
    initial_ids: HashSet<GraphId>,
    index: &'a IdIndex,
    guard: LockGuard<'a>,
}

/// A validated working set, ready to be published by a backend.
pub struct Staged<'a> {
    pub component_id: ComponentId,
    /// Rows ascending by sequence.
    pub rows: Vec<Graph>,
    pub added: Vec<GraphId>,
    pub removed: Vec<GraphId>,
    /// Held until the backend has published.
    pub guard: LockGuard<'a>,
}

impl<'a> Transaction<'a> {
    pub(crate) fn new(rows: Vec<Graph>, index: &'a IdIndex, guard: LockGuard<'a>) -> Self {
        let initial_ids = rows.iter().map(|g| g.graph_id.clone()).collect();
        Self {
            component_id: guard.component().clone(),
            rows,
            initial_ids,
            index,
            guard,
        }
    }

    /// Whether this transaction was opened on the store owning `index`.
    pub(crate) fn opened_on(&self, index: &IdIndex) -> bool {
        std::ptr::eq(self.index, index)
    }

    pub fn component_id(&self) -> &ComponentId {
        &self.component_id
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Rows ascending by sequence.
    pub fn list(&self) -> Vec<Graph> {
        let mut rows = self.rows.clone();
        rows.sort_by_key(|g| g.sequence);
        rows
    }

    pub fn get(&self, graph_id: &GraphId) -> StoreResult<Graph> {
        self.position(graph_id).map(|i| self.rows[i].clone())
    }

    /// `0` for an empty component, otherwise one past the highest sequence.
    pub fn next_sequence(&self) -> u32 {
        self.rows
            .iter()
            .map(|g| g.sequence)
            .max()
            .map_or(0, |max| max + 1)
    }

    /// Stage a new row. Fails if the sequence is taken in this component or
    /// the graph id exists anywhere or was ever deleted.
    pub fn insert(&mut self, graph: Graph) -> StoreResult<()> {
        self.check_insert(&graph)?;
        self.rows.push(graph);
        Ok(())
    }

    /// Stage several rows; none are staged if any one is rejected.
    pub fn insert_many(&mut self, graphs: Vec<Graph>) -> StoreResult<()> {
        let before = self.rows.len();
        for graph in graphs {
            if let Err(e) = self.insert(graph) {
                self.rows.truncate(before);
                return Err(e);
            }
        }
        Ok(())
    }

    /// Partial update. Sequence uniqueness is checked at commit, so
    /// intermediate states of a shift are allowed.
    pub fn update(&mut self, graph_id: &GraphId, patch: GraphPatch) -> StoreResult<Graph> {
        let i = self.position(graph_id)?;
        self.rows[i].apply(patch);
        Ok(self.rows[i].clone())
    }

    pub fn delete(&mut self, graph_id: &GraphId) -> StoreResult<Graph> {
        let i = self.position(graph_id)?;
        Ok(self.rows.remove(i))
    }

    pub fn delete_all(&mut self) -> usize {
        let count = self.rows.len();
        self.rows.clear();
        count
    }

    /// Rows with `sequence > threshold`, ascending.
    pub fn list_sequence_greater_than(&self, threshold: u32) -> Vec<Graph> {
        self.select(|s| s > threshold)
    }

    /// Rows with `lo <= sequence <= hi`, ascending.
    pub fn list_sequence_between(&self, lo: u32, hi: u32) -> Vec<Graph> {
        self.select(|s| lo <= s && s <= hi)
    }

    /// Add `delta` to the sequence of every listed row.
    pub fn shift(&mut self, graph_ids: &[GraphId], delta: i32) -> StoreResult<()> {
        for graph_id in graph_ids {
            let i = self.position(graph_id)?;
            let current = self.rows[i].sequence;
            self.rows[i].sequence =
                current
                    .checked_add_signed(delta)
                    .ok_or_else(|| StoreError::BrokenSequence {
                        component_id: self.component_id.clone(),
                        sequences: vec![current],
                    })?;
        }
        Ok(())
    }

    /// Validate the working set: sequences must be exactly `0..n`.
    pub fn finish(self) -> StoreResult<Staged<'a>> {
        let mut rows = self.rows;
        rows.sort_by_key(|g| g.sequence);

        let contiguous = rows
            .iter()
            .enumerate()
            .all(|(i, g)| g.sequence as usize == i);
        if !contiguous {
            return Err(StoreError::BrokenSequence {
                component_id: self.component_id,
                sequences: rows.iter().map(|g| g.sequence).collect(),
            });
        }

        let current: HashSet<&GraphId> = rows.iter().map(|g| &g.graph_id).collect();
        let added = rows
            .iter()
            .filter(|g| !self.initial_ids.contains(&g.graph_id))
            .map(|g| g.graph_id.clone())
            .collect();
        let removed = self
            .initial_ids
            .iter()
            .filter(|id| !current.contains(id))
            .cloned()
            .collect();

        Ok(Staged {
            component_id: self.component_id,
            rows,
            added,
            removed,
            guard: self.guard,
        })
    }

    fn position(&self, graph_id: &GraphId) -> StoreResult<usize> {
        self.rows
            .iter()
            .position(|g| &g.graph_id == graph_id)
            .ok_or_else(|| StoreError::NotFound {
                component_id: self.component_id.clone(),
                graph_id: graph_id.clone(),
            })
    }

    fn select(&self, keep: impl Fn(u32) -> bool) -> Vec<Graph> {
        let mut rows: Vec<Graph> = self
            .rows
            .iter()
            .filter(|g| keep(g.sequence))
            .cloned()
            .collect();
        rows.sort_by_key(|g| g.sequence);
        rows
    }

    fn check_insert(&self, graph: &Graph) -> StoreResult<()> {
        if graph.component_id != self.component_id {
            return Err(StoreError::InvalidStructure(format!(
                "graph {} belongs to component {}, not {}",
                graph.graph_id, graph.component_id, self.component_id
            )));
        }
        if self.rows.iter().any(|g| g.sequence == graph.sequence) {
            return Err(StoreError::DuplicateSequence {
                component_id: self.component_id.clone(),
                sequence: graph.sequence,
            });
        }
        if self.index.is_retired(&graph.graph_id) {
            return Err(StoreError::RetiredGraphId(graph.graph_id.clone()));
        }
        let owned_elsewhere = self
            .index
            .owner(&graph.graph_id)
            .is_some_and(|owner| owner != self.component_id);
        if owned_elsewhere
            || self.initial_ids.contains(&graph.graph_id)
            || self.rows.iter().any(|g| g.graph_id == graph.graph_id)
        {
            return Err(StoreError::DuplicateGraphId(graph.graph_id.clone()));
        }
        Ok(())
    }
}
