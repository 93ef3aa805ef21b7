//! Graph ordering service, the only writer of `sequence`.
//!
//! Every mutation keeps a component's sequences exactly `0..n`. Queries are
//! rewritten before a transaction is opened, so a rejected query never
//! touches the store and the component lock is held only for the
//! read-shift-write step.

use tracing::{debug, info, warn};

use crate::error::{GraphError, Result};
use crate::graph::{ComponentId, Graph, GraphDefinition, GraphId, GraphPatch};
use crate::rewrite::QueryRewriter;
use crate::storage::{GraphStore, Transaction};
use crate::templates::TemplateLibrary;

pub struct GraphService<S, R, T> {
    store: S,
    rewriter: R,
    templates: T,
}

impl<S, R, T> GraphService<S, R, T>
where
    S: GraphStore,
    R: QueryRewriter,
    T: TemplateLibrary,
{
    pub fn new(store: S, rewriter: R, templates: T) -> Self {
        Self {
            store,
            rewriter,
            templates,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Graphs of a component, ascending by sequence.
    pub fn list(&self, component_id: &ComponentId) -> Result<Vec<Graph>> {
        Ok(self.store.list(component_id)?)
    }

    pub fn get(&self, component_id: &ComponentId, graph_id: &GraphId) -> Result<Graph> {
        Ok(self.store.get(component_id, graph_id)?)
    }

    /// Names of the templates available for [`Self::import_template`].
    pub fn list_templates(&self) -> Vec<String> {
        self.templates.list_names()
    }

    /// Append one graph after the component's last one.
    pub fn create(&self, component_id: &ComponentId, title: &str, query: &str) -> Result<Graph> {
        let query = self.rewriter.rewrite(component_id, query)?;

        let mut tx = self.store.begin(component_id)?;
        let graph = Graph::new(component_id.clone(), title, query, tx.next_sequence());
        tx.insert(graph.clone())?;
        self.store.commit(tx)?;

        info!(
            component = %component_id,
            graph = %graph.graph_id,
            sequence = graph.sequence,
            "graph created"
        );
        Ok(graph)
    }

    /// Seed a component from a named template.
    pub fn import_template(&self, component_id: &ComponentId, name: &str) -> Result<Vec<Graph>> {
        let definitions = self.templates.get(name)?;
        debug!(
            component = %component_id,
            template = name,
            count = definitions.len(),
            "importing template"
        );
        self.bulk_import(component_id, &definitions)
    }

    /// Append every definition whose query rewrites cleanly, in order.
    ///
    /// Rejected definitions are logged and skipped without taking a sequence
    /// slot, so the accepted ones land contiguously after the existing
    /// graphs. The accepted set is committed in one transaction.
    pub fn bulk_import(
        &self,
        component_id: &ComponentId,
        definitions: &[GraphDefinition],
    ) -> Result<Vec<Graph>> {
        if definitions.is_empty() {
            return Ok(Vec::new());
        }

        let mut accepted = Vec::with_capacity(definitions.len());
        for definition in definitions {
            match self.rewriter.rewrite(component_id, &definition.query) {
                Ok(query) => accepted.push((definition.title.as_str(), query)),
                Err(e) => {
                    warn!(
                        component = %component_id,
                        title = %definition.title,
                        query = %definition.query,
                        error = %e,
                        "skipping graph definition"
                    );
                }
            }
        }

        if accepted.is_empty() {
            return Ok(Vec::new());
        }

        let mut tx = self.store.begin(component_id)?;
        let mut sequence = tx.next_sequence();
        let mut staged = Vec::with_capacity(accepted.len());
        for (title, query) in accepted {
            staged.push(Graph::new(component_id.clone(), title, query, sequence));
            sequence += 1;
        }
        tx.insert_many(staged.clone())?;
        self.store.commit(tx)?;

        info!(
            component = %component_id,
            imported = staged.len(),
            skipped = definitions.len() - staged.len(),
            "graphs imported"
        );
        Ok(staged)
    }

    /// Replace a graph's content and optionally move it to `new_sequence`.
    ///
    /// The query is always rewritten, even when unchanged. `None` keeps the
    /// current position.
    pub fn update(
        &self,
        component_id: &ComponentId,
        graph_id: &GraphId,
        title: &str,
        query: &str,
        new_sequence: Option<u32>,
    ) -> Result<Graph> {
        let query = self.rewriter.rewrite(component_id, query)?;

        let mut tx = self.store.begin(component_id)?;
        let current = tx.get(graph_id)?;
        let target = new_sequence.unwrap_or(current.sequence);
        if target as usize >= tx.len() {
            return Err(GraphError::InvalidSequence {
                requested: target,
                count: tx.len(),
            });
        }

        make_room(&mut tx, current.sequence, target)?;
        let graph = tx.update(graph_id, GraphPatch::content(title, query).with_sequence(target))?;
        self.store.commit(tx)?;

        info!(
            component = %component_id,
            graph = %graph_id,
            from = current.sequence,
            to = target,
            "graph updated"
        );
        Ok(graph)
    }

    /// Remove one graph and close the gap it leaves.
    pub fn delete(&self, component_id: &ComponentId, graph_id: &GraphId) -> Result<Graph> {
        let mut tx = self.store.begin(component_id)?;
        let removed = tx.delete(graph_id)?;
        let after = graph_ids(tx.list_sequence_greater_than(removed.sequence));
        tx.shift(&after, -1)?;
        self.store.commit(tx)?;

        info!(
            component = %component_id,
            graph = %graph_id,
            sequence = removed.sequence,
            shifted = after.len(),
            "graph deleted"
        );
        Ok(removed)
    }

    /// Remove every graph of a component, e.g. when the component itself is
    /// deleted.
    pub fn delete_by_component(&self, component_id: &ComponentId) -> Result<usize> {
        let removed = self.store.delete_component(component_id)?;
        info!(component = %component_id, removed, "component graphs deleted");
        Ok(removed)
    }
}

/// Shift the rows between `from` and `to` one step towards `from`, freeing
/// slot `to` for the row currently at `from`.
fn make_room(tx: &mut Transaction<'_>, from: u32, to: u32) -> Result<()> {
    if to > from {
        let between = graph_ids(tx.list_sequence_between(from + 1, to));
        tx.shift(&between, -1)?;
    } else if to < from {
        let between = graph_ids(tx.list_sequence_between(to, from - 1));
        tx.shift(&between, 1)?;
    }
    Ok(())
}

fn graph_ids(graphs: Vec<Graph>) -> Vec<GraphId> {
    graphs.into_iter().map(|g| g.graph_id).collect()
}
