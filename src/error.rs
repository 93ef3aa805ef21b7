//! Error types for the graph catalog.

use std::path::PathBuf;
use std::time::Duration;

use crate::graph::{ComponentId, GraphId};

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, GraphError>;

/// Errors surfaced by [`crate::GraphService`].
#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    #[error("invalid query: {0}")]
    InvalidQuery(String),

    #[error("query rewrite timed out after {}ms", .0.as_millis())]
    RewriteTimeout(Duration),

    #[error("query rewriter unavailable: {0}")]
    RewriterUnavailable(#[source] std::io::Error),

    #[error("template not found: {0}")]
    TemplateNotFound(String),

    #[error("graph {graph_id} not found in component {component_id}")]
    NotFound {
        component_id: ComponentId,
        graph_id: GraphId,
    },

    #[error("sequence {requested} out of range (component has {count} graphs)")]
    InvalidSequence { requested: u32, count: usize },

    #[error("invalid component id: {0:?}")]
    InvalidComponentId(String),

    #[error(transparent)]
    Store(StoreError),
}

impl GraphError {
    /// True for failures raised before any transaction was opened.
    pub fn aborts_before_write(&self) -> bool {
        matches!(
            self,
            GraphError::InvalidQuery(_)
                | GraphError::RewriteTimeout(_)
                | GraphError::RewriterUnavailable(_)
                | GraphError::TemplateNotFound(_)
        )
    }
}

impl From<StoreError> for GraphError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound {
                component_id,
                graph_id,
            } => GraphError::NotFound {
                component_id,
                graph_id,
            },
            StoreError::InvalidComponentId(id) => GraphError::InvalidComponentId(id),
            other => GraphError::Store(other),
        }
    }
}

/// Errors raised by a [`crate::storage::GraphStore`] backend.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("timed out after {}ms waiting for component {component_id}", .waited.as_millis())]
    LockTimeout {
        component_id: ComponentId,
        waited: Duration,
    },

    #[error("graph {graph_id} not found in component {component_id}")]
    NotFound {
        component_id: ComponentId,
        graph_id: GraphId,
    },

    #[error("component {component_id} already has a graph at sequence {sequence}")]
    DuplicateSequence {
        component_id: ComponentId,
        sequence: u32,
    },

    #[error("graph id {0} already exists")]
    DuplicateGraphId(GraphId),

    #[error("graph id {0} belonged to a deleted graph and can not be reused")]
    RetiredGraphId(GraphId),

    #[error("transaction on component {0} was opened by a different store")]
    ForeignTransaction(ComponentId),

    #[error("component {component_id} sequences are not contiguous: {sequences:?}")]
    BrokenSequence {
        component_id: ComponentId,
        sequences: Vec<u32>,
    },

    #[error("invalid store layout: {0}")]
    InvalidStructure(String),

    #[error("store root not found: {0}")]
    MissingRoot(PathBuf),

    #[error("invalid component id: {0:?}")]
    InvalidComponentId(String),
}
