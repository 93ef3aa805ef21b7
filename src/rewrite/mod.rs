//! Query rewriting: validation and component labelling of raw queries.
//!
//! The rewriter is an opaque collaborator: it either returns the query with
//! the component label injected, or rejects it. Rewriting an already
//! labelled query returns the same text.

mod process;

pub use process::ProcessRewriter;

use std::time::Duration;

use crate::error::GraphError;
use crate::graph::ComponentId;

#[derive(Debug, thiserror::Error)]
pub enum RewriteError {
    #[error("invalid query: {0}")]
    Invalid(String),

    #[error("rewrite timed out after {}ms", .0.as_millis())]
    Timeout(Duration),

    #[error("failed to start rewriter: {0}")]
    Spawn(#[from] std::io::Error),
}

impl From<RewriteError> for GraphError {
    fn from(err: RewriteError) -> Self {
        match err {
            RewriteError::Invalid(detail) => GraphError::InvalidQuery(detail),
            RewriteError::Timeout(after) => GraphError::RewriteTimeout(after),
            RewriteError::Spawn(e) => GraphError::RewriterUnavailable(e),
        }
    }
}

/// Validates a raw query and injects the component-identifying label.
pub trait QueryRewriter: Send + Sync {
    fn rewrite(&self, component_id: &ComponentId, query: &str) -> Result<String, RewriteError>;
}

impl<R: QueryRewriter + ?Sized> QueryRewriter for &R {
    fn rewrite(&self, component_id: &ComponentId, query: &str) -> Result<String, RewriteError> {
        (**self).rewrite(component_id, query)
    }
}

impl<R: QueryRewriter + ?Sized> QueryRewriter for Box<R> {
    fn rewrite(&self, component_id: &ComponentId, query: &str) -> Result<String, RewriteError> {
        (**self).rewrite(component_id, query)
    }
}
