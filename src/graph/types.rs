//
//  types.rs
//  Component Graphs
//
//  Created by hak (tharun)
//

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{GraphError, Result};

/// Identifier of the component that owns a set of graphs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ComponentId(String);

impl ComponentId {
    pub fn new(id: impl Into<String>) -> Result<Self> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(GraphError::InvalidComponentId(id));
        }
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ComponentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Globally unique graph identifier. Never reused.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GraphId(String);

impl GraphId {
    /// Fresh id: a v4 UUID as 32 lowercase hex chars.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().simple().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for GraphId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for GraphId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl fmt::Display for GraphId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One monitoring query with its display position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Graph {
    pub component_id: ComponentId,
    pub graph_id: GraphId,
    pub title: String,
    /// Rewritten query text.
    #[serde(rename = "promql", alias = "query")]
    pub query: String,
    pub sequence: u32,
}

impl Graph {
    pub fn new(
        component_id: ComponentId,
        title: impl Into<String>,
        query: impl Into<String>,
        sequence: u32,
    ) -> Self {
        Self {
            component_id,
            graph_id: GraphId::generate(),
            title: title.into(),
            query: query.into(),
            sequence,
        }
    }

    /// Apply the set fields of a patch.
    pub fn apply(&mut self, patch: GraphPatch) {
        if let Some(title) = patch.title {
            self.title = title;
        }
        if let Some(query) = patch.query {
            self.query = query;
        }
        if let Some(sequence) = patch.sequence {
            self.sequence = sequence;
        }
    }
}

/// A `{title, query}` pair, as found in templates and bulk imports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphDefinition {
    pub title: String,
    #[serde(rename = "promql", alias = "query")]
    pub query: String,
}

impl GraphDefinition {
    pub fn new(title: impl Into<String>, query: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            query: query.into(),
        }
    }
}

/// Partial update applied by [`crate::storage::Transaction::update`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GraphPatch {
    pub title: Option<String>,
    pub query: Option<String>,
    pub sequence: Option<u32>,
}

impl GraphPatch {
    pub fn content(title: impl Into<String>, query: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            query: Some(query.into()),
            sequence: None,
        }
    }

    pub fn with_sequence(mut self, sequence: u32) -> Self {
        self.sequence = Some(sequence);
        self
    }
}
