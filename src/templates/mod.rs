//! Template library: named, ordered sets of graph definitions used to seed
//! new components.

mod dir;

pub use dir::DirTemplates;

use std::collections::BTreeMap;

use crate::error::{GraphError, Result};
use crate::graph::GraphDefinition;

/// Read-only source of graph templates.
pub trait TemplateLibrary: Send + Sync {
    /// Template names, sorted.
    fn list_names(&self) -> Vec<String>;

    /// Definitions of one template, in order.
    fn get(&self, name: &str) -> Result<Vec<GraphDefinition>>;
}

/// Templates held in memory.
#[derive(Debug, Clone, Default)]
pub struct StaticTemplates {
    templates: BTreeMap<String, Vec<GraphDefinition>>,
}

impl StaticTemplates {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, definitions: Vec<GraphDefinition>) -> Self {
        self.templates.insert(name.into(), definitions);
        self
    }
}

impl TemplateLibrary for StaticTemplates {
    fn list_names(&self) -> Vec<String> {
        self.templates.keys().cloned().collect()
    }

    fn get(&self, name: &str) -> Result<Vec<GraphDefinition>> {
        self.templates
            .get(name)
            .filter(|defs| !defs.is_empty())
            .cloned()
            .ok_or_else(|| GraphError::TemplateNotFound(name.to_string()))
    }
}
