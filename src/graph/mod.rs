//! Graph records: the rows of a component's dashboard catalog.

pub mod types;

pub use types::{ComponentId, Graph, GraphDefinition, GraphId, GraphPatch};
