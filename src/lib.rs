//! # Component Graphs
//!
//! Ordered catalogs of monitoring graphs, one per deployable component.
//!
//! Each component owns a list of graphs (a title plus a query) shown on its
//! dashboard in `sequence` order. The catalog keeps those sequences exactly
//! `0..n` through every create, update, delete and bulk import, even when
//! mutations on the same component race.
//!
//! ## Key Features
//!
//! - **Contiguous ordering**: moves and deletes shift neighbours in the same
//!   transaction, so no reader ever sees a gap or a duplicate
//! - **Query rewriting**: every query is validated and labelled with its
//!   component by an external rewriter before anything is written
//! - **Templates**: named sets of graphs for seeding new components
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use component_graphs::ComponentId;
//!
//! // Open the store described by graphs.toml
//! let service = component_graphs::open("graphs.toml".as_ref()).unwrap();
//!
//! let component = ComponentId::new("gr1a2b3c").unwrap();
//! let graph = service.create(&component, "Requests", "rate(http_requests_total[1m])").unwrap();
//!
//! // Move it to the top
//! service.update(&component, &graph.graph_id, &graph.title, &graph.query, Some(0)).unwrap();
//! ```

pub mod config;
pub mod error;
pub mod graph;
pub mod lock;
pub mod rewrite;
pub mod service;
pub mod storage;
pub mod templates;

// Re-exports for convenience
pub use config::GraphsConfig;
pub use error::{GraphError, Result, StoreError};
pub use graph::{ComponentId, Graph, GraphDefinition, GraphId, GraphPatch};
pub use rewrite::{ProcessRewriter, QueryRewriter, RewriteError};
pub use service::GraphService;
pub use storage::{FsStore, GraphStore, MemoryStore};
pub use templates::{DirTemplates, StaticTemplates, TemplateLibrary};

use std::path::Path;

/// Service wired to the file store, the rewriter process and the template
/// directory.
pub type FsGraphService = GraphService<FsStore, ProcessRewriter, DirTemplates>;

/// Open the service described by a config file. The store must exist.
pub fn open(config_path: &Path) -> Result<FsGraphService> {
    build(config_path, FsStore::open)
}

/// Like [`open`], creating the store layout first if needed.
pub fn init(config_path: &Path) -> Result<FsGraphService> {
    build(config_path, FsStore::init)
}

fn build(
    config_path: &Path,
    store: fn(&Path) -> std::result::Result<FsStore, StoreError>,
) -> Result<FsGraphService> {
    let config = GraphsConfig::load(config_path);
    let store = store(&config.resolve_store_root(config_path))?
        .with_lock_timeout(config.locks.timeout());
    let rewriter = ProcessRewriter::from_config(&config.rewriter);
    let templates = DirTemplates::new(config.resolve_templates_dir(config_path));
    Ok(GraphService::new(store, rewriter, templates))
}
