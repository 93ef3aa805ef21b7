//! File system backed graph store.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::StoreError;
use crate::graph::{ComponentId, Graph};
use crate::lock::{FileLock, LockGuard, LockManager};

use super::index::{IdIndex, IdRegistry};
use super::memory::DEFAULT_LOCK_TIMEOUT;
use super::transaction::{Staged, Transaction};
use super::GraphStore;

/// Storage layer keeping one JSON file per component.
///
/// ```text
/// <root>/
/// ├── components/     # <component_id>.json, rows ascending by sequence
/// ├── locks/          # <component_id>.lock, index.lock
/// └── index.json      # per-component summary and the graph id registry
/// ```
///
/// Several handles, in one process or many, may share a root. Mutations of
/// a component are serialized through its lock file; commits are serialized
/// through `index.lock`.
pub struct FsStore {
    /// Root directory
    root: PathBuf,
    /// Component files directory (<root>/components/)
    components_dir: PathBuf,
    /// Lock files directory (<root>/locks/)
    locks_dir: PathBuf,
    /// Index file path (<root>/index.json)
    index_path: PathBuf,
    /// Copy of the registry in index.json, refreshed on begin and commit.
    ids: IdIndex,
    locks: LockManager,
    lock_timeout: Duration,
}

/// Contents of index.json.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct IndexFile {
    version: String,
    #[serde(default)]
    components: BTreeMap<ComponentId, ComponentSummary>,
    #[serde(default)]
    ids: IdRegistry,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ComponentSummary {
    graphs: usize,
    updated: DateTime<Utc>,
}

impl IndexFile {
    fn new() -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            components: BTreeMap::new(),
            ids: IdRegistry::default(),
        }
    }
}

impl FsStore {
    /// Initialize a store directory, creating the layout if needed.
    pub fn init(root: &Path) -> Result<Self, StoreError> {
        fs::create_dir_all(root.join("components"))?;
        fs::create_dir_all(root.join("locks"))?;

        let index_path = root.join("index.json");
        if !index_path.exists() {
            write_atomic(
                &index_path,
                &serde_json::to_string_pretty(&IndexFile::new())?,
            )?;
        }

        info!(root = %root.display(), "initialized graph store");
        Self::open(root)
    }

    /// Open an existing store directory.
    pub fn open(root: &Path) -> Result<Self, StoreError> {
        if !root.exists() {
            return Err(StoreError::MissingRoot(root.to_path_buf()));
        }

        let components_dir = root.join("components");
        let index_path = root.join("index.json");

        if !components_dir.exists() {
            return Err(StoreError::InvalidStructure(
                "Missing components directory".into(),
            ));
        }

        if !index_path.exists() {
            return Err(StoreError::InvalidStructure("Missing index.json".into()));
        }

        let locks_dir = root.join("locks");
        fs::create_dir_all(&locks_dir)?;

        let store = Self {
            root: root.to_path_buf(),
            components_dir,
            locks_dir,
            index_path,
            ids: IdIndex::default(),
            locks: LockManager::new(),
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
        };
        store.reconcile_ids()?;
        Ok(store)
    }

    pub fn with_lock_timeout(mut self, lock_timeout: Duration) -> Self {
        self.lock_timeout = lock_timeout;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Components that have a file on disk, sorted. Files whose name is not
    /// a valid component id are skipped.
    pub fn components(&self) -> Result<Vec<ComponentId>, StoreError> {
        let mut ids = Vec::new();

        for entry in fs::read_dir(&self.components_dir)? {
            let path = entry?.path();

            if !path.is_file() || path.extension().map_or(true, |ext| ext != "json") {
                continue;
            }
            let Some(stem) = path.file_stem().map(|s| s.to_string_lossy().to_string()) else {
                continue;
            };

            match ComponentId::new(stem) {
                Ok(id) if Self::validate_id(&id).is_ok() => ids.push(id),
                _ => warn!(file = %path.display(), "skipping file with invalid component id"),
            }
        }

        ids.sort();
        Ok(ids)
    }

    /// Make the registry agree with the component files, which are
    /// authoritative for live rows.
    fn reconcile_ids(&self) -> Result<(), StoreError> {
        let _index_lock = FileLock::acquire_blocking(&self.index_lock_path())?;
        let mut index = self.read_index()?;
        let mut changed = false;

        for component in self.components()? {
            for graph in self.read_component(&component)? {
                let owner = index.ids.graphs.get(&graph.graph_id).cloned();
                match owner {
                    Some(owner) if owner == component => {}
                    Some(owner) => {
                        return Err(StoreError::InvalidStructure(format!(
                            "graph {} is stored under {} but registered to {}",
                            graph.graph_id, component, owner
                        )));
                    }
                    None => {
                        index.ids.retired.remove(&graph.graph_id);
                        index.ids.graphs.insert(graph.graph_id, component.clone());
                        changed = true;
                    }
                }
            }
        }

        if changed {
            warn!(root = %self.root.display(), "graph id registry was behind component files; repaired");
            self.write_index(&index)?;
        }
        debug!(graphs = index.ids.graphs.len(), "loaded graph id registry");
        self.ids.replace(index.ids);
        Ok(())
    }

    fn component_path(&self, component_id: &ComponentId) -> Result<PathBuf, StoreError> {
        Self::validate_id(component_id)?;
        Ok(self
            .components_dir
            .join(format!("{}.json", component_id.as_str())))
    }

    fn component_lock_path(&self, component_id: &ComponentId) -> PathBuf {
        self.locks_dir
            .join(format!("{}.lock", component_id.as_str()))
    }

    fn index_lock_path(&self) -> PathBuf {
        self.locks_dir.join("index.lock")
    }

    /// Component ids double as file names.
    fn validate_id(component_id: &ComponentId) -> Result<(), StoreError> {
        let id = component_id.as_str();
        let valid = !id.is_empty()
            && id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');

        if !valid {
            return Err(StoreError::InvalidComponentId(id.to_string()));
        }

        Ok(())
    }

    fn read_component(&self, component_id: &ComponentId) -> Result<Vec<Graph>, StoreError> {
        let path = self.component_path(component_id)?;
        if !path.exists() {
            return Ok(Vec::new());
        }
        let content = fs::read_to_string(&path)?;
        let mut rows: Vec<Graph> = serde_json::from_str(&content)?;
        rows.sort_by_key(|g| g.sequence);
        Ok(rows)
    }

    fn write_component(&self, component_id: &ComponentId, rows: &[Graph]) -> Result<(), StoreError> {
        let path = self.component_path(component_id)?;
        if rows.is_empty() {
            if path.exists() {
                fs::remove_file(&path)?;
            }
            return Ok(());
        }
        write_atomic(&path, &serde_json::to_string_pretty(rows)?)
    }

    /// Read the index file.
    fn read_index(&self) -> Result<IndexFile, StoreError> {
        let content = fs::read_to_string(&self.index_path)?;
        Ok(serde_json::from_str(&content)?)
    }

    fn write_index(&self, index: &IndexFile) -> Result<(), StoreError> {
        write_atomic(&self.index_path, &serde_json::to_string_pretty(index)?)
    }
}

impl GraphStore for FsStore {
    fn list(&self, component_id: &ComponentId) -> Result<Vec<Graph>, StoreError> {
        self.read_component(component_id)
    }

    fn begin(&self, component_id: &ComponentId) -> Result<Transaction<'_>, StoreError> {
        Self::validate_id(component_id)?;
        let start = Instant::now();

        let guard = LockGuard::acquire(&self.locks, component_id, self.lock_timeout)?;
        let remaining = self.lock_timeout.saturating_sub(start.elapsed());
        let file = FileLock::acquire(&self.component_lock_path(component_id), remaining)?
            .ok_or_else(|| StoreError::LockTimeout {
                component_id: component_id.clone(),
                waited: self.lock_timeout,
            })?;
        let guard = guard.with_file(file);

        let rows = self.read_component(component_id)?;
        // pick up ids committed through other handles
        self.ids.replace(self.read_index()?.ids);
        Ok(Transaction::new(rows, &self.ids, guard))
    }

    /// The index is written first and restored if the component file can
    /// not be written, so a failed commit leaves both files as they were.
    fn commit(&self, tx: Transaction<'_>) -> Result<(), StoreError> {
        if !tx.opened_on(&self.ids) {
            return Err(StoreError::ForeignTransaction(tx.component_id().clone()));
        }
        let Staged {
            component_id,
            rows,
            added,
            removed,
            guard,
        } = tx.finish()?;

        let index_lock = FileLock::acquire_blocking(&self.index_lock_path())?;
        let previous = self.read_index()?;

        let mut index = previous.clone();
        index.ids.claim(&component_id, &added)?;
        index.ids.retire(&removed);
        if rows.is_empty() {
            index.components.remove(&component_id);
        } else {
            index.components.insert(
                component_id.clone(),
                ComponentSummary {
                    graphs: rows.len(),
                    updated: Utc::now(),
                },
            );
        }
        self.write_index(&index)?;

        if let Err(e) = self.write_component(&component_id, &rows) {
            if let Err(restore) = self.write_index(&previous) {
                warn!(component = %component_id, error = %restore, "failed to restore index.json");
            }
            return Err(e);
        }
        debug!(component = %component_id, rows = rows.len(), "component file written");

        self.ids.replace(index.ids);
        drop(index_lock);
        drop(guard);
        Ok(())
    }
}

/// Write atomically (write to temp, then rename).
fn write_atomic(path: &Path, content: &str) -> Result<(), StoreError> {
    let temp_path = path.with_extension("json.tmp");
    let mut file = File::create(&temp_path)?;
    file.write_all(content.as_bytes())?;
    file.sync_all()?;

    fs::rename(&temp_path, path)?;
    Ok(())
}
