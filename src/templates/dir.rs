//! Templates read from a directory of JSON files.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::{GraphError, Result};
use crate::graph::GraphDefinition;

use super::TemplateLibrary;

/// One template per `<name>.json` file, each holding an ordered array of
/// `{"title": ..., "promql": ...}` objects.
///
/// The directory is rescanned on every call, so templates changed on disk
/// are picked up without a restart. Files that fail to parse are skipped, as
/// are single malformed entries; a missing directory behaves like an empty one.
#[derive(Debug, Clone)]
pub struct DirTemplates {
    dir: PathBuf,
}

impl DirTemplates {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn load(&self) -> BTreeMap<String, Vec<GraphDefinition>> {
        let mut templates = BTreeMap::new();

        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) => {
                warn!(dir = %self.dir.display(), error = %e, "template directory unavailable");
                return templates;
            }
        };

        for entry in entries.flatten() {
            let path = entry.path();
            if !path.is_file() || path.extension().map_or(true, |ext| ext != "json") {
                continue;
            }
            let Some(name) = path.file_stem().map(|s| s.to_string_lossy().to_string()) else {
                continue;
            };

            match read_template(&path) {
                Ok(definitions) => {
                    templates.insert(name, definitions);
                }
                Err(e) => {
                    warn!(file = %path.display(), error = %e, "skipping malformed template");
                }
            }
        }

        debug!(dir = %self.dir.display(), count = templates.len(), "templates loaded");
        templates
    }
}

/// Read one template file. Entries that are not a valid definition are
/// skipped; a file that is not a JSON array fails as a whole.
fn read_template(path: &Path) -> anyhow::Result<Vec<GraphDefinition>> {
    let content = fs::read_to_string(path)?;
    let entries: Vec<serde_json::Value> = serde_json::from_str(&content)?;

    let mut definitions = Vec::with_capacity(entries.len());
    for (position, entry) in entries.into_iter().enumerate() {
        match serde_json::from_value(entry) {
            Ok(definition) => definitions.push(definition),
            Err(e) => {
                warn!(file = %path.display(), position, error = %e, "skipping malformed graph definition");
            }
        }
    }
    Ok(definitions)
}

impl TemplateLibrary for DirTemplates {
    fn list_names(&self) -> Vec<String> {
        self.load().into_keys().collect()
    }

    fn get(&self, name: &str) -> Result<Vec<GraphDefinition>> {
        self.load()
            .remove(name)
            .filter(|defs| !defs.is_empty())
            .ok_or_else(|| GraphError::TemplateNotFound(name.to_string()))
    }
}
