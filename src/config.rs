//
//  config.rs
//  Component Graphs
//
//  Created by hak (tharun)
//

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::warn;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GraphsConfig {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub rewriter: RewriterConfig,
    #[serde(default)]
    pub templates: TemplatesConfig,
    #[serde(default)]
    pub locks: LockConfig,
}

/// Graph store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Store root directory (relative to the config file's directory).
    #[serde(default = "default_store_root")]
    pub root: String,
}

/// External query rewriter settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RewriterConfig {
    /// Rewriter executable. Defaults to `bin/<os>/promql-parser`.
    #[serde(default)]
    pub program: Option<String>,
    /// Extra leading arguments, e.g. a script path when `program` is a shell.
    #[serde(default)]
    pub args: Vec<String>,
    /// Execution deadline per query.
    #[serde(default = "default_rewrite_timeout_ms")]
    pub timeout_ms: u64,
}

/// Template library settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplatesConfig {
    /// Directory of `<name>.json` template files.
    #[serde(default = "default_templates_dir")]
    pub dir: String,
}

/// Component lock settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockConfig {
    /// How long a mutation waits for a busy component.
    #[serde(default = "default_lock_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_store_root() -> String {
    ".graphs".to_string()
}

fn default_rewrite_timeout_ms() -> u64 {
    5_000
}

fn default_templates_dir() -> String {
    "hack/component-graphs".to_string()
}

fn default_lock_timeout_ms() -> u64 {
    30_000
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            root: default_store_root(),
        }
    }
}

impl Default for RewriterConfig {
    fn default() -> Self {
        Self {
            program: None,
            args: Vec::new(),
            timeout_ms: default_rewrite_timeout_ms(),
        }
    }
}

impl Default for TemplatesConfig {
    fn default() -> Self {
        Self {
            dir: default_templates_dir(),
        }
    }
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_lock_timeout_ms(),
        }
    }
}

impl RewriterConfig {
    /// Configured program, or the bundled per-OS parser path.
    pub fn program(&self) -> PathBuf {
        match &self.program {
            Some(program) => PathBuf::from(program),
            None => Path::new("bin")
                .join(std::env::consts::OS)
                .join("promql-parser"),
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl LockConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl GraphsConfig {
    /// Load config from a TOML file, falling back to defaults.
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(contents) => toml::from_str(&contents).unwrap_or_else(|e| {
                warn!(path = %path.display(), error = %e, "invalid config, using defaults");
                Self::default()
            }),
            Err(_) => Self::default(),
        }
    }

    /// Resolve the store root relative to the config file's directory.
    pub fn resolve_store_root(&self, config_path: &Path) -> PathBuf {
        base_dir(config_path).join(&self.store.root)
    }

    /// Resolve the template directory relative to the config file's directory.
    pub fn resolve_templates_dir(&self, config_path: &Path) -> PathBuf {
        base_dir(config_path).join(&self.templates.dir)
    }
}

fn base_dir(config_path: &Path) -> &Path {
    config_path.parent().unwrap_or(config_path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_missing_file_uses_defaults() {
        let config = GraphsConfig::load(Path::new("/nonexistent/graphs.toml"));
        assert_eq!(config.rewriter.timeout(), Duration::from_secs(5));
        assert_eq!(config.locks.timeout(), Duration::from_secs(30));
        assert_eq!(config.store.root, ".graphs");
        assert!(config.rewriter.program().ends_with("promql-parser"));
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("graphs.toml");
        std::fs::write(
            &path,
            "[rewriter]\nprogram = \"/usr/local/bin/promql-parser\"\ntimeout_ms = 250\n",
        )
        .unwrap();

        let config = GraphsConfig::load(&path);
        assert_eq!(
            config.rewriter.program(),
            PathBuf::from("/usr/local/bin/promql-parser")
        );
        assert_eq!(config.rewriter.timeout(), Duration::from_millis(250));
        assert_eq!(config.templates.dir, "hack/component-graphs");
        assert_eq!(
            config.resolve_templates_dir(&path),
            dir.path().join("hack/component-graphs")
        );
    }

    #[test]
    fn test_invalid_file_falls_back() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("graphs.toml");
        std::fs::write(&path, "[rewriter\ntimeout_ms = ").unwrap();
        let config = GraphsConfig::load(&path);
        assert_eq!(config.rewriter.timeout_ms, 5_000);
    }
}
