//! Store configuration
//!
//! Loaded from a JSON file. Every field except `engine` has a default.
//!
//! ```json
//! {
//!   "engine": { "kind": "file", "data_dir": "/var/lib/taxiidb" },
//!   "initial_snapshot": "/etc/taxiidb/default_data.json",
//!   "clear_on_start": false,
//!   "interop_ordering": true,
//!   "empty_root_policy": "per_root",
//!   "max_page_size": 100
//! }
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::errors::{StoreError, StoreResult};

/// Physical engine selection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum EngineConfig {
    Memory,
    File { data_dir: PathBuf },
}

/// When the consistency check treats an API root without objects as fatal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmptyRootPolicy {
    /// Every API root must hold at least one object
    #[default]
    PerRoot,
    /// Only a store with no objects at all is rejected
    Aggregate,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    pub engine: EngineConfig,

    /// Snapshot loaded at startup
    #[serde(default)]
    pub initial_snapshot: Option<PathBuf>,

    /// Wipe a non-empty store before loading the snapshot
    #[serde(default)]
    pub clear_on_start: bool,

    /// List collections ascending by id
    #[serde(default)]
    pub interop_ordering: bool,

    #[serde(default)]
    pub empty_root_policy: EmptyRootPolicy,

    /// Upper bound on any requested page
    #[serde(default = "default_max_page_size")]
    pub max_page_size: usize,
}

fn default_max_page_size() -> usize {
    1000
}

impl StoreConfig {
    /// In-memory store with every default.
    pub fn memory() -> Self {
        Self {
            engine: EngineConfig::Memory,
            initial_snapshot: None,
            clear_on_start: false,
            interop_ordering: false,
            empty_root_policy: EmptyRootPolicy::default(),
            max_page_size: default_max_page_size(),
        }
    }

    pub fn with_snapshot(mut self, path: impl Into<PathBuf>) -> Self {
        self.initial_snapshot = Some(path.into());
        self
    }

    /// Loads and validates a config file.
    ///
    /// Relative paths inside the file resolve against its directory.
    pub fn load(path: &Path) -> StoreResult<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| StoreError::Config(format!("failed to read {}: {}", path.display(), e)))?;

        let mut config: StoreConfig = serde_json::from_str(&content)
            .map_err(|e| StoreError::Config(format!("invalid config JSON: {}", e)))?;

        if let Some(base) = path.parent() {
            config.resolve_paths(base);
        }
        config.validate()?;
        Ok(config)
    }

    fn resolve_paths(&mut self, base: &Path) {
        if let EngineConfig::File { data_dir } = &mut self.engine {
            if data_dir.is_relative() {
                *data_dir = base.join(&*data_dir);
            }
        }
        if let Some(snapshot) = &mut self.initial_snapshot {
            if snapshot.is_relative() {
                *snapshot = base.join(&*snapshot);
            }
        }
    }

    pub fn validate(&self) -> StoreResult<()> {
        if self.max_page_size == 0 {
            return Err(StoreError::Config("max_page_size must be > 0".to_string()));
        }
        if let EngineConfig::File { data_dir } = &self.engine {
            if data_dir.as_os_str().is_empty() {
                return Err(StoreError::Config("engine.data_dir must not be empty".to_string()));
            }
        }
        if self.clear_on_start && self.initial_snapshot.is_none() {
            return Err(StoreError::Config(
                "clear_on_start requires initial_snapshot".to_string(),
            ));
        }
        Ok(())
    }
}
