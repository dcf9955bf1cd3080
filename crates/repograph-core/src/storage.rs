//! On-disk layout and graph file I/O.
//!
//! Everything lives under `<repo>/.rpg/`: `graph.json` is the canonical
//! artifact, `local/graph.json` the branch-local working copy, and
//! `local/state.json` records what the local copy is synchronized to.
//! `.rpg/local/` is expected to be untracked.

use crate::error::StoreError;
use crate::facade::RepoGraph;
use crate::schema::GraphConfig;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

const RPG_DIR: &str = ".rpg";
const GRAPH_FILE: &str = "graph.json";
const STATE_FILE: &str = "state.json";
const CONFIG_FILE: &str = "config.json";

pub fn rpg_dir(project_root: &Path) -> PathBuf {
    project_root.join(RPG_DIR)
}

/// Canonical graph artifact: `.rpg/graph.json`.
pub fn graph_file(project_root: &Path) -> PathBuf {
    rpg_dir(project_root).join(GRAPH_FILE)
}

pub fn local_dir(project_root: &Path) -> PathBuf {
    rpg_dir(project_root).join("local")
}

/// Branch-local graph copy: `.rpg/local/graph.json`.
pub fn local_graph_file(project_root: &Path) -> PathBuf {
    local_dir(project_root).join(GRAPH_FILE)
}

/// Sync bookkeeping: `.rpg/local/state.json`.
pub fn state_file(project_root: &Path) -> PathBuf {
    local_dir(project_root).join(STATE_FILE)
}

pub fn config_file(project_root: &Path) -> PathBuf {
    rpg_dir(project_root).join(CONFIG_FILE)
}

pub fn cache_dir(project_root: &Path) -> PathBuf {
    rpg_dir(project_root).join("cache")
}

/// Load a graph from a serialized envelope on disk.
pub fn load_graph(path: &Path) -> Result<RepoGraph, StoreError> {
    let json = fs::read_to_string(path)?;
    let mut store = crate::store::MemoryStore::new();
    use crate::store::GraphStore as _;
    store.import_json(&json)?;
    Ok(RepoGraph::with_store(Box::new(store)))
}

/// Save a graph atomically: write to a sibling temp file, then rename.
/// A crashed writer never leaves a truncated `graph.json` behind.
pub fn save_graph(path: &Path, graph: &RepoGraph, config: &GraphConfig) -> Result<(), StoreError> {
    let json = graph
        .to_json(config)
        .map_err(|e| match e {
            crate::error::GraphError::Store(s) => s,
            crate::error::GraphError::Invariant(i) => StoreError::Corrupt(i.to_string()),
        })?;
    write_atomic(path, json.as_bytes())
}

/// Write-to-temp + rename within the target's directory.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), StoreError> {
    let dir = path
        .parent()
        .ok_or_else(|| StoreError::Corrupt(format!("no parent directory for {}", path.display())))?;
    fs::create_dir_all(dir)?;
    let tmp = dir.join(format!(
        ".{}.tmp",
        path.file_name()
            .and_then(|n| n.to_str())
            .unwrap_or(GRAPH_FILE)
    ));
    fs::write(&tmp, bytes)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

/// What the local graph copy is synchronized to.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncState {
    /// 40-hex commit the local graph reflects.
    pub base_commit: String,
    pub branch: String,
    pub last_sync: DateTime<Utc>,
}

impl SyncState {
    pub fn now(base_commit: impl Into<String>, branch: impl Into<String>) -> Self {
        Self {
            base_commit: base_commit.into(),
            branch: branch.into(),
            last_sync: Utc::now(),
        }
    }

    pub fn load(project_root: &Path) -> Result<Option<Self>, StoreError> {
        let path = state_file(project_root);
        if !path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(path)?;
        Ok(Some(serde_json::from_str(&content)?))
    }

    pub fn save(&self, project_root: &Path) -> Result<(), StoreError> {
        write_atomic(
            &state_file(project_root),
            serde_json::to_string_pretty(self)?.as_bytes(),
        )
    }
}
