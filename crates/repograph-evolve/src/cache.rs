//! Persistent semantic extraction cache.
//!
//! Lazy-loaded on first access, flushed at stage completion, written
//! atomically (temp + rename). The cache is advisory, never authoritative:
//! load and flush failures degrade to warnings, and concurrent writers
//! race last-write-wins.

use repograph_core::model::{EntityKind, SemanticFeature};
use repograph_core::storage::write_atomic;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// SHA-256 cache key over the extraction inputs.
pub fn cache_key(kind: EntityKind, name: &str, file_path: &Path, source_text: Option<&str>) -> String {
    let mut hasher = Sha256::new();
    hasher.update(kind.as_str());
    hasher.update([0]);
    hasher.update(name);
    hasher.update([0]);
    hasher.update(repograph_core::model::normalize_path(file_path));
    hasher.update([0]);
    hasher.update(source_text.unwrap_or(""));
    format!("{:x}", hasher.finalize())
}

pub struct SemanticCache {
    path: Option<PathBuf>,
    entries: Option<BTreeMap<String, SemanticFeature>>,
    dirty: bool,
}

impl SemanticCache {
    /// A cache that never touches disk.
    pub fn disabled() -> Self {
        Self {
            path: None,
            entries: Some(BTreeMap::new()),
            dirty: false,
        }
    }

    pub fn at(path: PathBuf) -> Self {
        Self {
            path: Some(path),
            entries: None,
            dirty: false,
        }
    }

    /// The default on-disk location: `.rpg/cache/semantic.json`.
    pub fn for_repo(repo: &Path) -> Self {
        Self::at(repograph_core::storage::cache_dir(repo).join("semantic.json"))
    }

    fn entries(&mut self) -> &mut BTreeMap<String, SemanticFeature> {
        if self.entries.is_none() {
            let loaded = self
                .path
                .as_ref()
                .and_then(|path| std::fs::read_to_string(path).ok())
                .and_then(|json| match serde_json::from_str(&json) {
                    Ok(entries) => Some(entries),
                    Err(e) => {
                        tracing::warn!(error = %e, "ignoring unreadable semantic cache");
                        None
                    }
                })
                .unwrap_or_default();
            self.entries = Some(loaded);
        }
        self.entries.as_mut().expect("entries just populated")
    }

    pub fn get(&mut self, key: &str) -> Option<SemanticFeature> {
        self.entries().get(key).cloned()
    }

    pub fn put(&mut self, key: String, feature: SemanticFeature) {
        self.entries().insert(key, feature);
        self.dirty = true;
    }

    /// Atomic write-out; failures warn because the cache is advisory.
    pub fn flush(&mut self) {
        if !self.dirty {
            return;
        }
        let Some(path) = self.path.clone() else {
            return;
        };
        let entries = self.entries();
        match serde_json::to_string_pretty(entries) {
            Ok(json) => match write_atomic(&path, json.as_bytes()) {
                Ok(()) => self.dirty = false,
                Err(e) => tracing::warn!(error = %e, "failed to flush semantic cache"),
            },
            Err(e) => tracing::warn!(error = %e, "failed to serialize semantic cache"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feature(desc: &str) -> SemanticFeature {
        SemanticFeature::new(desc, vec!["kw".to_string()]).unwrap()
    }

    #[test]
    fn test_cache_key_changes_with_source() {
        let a = cache_key(EntityKind::Function, "f", Path::new("a.ts"), Some("v1"));
        let b = cache_key(EntityKind::Function, "f", Path::new("a.ts"), Some("v2"));
        assert_ne!(a, b);
        assert_eq!(
            a,
            cache_key(EntityKind::Function, "f", Path::new("a.ts"), Some("v1"))
        );
    }

    #[test]
    fn test_flush_and_reload() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("cache").join("semantic.json");

        let mut cache = SemanticCache::at(path.clone());
        cache.put("k1".to_string(), feature("cached description"));
        cache.flush();
        assert!(path.exists());

        let mut reloaded = SemanticCache::at(path);
        let hit = reloaded.get("k1").unwrap();
        assert_eq!(hit.description(), "cached description");
        assert!(reloaded.get("k2").is_none());
    }

    #[test]
    fn test_corrupt_cache_is_ignored() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("semantic.json");
        std::fs::write(&path, "{broken").unwrap();

        let mut cache = SemanticCache::at(path);
        assert!(cache.get("anything").is_none());
    }

    #[test]
    fn test_disabled_cache_never_writes() {
        let mut cache = SemanticCache::disabled();
        cache.put("k".to_string(), feature("d"));
        cache.flush();
        assert!(cache.get("k").is_some());
    }
}
