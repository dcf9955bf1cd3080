//! Operator configuration: `.rpg/config.json`.
//!
//! Load order: config file → environment variables → defaults.

use crate::schema::GraphConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Missing or invalid `.rpg/config.json`. Surfaced at the CLI only.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("no configuration at {0} (run `repograph init`)")]
    Missing(PathBuf),

    #[error("failed to read configuration: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid configuration: {0}")]
    Invalid(#[from] serde_json::Error),
}

/// Top-level repograph configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RpgConfig {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub root_path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub evolution: EvolutionConfig,
}

impl Default for RpgConfig {
    fn default() -> Self {
        Self {
            name: "repograph".to_string(),
            root_path: None,
            description: None,
            evolution: EvolutionConfig::default(),
        }
    }
}

/// Evolution pass configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EvolutionConfig {
    /// Drift above this threshold (strictly) re-routes a modified entity.
    pub drift_threshold: f64,
    /// Consult the configured language model for descriptions and routing.
    pub use_llm: bool,
    /// Store entity source text on low-level nodes.
    pub include_source: bool,
}

impl Default for EvolutionConfig {
    fn default() -> Self {
        Self {
            drift_threshold: 0.4,
            use_llm: false,
            include_source: false,
        }
    }
}

/// Helper to parse an env var and apply it to a config field.
fn env_override<T: std::str::FromStr>(var: &str, target: &mut T) {
    if let Ok(v) = std::env::var(var)
        && let Ok(n) = v.parse()
    {
        *target = n;
    }
}

impl RpgConfig {
    /// Load from `<root>/.rpg/config.json`, with env var overrides.
    pub fn load(project_root: &Path) -> Result<Self, ConfigError> {
        let path = crate::storage::config_file(project_root);
        if !path.exists() {
            return Err(ConfigError::Missing(path));
        }
        let content = std::fs::read_to_string(&path)?;
        let mut config: Self = serde_json::from_str(&content)?;

        env_override(
            "REPOGRAPH_DRIFT_THRESHOLD",
            &mut config.evolution.drift_threshold,
        );
        env_override("REPOGRAPH_USE_LLM", &mut config.evolution.use_llm);
        env_override(
            "REPOGRAPH_INCLUDE_SOURCE",
            &mut config.evolution.include_source,
        );

        Ok(config)
    }

    /// Write to `<root>/.rpg/config.json`, creating the directory.
    pub fn save(&self, project_root: &Path) -> Result<(), ConfigError> {
        let path = crate::storage::config_file(project_root);
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        std::fs::write(&path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    /// The envelope identity block for this configuration.
    pub fn graph_config(&self) -> GraphConfig {
        GraphConfig {
            name: self.name.clone(),
            root_path: self.root_path.clone(),
            description: self.description.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = RpgConfig::default();
        assert_eq!(config.evolution.drift_threshold, 0.4);
        assert!(!config.evolution.use_llm);
        assert!(!config.evolution.include_source);
    }

    #[test]
    fn test_load_missing_is_config_error() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(matches!(
            RpgConfig::load(tmp.path()),
            Err(ConfigError::Missing(_))
        ));
    }

    #[test]
    fn test_save_load_roundtrip() {
        let tmp = tempfile::tempdir().unwrap();
        let mut config = RpgConfig::default();
        config.name = "demo".to_string();
        config.evolution.drift_threshold = 0.6;
        config.save(tmp.path()).unwrap();

        let loaded = RpgConfig::load(tmp.path()).unwrap();
        assert_eq!(loaded.name, "demo");
        assert_eq!(loaded.evolution.drift_threshold, 0.6);
    }

    #[test]
    fn test_invalid_json_is_config_error() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join(".rpg");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("config.json"), "{not json").unwrap();
        assert!(matches!(
            RpgConfig::load(tmp.path()),
            Err(ConfigError::Invalid(_))
        ));
    }
}
