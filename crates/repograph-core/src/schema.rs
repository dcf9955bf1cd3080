//! Versioned JSON envelope for graph persistence.

use crate::error::StoreError;
use crate::model::{Edge, Node};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Current envelope schema version.
pub const SCHEMA_VERSION: &str = "1.0.0";

/// Identity block carried in the envelope.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphConfig {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub root_path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// The serialized graph: version tag, config, and flat node/edge lists.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphDocument {
    pub version: String,
    pub config: GraphConfig,
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
}

impl GraphDocument {
    pub fn new(config: GraphConfig, nodes: Vec<Node>, edges: Vec<Edge>) -> Self {
        Self {
            version: SCHEMA_VERSION.to_string(),
            config,
            nodes,
            edges,
        }
    }
}

/// Serialize a document to pretty-printed JSON.
pub fn to_json(document: &GraphDocument) -> Result<String, StoreError> {
    Ok(serde_json::to_string_pretty(document)?)
}

/// Deserialize a document, accepting any payload with the same major version.
pub fn from_json(json: &str) -> Result<GraphDocument, StoreError> {
    let document: GraphDocument = serde_json::from_str(json)?;
    let found = semver::Version::parse(&document.version).map_err(|_| StoreError::Version {
        found: document.version.clone(),
        current: SCHEMA_VERSION.to_string(),
    })?;
    let current = semver::Version::parse(SCHEMA_VERSION).expect("schema version is valid semver");
    if found.major != current.major {
        return Err(StoreError::Version {
            found: document.version.clone(),
            current: SCHEMA_VERSION.to_string(),
        });
    }
    Ok(document)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_major_mismatch() {
        let json = r#"{"version": "2.0.0", "config": {"name": "x"}, "nodes": [], "edges": []}"#;
        assert!(matches!(
            from_json(json),
            Err(StoreError::Version { .. })
        ));
    }

    #[test]
    fn test_accepts_minor_drift() {
        let json = r#"{"version": "1.4.2", "config": {"name": "x"}, "nodes": [], "edges": []}"#;
        assert!(from_json(json).is_ok());
    }

    #[test]
    fn test_rejects_garbage_version() {
        let json = r#"{"version": "not-semver", "config": {"name": "x"}, "nodes": [], "edges": []}"#;
        assert!(from_json(json).is_err());
    }
}
