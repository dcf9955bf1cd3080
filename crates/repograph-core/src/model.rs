//! Graph data model for the Repository Planning Graph (RPG).
//!
//! The graph is dual-view: high-level nodes form the architectural hierarchy,
//! low-level nodes are the code entities, and edges split into functional
//! (containment) and dependency (import/call/inherit) relations. Nodes are
//! referenced by canonical string IDs; edges hold IDs, never direct handles,
//! so cyclic dependency structures are representable.

use crate::error::GraphInvariantError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Closed set of intent tags a semantic feature may carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentTag {
    Behavior,
    Data,
    Control,
    Io,
    Util,
}

/// A natural-language description of a node plus its keyword set.
///
/// Value object: validated on construction and immutable afterwards.
/// Deserialization goes through the same validation, so a graph loaded from
/// JSON cannot contain an empty description or blank keywords.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "FeatureRepr")]
pub struct SemanticFeature {
    description: String,
    keywords: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    intent: Option<IntentTag>,
}

#[derive(Deserialize)]
struct FeatureRepr {
    description: String,
    #[serde(default)]
    keywords: Vec<String>,
    #[serde(default)]
    intent: Option<IntentTag>,
}

impl TryFrom<FeatureRepr> for SemanticFeature {
    type Error = GraphInvariantError;

    fn try_from(repr: FeatureRepr) -> Result<Self, Self::Error> {
        let mut feature = SemanticFeature::new(repr.description, repr.keywords)?;
        feature.intent = repr.intent;
        Ok(feature)
    }
}

impl SemanticFeature {
    /// Build a feature, rejecting empty descriptions and blank keywords.
    pub fn new(
        description: impl Into<String>,
        keywords: Vec<String>,
    ) -> Result<Self, GraphInvariantError> {
        let description = description.into();
        if description.trim().is_empty() {
            return Err(GraphInvariantError::InvalidFeature(
                "description must be non-empty".to_string(),
            ));
        }
        if keywords.iter().any(|k| k.trim().is_empty()) {
            return Err(GraphInvariantError::InvalidFeature(
                "keywords must be non-empty".to_string(),
            ));
        }
        Ok(Self {
            description,
            keywords,
            intent: None,
        })
    }

    pub fn with_intent(mut self, intent: IntentTag) -> Self {
        self.intent = Some(intent);
        self
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn keywords(&self) -> &[String] {
        &self.keywords
    }

    pub fn intent(&self) -> Option<IntentTag> {
        self.intent
    }
}

/// The kind of code entity a low-level node models.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    File,
    Class,
    Function,
    Method,
    Module,
}

impl EntityKind {
    /// Stable lowercase form used inside canonical node IDs.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::File => "file",
            Self::Class => "class",
            Self::Function => "function",
            Self::Method => "method",
            Self::Module => "module",
        }
    }
}

/// Structural metadata attached to every low-level node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StructuralMetadata {
    /// Repo-relative file path of the entity.
    pub file_path: PathBuf,
    pub kind: EntityKind,
    /// Dotted qualified name (enclosing scopes joined with `.`).
    pub qualified_name: String,
    /// 1-indexed inclusive start line, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_line: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_line: Option<u32>,
}

/// Architectural node: a directory, module grouping, or logical area.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HighLevelNode {
    pub id: String,
    pub feature: SemanticFeature,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub directory_path: Option<PathBuf>,
}

impl HighLevelNode {
    pub fn new(id: impl Into<String>, feature: SemanticFeature) -> Self {
        Self {
            id: id.into(),
            feature,
            directory_path: None,
        }
    }

    /// Build a directory-group node with the canonical `<dir>:dir` ID.
    pub fn for_directory(directory: impl AsRef<Path>, feature: SemanticFeature) -> Self {
        let directory = directory.as_ref();
        Self {
            id: directory_id(directory),
            feature,
            directory_path: Some(directory.to_path_buf()),
        }
    }
}

/// Implementation node: a file, class, function, method, or module.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LowLevelNode {
    pub id: String,
    pub feature: SemanticFeature,
    pub metadata: StructuralMetadata,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_text: Option<String>,
}

impl LowLevelNode {
    /// Build a node with the evolution-style ID (no line suffix), so that
    /// line churn does not change identity.
    pub fn new(feature: SemanticFeature, metadata: StructuralMetadata) -> Self {
        let id = entity_id(&metadata.file_path, metadata.kind, &metadata.qualified_name);
        Self {
            id,
            feature,
            metadata,
            source_text: None,
        }
    }

    /// Build a node with the positional ID (`…:<startLine>`), as produced by
    /// initial encoding. Falls back to the line-less form when the metadata
    /// carries no start line.
    pub fn with_positional_id(feature: SemanticFeature, metadata: StructuralMetadata) -> Self {
        let id = match metadata.start_line {
            Some(line) => format!(
                "{}:{}",
                entity_id(&metadata.file_path, metadata.kind, &metadata.qualified_name),
                line
            ),
            None => entity_id(&metadata.file_path, metadata.kind, &metadata.qualified_name),
        };
        Self {
            id,
            feature,
            metadata,
            source_text: None,
        }
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source_text = Some(source.into());
        self
    }
}

/// A graph node: tagged union over the two views.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "nodeType", rename_all = "snake_case")]
pub enum Node {
    HighLevel(HighLevelNode),
    LowLevel(LowLevelNode),
}

impl Node {
    pub fn id(&self) -> &str {
        match self {
            Self::HighLevel(n) => &n.id,
            Self::LowLevel(n) => &n.id,
        }
    }

    pub fn feature(&self) -> &SemanticFeature {
        match self {
            Self::HighLevel(n) => &n.feature,
            Self::LowLevel(n) => &n.feature,
        }
    }

    pub fn is_high_level(&self) -> bool {
        matches!(self, Self::HighLevel(_))
    }

    pub fn as_high_level(&self) -> Option<&HighLevelNode> {
        match self {
            Self::HighLevel(n) => Some(n),
            Self::LowLevel(_) => None,
        }
    }

    pub fn as_low_level(&self) -> Option<&LowLevelNode> {
        match self {
            Self::LowLevel(n) => Some(n),
            Self::HighLevel(_) => None,
        }
    }
}

/// The kind of relationship a dependency edge models.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DependencyType {
    Import,
    Call,
    Inherit,
    Implement,
    Use,
}

impl DependencyType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Import => "import",
            Self::Call => "call",
            Self::Inherit => "inherit",
            Self::Implement => "implement",
            Self::Use => "use",
        }
    }
}

/// Hierarchy edge: parent high-level node → child.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionalEdge {
    pub source: String,
    pub target: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sibling_order: Option<u32>,
}

/// Dependency edge: import, call, inheritance, or use relation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DependencyEdge {
    pub source: String,
    pub target: String,
    pub dependency_type: DependencyType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_runtime: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
}

impl DependencyEdge {
    pub fn new(
        source: impl Into<String>,
        target: impl Into<String>,
        dependency_type: DependencyType,
    ) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            dependency_type,
            is_runtime: None,
            line: None,
        }
    }

    pub fn at_line(mut self, line: u32) -> Self {
        self.line = Some(line);
        self
    }
}

/// A graph edge: tagged union over the two relation families.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "edgeType", rename_all = "snake_case")]
pub enum Edge {
    Functional(FunctionalEdge),
    Dependency(DependencyEdge),
}

impl Edge {
    pub fn source(&self) -> &str {
        match self {
            Self::Functional(e) => &e.source,
            Self::Dependency(e) => &e.source,
        }
    }

    pub fn target(&self) -> &str {
        match self {
            Self::Functional(e) => &e.target,
            Self::Dependency(e) => &e.target,
        }
    }

    pub fn is_functional(&self) -> bool {
        matches!(self, Self::Functional(_))
    }

    pub fn as_functional(&self) -> Option<&FunctionalEdge> {
        match self {
            Self::Functional(e) => Some(e),
            Self::Dependency(_) => None,
        }
    }

    pub fn as_dependency(&self) -> Option<&DependencyEdge> {
        match self {
            Self::Dependency(e) => Some(e),
            Self::Functional(_) => None,
        }
    }
}

/// Render a path with forward slashes and without a leading `./`.
/// Canonical IDs must not vary across platforms.
pub fn normalize_path(path: &Path) -> String {
    let mut parts: Vec<&str> = Vec::new();
    for component in path.components() {
        if let std::path::Component::Normal(s) = component
            && let Some(s) = s.to_str()
        {
            parts.push(s);
        }
    }
    parts.join("/")
}

/// Canonical ID for a low-level entity: `<filePath>:<entityType>:<entityName>`.
pub fn entity_id(file_path: &Path, kind: EntityKind, qualified_name: &str) -> String {
    format!(
        "{}:{}:{}",
        normalize_path(file_path),
        kind.as_str(),
        qualified_name
    )
}

/// Canonical ID for a high-level directory node: `<directoryPath>:dir`.
pub fn directory_id(directory: &Path) -> String {
    format!("{}:dir", normalize_path(directory))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_feature_rejects_empty_description() {
        assert!(SemanticFeature::new("", vec![]).is_err());
        assert!(SemanticFeature::new("   ", vec![]).is_err());
    }

    #[test]
    fn test_feature_rejects_blank_keyword() {
        assert!(SemanticFeature::new("ok", vec![String::new()]).is_err());
    }

    #[test]
    fn test_feature_deserialization_validates() {
        let err = serde_json::from_str::<SemanticFeature>(r#"{"description": ""}"#);
        assert!(err.is_err());
        let ok: SemanticFeature =
            serde_json::from_str(r#"{"description": "parses config", "keywords": ["config"]}"#)
                .unwrap();
        assert_eq!(ok.description(), "parses config");
        assert_eq!(ok.keywords(), ["config".to_string()]);
    }

    #[test]
    fn test_node_tagging() {
        let feature = SemanticFeature::new("entry point", vec![]).unwrap();
        let node = Node::LowLevel(LowLevelNode::new(
            feature,
            StructuralMetadata {
                file_path: PathBuf::from("src/main.ts"),
                kind: EntityKind::Function,
                qualified_name: "main".to_string(),
                start_line: Some(1),
                end_line: Some(10),
            },
        ));
        let json = serde_json::to_value(&node).unwrap();
        assert_eq!(json["nodeType"], "low_level");
        assert_eq!(json["id"], "src/main.ts:function:main");
        assert_eq!(json["metadata"]["filePath"], "src/main.ts");
        assert_eq!(json["metadata"]["startLine"], 1);
    }

    #[test]
    fn test_edge_tagging() {
        let edge = Edge::Dependency(DependencyEdge::new("a", "b", DependencyType::Import));
        let json = serde_json::to_value(&edge).unwrap();
        assert_eq!(json["edgeType"], "dependency");
        assert_eq!(json["dependencyType"], "import");
    }

    #[test]
    fn test_positional_id_includes_line() {
        let feature = SemanticFeature::new("helper", vec![]).unwrap();
        let node = LowLevelNode::with_positional_id(
            feature,
            StructuralMetadata {
                file_path: PathBuf::from("src/util.py"),
                kind: EntityKind::Function,
                qualified_name: "helper".to_string(),
                start_line: Some(42),
                end_line: Some(50),
            },
        );
        assert_eq!(node.id, "src/util.py:function:helper:42");
    }

    #[test]
    fn test_directory_id() {
        assert_eq!(directory_id(Path::new("src/auth")), "src/auth:dir");
    }
}
