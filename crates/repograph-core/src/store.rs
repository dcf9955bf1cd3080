//! Storage interface for the RPG plus the in-memory reference implementation.
//!
//! The store is defined by [`GraphStore`]; relational or document back-ends
//! implement the same trait. [`MemoryStore`] keeps nodes in a `BTreeMap` so
//! every enumeration is ID-ascending, which is the deterministic tie-break
//! the query contracts require.

use crate::error::StoreError;
use crate::model::{DependencyType, Edge, Node};
use crate::schema::{self, GraphConfig, GraphDocument};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Filter for edge queries: one of the two relation families.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeClass {
    Functional,
    Dependency,
}

impl EdgeClass {
    fn matches(self, edge: &Edge) -> bool {
        match self {
            Self::Functional => edge.is_functional(),
            Self::Dependency => !edge.is_functional(),
        }
    }
}

/// A ranked hit from [`GraphStore::search_by_feature`].
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureHit {
    pub id: String,
    pub score: f64,
}

/// Aggregate node/edge counts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphStats {
    pub nodes: usize,
    pub high_level_nodes: usize,
    pub low_level_nodes: usize,
    pub edges: usize,
    pub functional_edges: usize,
    pub dependency_edges: usize,
}

/// Persistence contract for the RPG.
///
/// Operations are atomic with respect to observable state: a failing
/// mutation leaves the store exactly as it was.
pub trait GraphStore {
    fn add_node(&mut self, node: Node) -> Result<(), StoreError>;
    fn has_node(&self, id: &str) -> bool;
    fn get_node(&self, id: &str) -> Option<Node>;
    /// Replace a node's payload under an existing ID.
    fn update_node(&mut self, node: Node) -> Result<(), StoreError>;
    /// Remove a node and every edge incident on it (CASCADE).
    /// Returns whether the node existed.
    fn remove_node(&mut self, id: &str) -> Result<bool, StoreError>;
    fn add_edge(&mut self, edge: Edge) -> Result<(), StoreError>;
    fn out_edges(&self, id: &str, class: Option<EdgeClass>) -> Vec<Edge>;
    fn in_edges(&self, id: &str, class: Option<EdgeClass>) -> Vec<Edge>;
    /// Targets of functional out-edges.
    fn children(&self, id: &str) -> Vec<String>;
    /// Source of the at-most-one functional in-edge.
    fn parent(&self, id: &str) -> Option<String>;
    /// Targets of dependency out-edges.
    fn dependencies(&self, id: &str) -> Vec<String>;
    /// Sources of dependency in-edges.
    fn dependents(&self, id: &str) -> Vec<String>;
    /// Kahn order over dependency edges, dependencies first; cycle members
    /// are released smallest-ID-first.
    fn topological_order(&self) -> Vec<String>;
    /// Best-effort ranked search over descriptions and keywords.
    fn search_by_feature(&self, query: &str) -> Vec<FeatureHit>;
    /// Glob match over low-level file paths and high-level directory paths.
    fn search_by_path(&self, glob: &str) -> Result<Vec<String>, StoreError>;
    fn stats(&self) -> GraphStats;
    fn node_ids(&self) -> Vec<String>;
    fn nodes(&self) -> Vec<Node>;
    fn edges(&self) -> Vec<Edge>;
    fn export_json(&self, config: &GraphConfig) -> Result<String, StoreError>;
    fn import_json(&mut self, payload: &str) -> Result<(), StoreError>;
    fn close(&mut self) -> Result<(), StoreError>;
}

/// Reference implementation: ID-indexed arena in memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    nodes: BTreeMap<String, Node>,
    edges: Vec<Edge>,
    closed: bool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn ensure_open(&self) -> Result<(), StoreError> {
        if self.closed {
            return Err(StoreError::Closed);
        }
        Ok(())
    }
}

impl GraphStore for MemoryStore {
    fn add_node(&mut self, node: Node) -> Result<(), StoreError> {
        self.ensure_open()?;
        self.nodes.insert(node.id().to_string(), node);
        Ok(())
    }

    fn has_node(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    fn get_node(&self, id: &str) -> Option<Node> {
        self.nodes.get(id).cloned()
    }

    fn update_node(&mut self, node: Node) -> Result<(), StoreError> {
        self.ensure_open()?;
        self.nodes.insert(node.id().to_string(), node);
        Ok(())
    }

    fn remove_node(&mut self, id: &str) -> Result<bool, StoreError> {
        self.ensure_open()?;
        if self.nodes.remove(id).is_none() {
            return Ok(false);
        }
        self.edges.retain(|e| e.source() != id && e.target() != id);
        Ok(true)
    }

    fn add_edge(&mut self, edge: Edge) -> Result<(), StoreError> {
        self.ensure_open()?;
        self.edges.push(edge);
        Ok(())
    }

    fn out_edges(&self, id: &str, class: Option<EdgeClass>) -> Vec<Edge> {
        self.edges
            .iter()
            .filter(|e| e.source() == id && class.is_none_or(|c| c.matches(e)))
            .cloned()
            .collect()
    }

    fn in_edges(&self, id: &str, class: Option<EdgeClass>) -> Vec<Edge> {
        self.edges
            .iter()
            .filter(|e| e.target() == id && class.is_none_or(|c| c.matches(e)))
            .cloned()
            .collect()
    }

    fn children(&self, id: &str) -> Vec<String> {
        self.edges
            .iter()
            .filter(|e| e.is_functional() && e.source() == id)
            .map(|e| e.target().to_string())
            .collect()
    }

    fn parent(&self, id: &str) -> Option<String> {
        self.edges
            .iter()
            .find(|e| e.is_functional() && e.target() == id)
            .map(|e| e.source().to_string())
    }

    fn dependencies(&self, id: &str) -> Vec<String> {
        self.edges
            .iter()
            .filter(|e| !e.is_functional() && e.source() == id)
            .map(|e| e.target().to_string())
            .collect()
    }

    fn dependents(&self, id: &str) -> Vec<String> {
        self.edges
            .iter()
            .filter(|e| !e.is_functional() && e.target() == id)
            .map(|e| e.source().to_string())
            .collect()
    }

    fn topological_order(&self) -> Vec<String> {
        // Pending dependency count per node; when a node's dependencies are
        // all placed, it becomes ready. Import graphs may legitimately cycle,
        // so a stall releases the smallest-ID stuck node instead of aborting.
        let mut pending: BTreeMap<&str, usize> = self.nodes.keys().map(|id| (id.as_str(), 0)).collect();
        let mut dependents_of: HashMap<&str, Vec<&str>> = HashMap::new();
        for edge in &self.edges {
            if edge.is_functional() {
                continue;
            }
            let (source, target) = (edge.source(), edge.target());
            if !self.nodes.contains_key(source) || !self.nodes.contains_key(target) {
                continue;
            }
            *pending.entry(source).or_insert(0) += 1;
            dependents_of.entry(target).or_default().push(source);
        }

        let mut ready: BTreeSet<&str> = pending
            .iter()
            .filter(|(_, n)| **n == 0)
            .map(|(id, _)| *id)
            .collect();
        let mut placed: BTreeSet<&str> = BTreeSet::new();
        let mut order = Vec::with_capacity(self.nodes.len());

        while order.len() < self.nodes.len() {
            let next = match ready.pop_first() {
                Some(id) => id,
                None => {
                    // Cycle: force-release the smallest stuck ID.
                    match pending
                        .iter()
                        .find(|(id, n)| **n > 0 && !placed.contains(*id))
                        .map(|(id, _)| *id)
                    {
                        Some(id) => id,
                        None => break,
                    }
                }
            };
            if !placed.insert(next) {
                continue;
            }
            order.push(next.to_string());
            if let Some(dependents) = dependents_of.get(next) {
                for &dependent in dependents {
                    if let Some(n) = pending.get_mut(dependent) {
                        *n = n.saturating_sub(1);
                        if *n == 0 && !placed.contains(dependent) {
                            ready.insert(dependent);
                        }
                    }
                }
            }
        }
        order
    }

    fn search_by_feature(&self, query: &str) -> Vec<FeatureHit> {
        let query_lower = query.to_lowercase();
        let query_tokens = tokenize(&query_lower);
        if query_tokens.is_empty() {
            return Vec::new();
        }

        let mut hits = Vec::new();
        for (id, node) in &self.nodes {
            let feature = node.feature();
            let description = feature.description().to_lowercase();
            let description_tokens = tokenize(&description);
            let keyword_tokens: BTreeSet<String> =
                feature.keywords().iter().map(|k| k.to_lowercase()).collect();

            let keyword_overlap = query_tokens.intersection(&keyword_tokens).count() as f64;
            let description_overlap =
                query_tokens.intersection(&description_tokens).count() as f64;
            let fuzzy = strsim::jaro_winkler(&query_lower, &description);

            let score = keyword_overlap * 2.0 + description_overlap + fuzzy;
            if keyword_overlap + description_overlap > 0.0 || fuzzy > 0.7 {
                hits.push(FeatureHit {
                    id: id.clone(),
                    score,
                });
            }
        }
        // Rank descending, ties ID-ascending (BTreeMap already yields IDs in
        // ascending order, and the sort is stable).
        hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        hits
    }

    fn search_by_path(&self, glob: &str) -> Result<Vec<String>, StoreError> {
        let matcher = globset::Glob::new(glob)
            .map_err(|e| StoreError::Glob(e.to_string()))?
            .compile_matcher();
        let mut out = Vec::new();
        for (id, node) in &self.nodes {
            let matched = match node {
                Node::LowLevel(n) => matcher.is_match(&n.metadata.file_path),
                Node::HighLevel(n) => n
                    .directory_path
                    .as_ref()
                    .is_some_and(|p| matcher.is_match(p)),
            };
            if matched {
                out.push(id.clone());
            }
        }
        Ok(out)
    }

    fn stats(&self) -> GraphStats {
        let high_level_nodes = self.nodes.values().filter(|n| n.is_high_level()).count();
        let functional_edges = self.edges.iter().filter(|e| e.is_functional()).count();
        GraphStats {
            nodes: self.nodes.len(),
            high_level_nodes,
            low_level_nodes: self.nodes.len() - high_level_nodes,
            edges: self.edges.len(),
            functional_edges,
            dependency_edges: self.edges.len() - functional_edges,
        }
    }

    fn node_ids(&self) -> Vec<String> {
        self.nodes.keys().cloned().collect()
    }

    fn nodes(&self) -> Vec<Node> {
        self.nodes.values().cloned().collect()
    }

    fn edges(&self) -> Vec<Edge> {
        self.edges.clone()
    }

    fn export_json(&self, config: &GraphConfig) -> Result<String, StoreError> {
        let document = GraphDocument::new(config.clone(), self.nodes(), self.edges());
        schema::to_json(&document)
    }

    fn import_json(&mut self, payload: &str) -> Result<(), StoreError> {
        self.ensure_open()?;
        let document = schema::from_json(payload)?;
        let mut nodes = BTreeMap::new();
        for node in document.nodes {
            if nodes.insert(node.id().to_string(), node).is_some() {
                return Err(StoreError::Corrupt("duplicate node id in payload".to_string()));
            }
        }
        for edge in &document.edges {
            if !nodes.contains_key(edge.source()) || !nodes.contains_key(edge.target()) {
                return Err(StoreError::Corrupt(format!(
                    "dangling edge `{}` -> `{}`",
                    edge.source(),
                    edge.target()
                )));
            }
        }
        self.nodes = nodes;
        self.edges = document.edges;
        Ok(())
    }

    fn close(&mut self) -> Result<(), StoreError> {
        self.closed = true;
        Ok(())
    }
}

/// Lowercased whitespace/punctuation tokens of length ≥ 2.
fn tokenize(text: &str) -> BTreeSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.len() >= 2)
        .map(str::to_lowercase)
        .collect()
}

/// Existing `(source, target, dependencyType)` check used by the facade for
/// multi-edge rejection.
pub fn has_dependency_edge(
    store: &dyn GraphStore,
    source: &str,
    target: &str,
    dependency_type: DependencyType,
) -> bool {
    store
        .out_edges(source, Some(EdgeClass::Dependency))
        .iter()
        .filter_map(Edge::as_dependency)
        .any(|e| e.target == target && e.dependency_type == dependency_type)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{
        DependencyEdge, EntityKind, LowLevelNode, SemanticFeature, StructuralMetadata,
    };
    use std::path::PathBuf;

    fn low(id_file: &str, name: &str) -> Node {
        Node::LowLevel(LowLevelNode::new(
            SemanticFeature::new(format!("function {name} in {id_file}"), vec![]).unwrap(),
            StructuralMetadata {
                file_path: PathBuf::from(id_file),
                kind: EntityKind::Function,
                qualified_name: name.to_string(),
                start_line: None,
                end_line: None,
            },
        ))
    }

    fn dep(source: &str, target: &str) -> Edge {
        Edge::Dependency(DependencyEdge::new(source, target, DependencyType::Import))
    }

    #[test]
    fn test_topological_order_dependencies_first() {
        let mut store = MemoryStore::new();
        store.add_node(low("a.ts", "fa")).unwrap();
        store.add_node(low("b.ts", "fb")).unwrap();
        store.add_node(low("c.ts", "fc")).unwrap();
        // a depends on b, b depends on c
        store.add_edge(dep("a.ts:function:fa", "b.ts:function:fb")).unwrap();
        store.add_edge(dep("b.ts:function:fb", "c.ts:function:fc")).unwrap();

        let order = store.topological_order();
        let index = |id: &str| order.iter().position(|x| x == id).unwrap();
        assert!(index("c.ts:function:fc") < index("b.ts:function:fb"));
        assert!(index("b.ts:function:fb") < index("a.ts:function:fa"));
    }

    #[test]
    fn test_topological_order_tolerates_cycle() {
        let mut store = MemoryStore::new();
        store.add_node(low("a.ts", "fa")).unwrap();
        store.add_node(low("b.ts", "fb")).unwrap();
        store.add_edge(dep("a.ts:function:fa", "b.ts:function:fb")).unwrap();
        store.add_edge(dep("b.ts:function:fb", "a.ts:function:fa")).unwrap();

        let order = store.topological_order();
        assert_eq!(order.len(), 2);
        // Cycle members released smallest-ID-first.
        assert_eq!(order[0], "a.ts:function:fa");
    }

    #[test]
    fn test_remove_node_cascades() {
        let mut store = MemoryStore::new();
        store.add_node(low("a.ts", "fa")).unwrap();
        store.add_node(low("b.ts", "fb")).unwrap();
        store.add_edge(dep("a.ts:function:fa", "b.ts:function:fb")).unwrap();

        assert!(store.remove_node("b.ts:function:fb").unwrap());
        assert!(store.edges().is_empty());
        assert!(!store.remove_node("b.ts:function:fb").unwrap());
    }

    #[test]
    fn test_closed_store_rejects_mutation() {
        let mut store = MemoryStore::new();
        store.close().unwrap();
        assert!(matches!(
            store.add_node(low("a.ts", "fa")),
            Err(StoreError::Closed)
        ));
    }

    #[test]
    fn test_search_by_path_glob() {
        let mut store = MemoryStore::new();
        store.add_node(low("src/auth/login.ts", "login")).unwrap();
        store.add_node(low("src/db/pool.ts", "pool")).unwrap();

        let hits = store.search_by_path("src/auth/**").unwrap();
        assert_eq!(hits, vec!["src/auth/login.ts:function:login".to_string()]);
        assert!(store.search_by_path("[bad").is_err());
    }

    #[test]
    fn test_search_by_feature_ranks_keyword_hits_higher() {
        let mut store = MemoryStore::new();
        let mk = |file: &str, name: &str, desc: &str, kw: &[&str]| {
            Node::LowLevel(LowLevelNode::new(
                SemanticFeature::new(desc, kw.iter().map(|s| s.to_string()).collect()).unwrap(),
                StructuralMetadata {
                    file_path: PathBuf::from(file),
                    kind: EntityKind::Function,
                    qualified_name: name.to_string(),
                    start_line: None,
                    end_line: None,
                },
            ))
        };
        store
            .add_node(mk("a.ts", "fa", "validates session tokens", &["session", "token"]))
            .unwrap();
        store
            .add_node(mk("b.ts", "fb", "renders the session list", &[]))
            .unwrap();

        let hits = store.search_by_feature("session token");
        assert_eq!(hits[0].id, "a.ts:function:fa");
        assert!(hits.len() >= 2);
    }
}
