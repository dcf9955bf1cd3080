//! Typed facade over the graph store.
//!
//! All mutations go through here so the §3 invariants hold at the API
//! boundary: IDs are unique, edge endpoints exist, every node has at most
//! one parent, and the functional subgraph stays a forest. The facade never
//! silently ignores a missing ID on mutation; idempotent deletion is an
//! Evolver-layer policy, not a store property.

use crate::error::{GraphError, GraphInvariantError, StoreError};
use crate::model::{DependencyEdge, Edge, FunctionalEdge, HighLevelNode, LowLevelNode, Node};
use crate::schema::GraphConfig;
use crate::store::{self, EdgeClass, FeatureHit, GraphStats, GraphStore, MemoryStore};

/// The Repository Planning Graph, bound to a concrete store.
pub struct RepoGraph {
    store: Box<dyn GraphStore>,
}

impl RepoGraph {
    /// Empty graph over the in-memory reference store.
    pub fn in_memory() -> Self {
        Self::with_store(Box::new(MemoryStore::new()))
    }

    pub fn with_store(store: Box<dyn GraphStore>) -> Self {
        Self { store }
    }

    /// Load a graph from a serialized envelope into a fresh in-memory store.
    pub fn from_json(payload: &str) -> Result<Self, GraphError> {
        let mut store = MemoryStore::new();
        store.import_json(payload)?;
        Ok(Self::with_store(Box::new(store)))
    }

    pub fn to_json(&self, config: &GraphConfig) -> Result<String, GraphError> {
        Ok(self.store.export_json(config)?)
    }

    fn insert_node(&mut self, node: Node) -> Result<(), GraphError> {
        if self.store.has_node(node.id()) {
            return Err(GraphInvariantError::DuplicateNode(node.id().to_string()).into());
        }
        self.store.add_node(node)?;
        Ok(())
    }

    pub fn add_high_level_node(&mut self, node: HighLevelNode) -> Result<(), GraphError> {
        self.insert_node(Node::HighLevel(node))
    }

    pub fn add_low_level_node(&mut self, node: LowLevelNode) -> Result<(), GraphError> {
        self.insert_node(Node::LowLevel(node))
    }

    /// Add a hierarchy edge `parent → child`.
    ///
    /// Rejects dangling endpoints, a second parent for the target, and any
    /// edge that would cycle the functional subgraph.
    pub fn add_functional_edge(
        &mut self,
        source: &str,
        target: &str,
        level: Option<u32>,
        sibling_order: Option<u32>,
    ) -> Result<(), GraphError> {
        self.ensure_endpoint(source)?;
        self.ensure_endpoint(target)?;
        if self.store.parent(target).is_some() {
            return Err(GraphInvariantError::SecondParent(target.to_string()).into());
        }
        // A cycle would need `target` to already be an ancestor of `source`.
        let mut ancestor = Some(source.to_string());
        while let Some(current) = ancestor {
            if current == target {
                return Err(GraphInvariantError::HierarchyCycle {
                    source_id: source.to_string(),
                    target: target.to_string(),
                }
                .into());
            }
            ancestor = self.store.parent(&current);
        }
        self.store.add_edge(Edge::Functional(FunctionalEdge {
            source: source.to_string(),
            target: target.to_string(),
            level,
            sibling_order,
        }))?;
        Ok(())
    }

    /// Add a dependency edge, rejecting self-loops and `(source, target,
    /// dependencyType)` multi-edges.
    pub fn add_dependency_edge(&mut self, edge: DependencyEdge) -> Result<(), GraphError> {
        self.ensure_endpoint(&edge.source)?;
        self.ensure_endpoint(&edge.target)?;
        if edge.source == edge.target {
            return Err(GraphInvariantError::SelfLoop(edge.source).into());
        }
        if self.has_dependency_edge(&edge.source, &edge.target, edge.dependency_type) {
            return Err(GraphInvariantError::DuplicateDependency {
                source_id: edge.source,
                target: edge.target,
                dependency_type: edge.dependency_type.as_str(),
            }
            .into());
        }
        self.store.add_edge(Edge::Dependency(edge))?;
        Ok(())
    }

    pub fn has_dependency_edge(
        &self,
        source: &str,
        target: &str,
        dependency_type: crate::model::DependencyType,
    ) -> bool {
        store::has_dependency_edge(self.store.as_ref(), source, target, dependency_type)
    }

    /// Replace an existing node's payload. The ID must already be present.
    pub fn update_node(&mut self, node: Node) -> Result<(), GraphError> {
        if !self.store.has_node(node.id()) {
            return Err(GraphInvariantError::MissingNode(node.id().to_string()).into());
        }
        self.store.update_node(node)?;
        Ok(())
    }

    /// Remove a node and cascade its incident edges.
    pub fn remove_node(&mut self, id: &str) -> Result<(), GraphError> {
        if !self.store.remove_node(id)? {
            return Err(GraphInvariantError::MissingNode(id.to_string()).into());
        }
        Ok(())
    }

    fn ensure_endpoint(&self, id: &str) -> Result<(), GraphInvariantError> {
        if self.store.has_node(id) {
            Ok(())
        } else {
            Err(GraphInvariantError::MissingEndpoint(id.to_string()))
        }
    }

    pub fn has_node(&self, id: &str) -> bool {
        self.store.has_node(id)
    }

    pub fn get_node(&self, id: &str) -> Option<Node> {
        self.store.get_node(id)
    }

    pub fn children(&self, id: &str) -> Vec<String> {
        self.store.children(id)
    }

    pub fn parent(&self, id: &str) -> Option<String> {
        self.store.parent(id)
    }

    pub fn dependencies(&self, id: &str) -> Vec<String> {
        self.store.dependencies(id)
    }

    pub fn dependents(&self, id: &str) -> Vec<String> {
        self.store.dependents(id)
    }

    pub fn out_edges(&self, id: &str, class: Option<EdgeClass>) -> Vec<Edge> {
        self.store.out_edges(id, class)
    }

    pub fn in_edges(&self, id: &str, class: Option<EdgeClass>) -> Vec<Edge> {
        self.store.in_edges(id, class)
    }

    /// All high-level nodes, ID-ascending.
    pub fn high_level_nodes(&self) -> Vec<HighLevelNode> {
        self.store
            .nodes()
            .into_iter()
            .filter_map(|n| match n {
                Node::HighLevel(h) => Some(h),
                Node::LowLevel(_) => None,
            })
            .collect()
    }

    pub fn node_ids(&self) -> Vec<String> {
        self.store.node_ids()
    }

    pub fn topological_order(&self) -> Vec<String> {
        self.store.topological_order()
    }

    pub fn search_by_feature(&self, query: &str) -> Vec<FeatureHit> {
        self.store.search_by_feature(query)
    }

    pub fn search_by_path(&self, glob: &str) -> Result<Vec<String>, GraphError> {
        Ok(self.store.search_by_path(glob)?)
    }

    pub fn stats(&self) -> GraphStats {
        self.store.stats()
    }

    pub fn close(&mut self) -> Result<(), StoreError> {
        self.store.close()
    }
}
