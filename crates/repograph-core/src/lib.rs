//! Core types and storage for the Repository Planning Graph (RPG).
//!
//! Provides the dual-view graph model ([`model::Node`], [`model::Edge`]),
//! the storage interface and its in-memory reference implementation
//! ([`store::GraphStore`], [`store::MemoryStore`]), the invariant-enforcing
//! facade ([`facade::RepoGraph`]), the versioned JSON envelope, and the
//! on-disk `.rpg/` layout.

pub mod config;
pub mod error;
pub mod facade;
pub mod model;
pub mod schema;
pub mod storage;
pub mod store;

pub use error::{GraphError, GraphInvariantError, StoreError};
pub use facade::RepoGraph;
pub use model::{
    DependencyEdge, DependencyType, Edge, EntityKind, FunctionalEdge, HighLevelNode, IntentTag,
    LowLevelNode, Node, SemanticFeature, StructuralMetadata,
};
pub use schema::GraphConfig;
pub use store::{EdgeClass, FeatureHit, GraphStats, GraphStore, MemoryStore};
