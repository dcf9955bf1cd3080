//! Error taxonomy for the graph model and store.

use thiserror::Error;

/// Violation of a graph integrity constraint. Fatal within a single
/// operation; the caller decides whether to continue with the next one.
#[derive(Debug, Error)]
pub enum GraphInvariantError {
    #[error("duplicate node id `{0}`")]
    DuplicateNode(String),

    #[error("node `{0}` does not exist")]
    MissingNode(String),

    #[error("edge endpoint `{0}` does not exist")]
    MissingEndpoint(String),

    #[error("dependency edge on `{0}` would be a self-loop")]
    SelfLoop(String),

    #[error("duplicate dependency edge `{source_id}` -> `{target}` ({dependency_type})")]
    DuplicateDependency {
        source_id: String,
        target: String,
        dependency_type: &'static str,
    },

    #[error("node `{0}` already has a parent")]
    SecondParent(String),

    #[error("functional edge `{source_id}` -> `{target}` would create a cycle")]
    HierarchyCycle { source_id: String, target: String },

    #[error("invalid semantic feature: {0}")]
    InvalidFeature(String),
}

/// I/O or transactional failure at the storage layer. Fatal: aborts the
/// surrounding pass.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store is closed")]
    Closed,

    #[error("I/O failure: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization failure: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("unsupported graph version `{found}` (current `{current}`)")]
    Version { found: String, current: String },

    #[error("invalid glob pattern `{0}`")]
    Glob(String),

    #[error("corrupt graph payload: {0}")]
    Corrupt(String),
}

/// Any failure surfaced by the graph facade.
#[derive(Debug, Error)]
pub enum GraphError {
    #[error(transparent)]
    Invariant(#[from] GraphInvariantError),

    #[error(transparent)]
    Store(#[from] StoreError),
}
