//! Error taxonomy for the evolution engine.

use repograph_core::StoreError;
use thiserror::Error;

/// Version-control subprocess failure, timeout, or malformed output.
/// Fatal: surfaced by the CLI as exit code 2.
#[derive(Debug, Error)]
pub enum VcsError {
    #[error("failed to locate the VCS binary: {0}")]
    BinaryNotFound(String),

    #[error("failed to launch `{command}`: {source}")]
    Launch {
        command: String,
        source: std::io::Error,
    },

    #[error("`{command}` timed out after {seconds}s")]
    Timeout { command: String, seconds: u64 },

    #[error("`{command}` failed: {stderr}")]
    Command { command: String, stderr: String },

    #[error("malformed VCS output: {0}")]
    Malformed(String),
}

/// Describer or Embedder failure. Non-fatal: every call site falls back to
/// the deterministic heuristic.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("model request failed: {0}")]
    Http(String),

    #[error("model API returned {status}: {body}")]
    Api { status: u16, body: String },

    #[error("failed to parse model response: {0}")]
    Parse(String),

    #[error("empty model response")]
    Empty,
}

/// Fatal failure of an evolution pass. Per-entity failures are logged and
/// absorbed; these abort.
#[derive(Debug, Error)]
pub enum EvolveError {
    #[error(transparent)]
    Vcs(#[from] VcsError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<repograph_core::GraphError> for EvolveError {
    fn from(e: repograph_core::GraphError) -> Self {
        match e {
            repograph_core::GraphError::Store(s) => Self::Store(s),
            // Invariant violations escaping to this level indicate a logic
            // error in a stage, not an I/O problem; map them onto a corrupt
            // store condition so they abort loudly.
            repograph_core::GraphError::Invariant(i) => {
                Self::Store(StoreError::Corrupt(i.to_string()))
            }
        }
    }
}
