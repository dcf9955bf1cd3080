//! Evolution engine for the Repository Planning Graph.
//!
//! Given a commit range, reconciles the graph against the new repository
//! state: parses the structural diff, schedules deletions → modifications →
//! insertions, measures semantic drift per modified entity, re-routes
//! drifted entities to new parents, and injects dependency edges for newly
//! imported neighbors.

pub mod cache;
pub mod diff;
pub mod error;
pub mod evolver;
pub mod llm;
pub mod router;
pub mod semantic;
pub mod vcs;

pub use diff::{ChangedEntity, DiffParser, DiffResult, ModifiedPair};
pub use error::{EvolveError, ModelError, VcsError};
pub use evolver::{EvolutionOptions, EvolutionResult, Evolver, Externals};
pub use llm::{Describer, Description, Embedder};
pub use vcs::{GitCli, VcsProbe};
