//! Syntax probe: parses a source buffer under a named grammar and yields
//! entity descriptors, import records, and call sites.
//!
//! The probe never fails: unsupported language tags and parse failures both
//! yield empty results, and the caller treats the file as opaque.

pub mod calls;
pub mod entities;
pub mod imports;
pub mod languages;

pub use calls::CallSite;
pub use entities::{EntityRecord, ProbeResult, probe};
pub use imports::{ImportKind, ImportRecord};
pub use languages::{Grammar, Language};
