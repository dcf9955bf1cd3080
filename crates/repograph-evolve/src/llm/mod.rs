//! Capability interfaces for external models, plus HTTP-backed providers.
//!
//! Both interfaces are optional: every call site in the engine has a
//! deterministic fallback (template description + identifier-split keywords;
//! token-set Jaccard similarity), so the system runs end-to-end offline.

mod providers;

pub use providers::{HttpDescriber, HttpEmbedder, LlmClient, LlmProvider};

use crate::error::ModelError;
use repograph_core::model::EntityKind;
use std::path::Path;

/// What the Describer is asked about.
#[derive(Debug, Clone)]
pub struct DescribeRequest<'a> {
    pub kind: EntityKind,
    pub name: &'a str,
    pub file_path: &'a Path,
    /// Already capped by the caller (~2000 tokens at 4 chars/token).
    pub source_snippet: Option<&'a str>,
    pub parent: Option<&'a str>,
}

/// A described entity: natural-language description plus keywords.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct Description {
    pub description: String,
    #[serde(default)]
    pub keywords: Vec<String>,
}

/// A parent candidate offered to the routing arbiter.
#[derive(Debug, Clone)]
pub struct RouteCandidate {
    pub id: String,
    pub description: String,
}

/// External description model. Also acts as the Semantic Router's arbiter.
pub trait Describer: Send + Sync {
    fn describe(&self, request: &DescribeRequest<'_>) -> Result<Description, ModelError>;

    /// Pick one of the candidate IDs for the given entity description.
    fn arbitrate(
        &self,
        candidates: &[RouteCandidate],
        description: &str,
    ) -> Result<String, ModelError>;
}

/// External embedding model. Vector dimension is provider-fixed and
/// constant within a run.
pub trait Embedder: Send + Sync {
    fn embed(&self, text: &str) -> Result<Vec<f32>, ModelError>;
}

/// L2-normalize a vector in place.
pub(crate) fn normalize_l2(v: &mut [f32]) {
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
}

/// Cosine similarity of two vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        f64::from(dot / (norm_a * norm_b))
    }
}

/// Parse a JSON payload out of a model response, tolerating markdown code
/// fences around it.
pub(crate) fn parse_json_response<T: serde::de::DeserializeOwned>(
    text: &str,
) -> Result<T, ModelError> {
    let trimmed = text.trim();
    let json = if trimmed.starts_with('{') || trimmed.starts_with('[') {
        trimmed
    } else if let Some(start) = text.find("```") {
        let after = &text[start + 3..];
        let after = after.strip_prefix("json").unwrap_or(after);
        match after.find("```") {
            Some(end) => after[..end].trim(),
            None => trimmed,
        }
    } else {
        trimmed
    };
    serde_json::from_str(json).map_err(|e| ModelError::Parse(e.to_string()))
}
