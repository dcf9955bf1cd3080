//! Semantic extraction: produce a [`SemanticFeature`] for a code entity.
//!
//! With a Describer configured, the model is consulted under a capped
//! prompt; otherwise (or on any model failure) a deterministic heuristic
//! applies, so extraction never fails.

use crate::cache::{SemanticCache, cache_key};
use crate::llm::{DescribeRequest, Describer};
use repograph_core::model::{EntityKind, SemanticFeature};
use std::path::Path;
use std::sync::Arc;

/// ~2000 tokens at ≈ 4 chars/token.
pub const DEFAULT_SNIPPET_CAP: usize = 8000;

/// What to extract a feature for.
#[derive(Debug, Clone)]
pub struct ExtractRequest<'a> {
    pub kind: EntityKind,
    pub name: &'a str,
    pub file_path: &'a Path,
    pub source_text: Option<&'a str>,
    pub parent_qualified_name: Option<&'a str>,
}

pub struct SemanticExtractor {
    describer: Option<Arc<dyn Describer>>,
    max_snippet_chars: usize,
}

impl SemanticExtractor {
    pub fn new(describer: Option<Arc<dyn Describer>>, max_snippet_chars: usize) -> Self {
        Self {
            describer,
            max_snippet_chars,
        }
    }

    /// Extract a feature, consulting the cache first. The cache is keyed by
    /// SHA-256 of `(kind, name, filePath, sourceText)`.
    pub fn extract(
        &self,
        request: &ExtractRequest<'_>,
        cache: &mut SemanticCache,
    ) -> SemanticFeature {
        let key = cache_key(
            request.kind,
            request.name,
            request.file_path,
            request.source_text,
        );
        if let Some(hit) = cache.get(&key) {
            return hit;
        }
        let feature = self.extract_uncached(request);
        cache.put(key, feature.clone());
        feature
    }

    fn extract_uncached(&self, request: &ExtractRequest<'_>) -> SemanticFeature {
        if let Some(describer) = &self.describer {
            let snippet = request
                .source_text
                .map(|s| truncate_chars(s, self.max_snippet_chars));
            let describe = DescribeRequest {
                kind: request.kind,
                name: request.name,
                file_path: request.file_path,
                source_snippet: snippet.as_deref(),
                parent: request.parent_qualified_name,
            };
            match describer.describe(&describe) {
                Ok(described) => {
                    let keywords = described
                        .keywords
                        .into_iter()
                        .map(|k| k.trim().to_lowercase())
                        .filter(|k| k.len() >= 2)
                        .collect();
                    match SemanticFeature::new(described.description, keywords) {
                        Ok(feature) => return feature,
                        Err(e) => {
                            tracing::warn!(error = %e, entity = request.name, "describer returned an invalid feature, using heuristic");
                        }
                    }
                }
                Err(e) => {
                    tracing::warn!(error = %e, entity = request.name, "describer failed, using heuristic");
                }
            }
        }
        heuristic_feature(request)
    }
}

/// Deterministic fallback: templated description, identifier-split keywords.
pub fn heuristic_feature(request: &ExtractRequest<'_>) -> SemanticFeature {
    let description = format!(
        "{} {} in {}",
        request.kind.as_str(),
        request.name,
        repograph_core::model::normalize_path(request.file_path)
    );
    let keywords = split_identifier(request.name);
    SemanticFeature::new(description, keywords)
        .expect("templated description is never empty")
}

/// Split an identifier into lowercase fragments: camelCase humps and
/// snake_case segments, deduplicated, length ≥ 2.
pub fn split_identifier(name: &str) -> Vec<String> {
    let mut fragments: Vec<String> = Vec::new();
    for chunk in name.split(|c: char| !c.is_alphanumeric()) {
        let chars: Vec<char> = chunk.chars().collect();
        let mut current = String::new();
        for (i, &c) in chars.iter().enumerate() {
            let hump = c.is_uppercase()
                && i > 0
                && (chars[i - 1].is_lowercase()
                    || chars[i - 1].is_ascii_digit()
                    || chars.get(i + 1).is_some_and(|n| n.is_lowercase()));
            if hump && !current.is_empty() {
                fragments.push(current.clone());
                current.clear();
            }
            current.extend(c.to_lowercase());
        }
        if !current.is_empty() {
            fragments.push(current);
        }
    }
    let mut seen = std::collections::HashSet::new();
    fragments.retain(|f| f.len() >= 2 && seen.insert(f.clone()));
    fragments
}

fn truncate_chars(text: &str, cap: usize) -> String {
    if text.len() <= cap {
        return text.to_string();
    }
    let mut end = cap;
    while end > 0 && !text.is_char_boundary(end) {
        end -= 1;
    }
    text[..end].to_string()
}
