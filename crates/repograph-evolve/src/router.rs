//! Semantic router: picks the best parent high-level node for a new entity.
//!
//! Similarity is embedding cosine when an Embedder is configured, token-set
//! Jaccard otherwise. An optional arbiter (the Describer acting as router)
//! may pick among the top-K candidates; its choice is only accepted if it
//! actually is one of them.

use crate::llm::{Describer, Embedder, RouteCandidate, cosine_similarity};
use repograph_core::RepoGraph;
use std::collections::BTreeSet;
use std::sync::Arc;

const TOP_K: usize = 5;

pub struct SemanticRouter {
    embedder: Option<Arc<dyn Embedder>>,
    arbiter: Option<Arc<dyn Describer>>,
    llm_calls: u64,
}

impl SemanticRouter {
    pub fn new(embedder: Option<Arc<dyn Embedder>>, arbiter: Option<Arc<dyn Describer>>) -> Self {
        Self {
            embedder,
            arbiter,
            llm_calls: 0,
        }
    }

    /// External arbiter calls made so far; exposed for statistics.
    pub fn llm_calls(&self) -> u64 {
        self.llm_calls
    }

    /// Choose a parent for the description, or `None` when the graph has no
    /// high-level nodes. Ties break by ascending parent ID.
    pub fn find_best_parent(&mut self, graph: &RepoGraph, description: &str) -> Option<String> {
        let parents = graph.high_level_nodes();
        if parents.is_empty() {
            return None;
        }

        let mut scored: Vec<(RouteCandidate, f64)> = Vec::with_capacity(parents.len());
        let embedded_query = self
            .embedder
            .as_ref()
            .and_then(|e| match e.embed(description) {
                Ok(v) => Some(v),
                Err(err) => {
                    tracing::warn!(error = %err, "embedder failed, falling back to token Jaccard");
                    None
                }
            });

        for parent in parents {
            let parent_description = parent.feature.description().to_string();
            let score = match (&embedded_query, &self.embedder) {
                (Some(query), Some(embedder)) => match embedder.embed(&parent_description) {
                    Ok(vector) => cosine_similarity(query, &vector),
                    Err(err) => {
                        tracing::warn!(error = %err, parent = %parent.id, "embedder failed on candidate, using token Jaccard");
                        token_jaccard(description, &parent_description)
                    }
                },
                _ => token_jaccard(description, &parent_description),
            };
            scored.push((
                RouteCandidate {
                    id: parent.id,
                    description: parent_description,
                },
                score,
            ));
        }

        // Candidates arrive ID-ascending; the stable sort keeps that order
        // for equal scores.
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(TOP_K);

        if let Some(arbiter) = &self.arbiter {
            let candidates: Vec<RouteCandidate> =
                scored.iter().map(|(c, _)| c.clone()).collect();
            self.llm_calls += 1;
            match arbiter.arbitrate(&candidates, description) {
                Ok(choice) if scored.iter().any(|(c, _)| c.id == choice) => {
                    return Some(choice);
                }
                Ok(choice) => {
                    tracing::warn!(choice, "arbiter picked outside the top-K, using top-ranked");
                }
                Err(err) => {
                    tracing::warn!(error = %err, "arbiter failed, using top-ranked candidate");
                }
            }
        }

        scored.into_iter().next().map(|(c, _)| c.id)
    }
}

/// Token-set Jaccard similarity over lower-cased whitespace tokens.
pub fn token_jaccard(a: &str, b: &str) -> f64 {
    let set_a: BTreeSet<String> = a.split_whitespace().map(str::to_lowercase).collect();
    let set_b: BTreeSet<String> = b.split_whitespace().map(str::to_lowercase).collect();
    if set_a.is_empty() && set_b.is_empty() {
        return 0.0;
    }
    let intersection = set_a.intersection(&set_b).count() as f64;
    let union = set_a.union(&set_b).count() as f64;
    intersection / union
}
