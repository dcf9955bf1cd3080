//! The evolution pass: Delete → Modify → Insert, strictly in that order.
//!
//! Deletions first remove stale structure so re-routing and parent search
//! see a clean hierarchy; modifications precede insertions so a rerouted
//! entity is never shadowed by a freshly inserted duplicate. Within each
//! stage entities are processed ID-ascending.

use crate::cache::SemanticCache;
use crate::diff::{ChangedEntity, DiffParser, DiffResult};
use crate::error::EvolveError;
use crate::llm::{Describer, Embedder, cosine_similarity};
use crate::router::{SemanticRouter, token_jaccard};
use crate::semantic::{DEFAULT_SNIPPET_CAP, ExtractRequest, SemanticExtractor};
use crate::vcs::{GitCli, VcsProbe};
use repograph_core::model::{
    DependencyEdge, DependencyType, EntityKind, LowLevelNode, SemanticFeature,
    StructuralMetadata, normalize_path,
};
use repograph_core::{GraphError, RepoGraph};
use repograph_probe::imports::ImportRecord;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

/// Semantic extraction knobs.
#[derive(Debug, Clone)]
pub struct SemanticOptions {
    /// Source snippet cap for describer prompts, in characters.
    pub max_snippet_chars: usize,
}

impl Default for SemanticOptions {
    fn default() -> Self {
        Self {
            max_snippet_chars: DEFAULT_SNIPPET_CAP,
        }
    }
}

/// Cache knobs.
#[derive(Debug, Clone)]
pub struct CacheOptions {
    pub enabled: bool,
    /// Override location; defaults to `.rpg/cache/semantic.json`.
    pub path: Option<PathBuf>,
}

impl Default for CacheOptions {
    fn default() -> Self {
        Self {
            enabled: true,
            path: None,
        }
    }
}

/// One evolution pass, fully specified.
#[derive(Debug, Clone)]
pub struct EvolutionOptions {
    pub repo_path: PathBuf,
    pub commit_range: String,
    /// Drift strictly above this re-routes; at or below updates in place.
    pub drift_threshold: f64,
    pub use_llm: bool,
    pub include_source: bool,
    pub semantic: SemanticOptions,
    pub cache: CacheOptions,
}

impl EvolutionOptions {
    pub fn new(repo_path: impl Into<PathBuf>, commit_range: impl Into<String>) -> Self {
        Self {
            repo_path: repo_path.into(),
            commit_range: commit_range.into(),
            drift_threshold: 0.4,
            use_llm: false,
            include_source: false,
            semantic: SemanticOptions::default(),
            cache: CacheOptions::default(),
        }
    }
}

/// Counters reported by a pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EvolutionResult {
    pub inserted: usize,
    pub deleted: usize,
    pub modified: usize,
    pub rerouted: usize,
    pub pruned_nodes: usize,
    pub llm_calls: u64,
    pub duration_ms: u64,
}

/// External collaborators, all optional. `vcs` defaults to the resolved
/// git binary; a test harness injects a fake probe instead.
#[derive(Default)]
pub struct Externals {
    pub vcs: Option<Box<dyn VcsProbe>>,
    pub describer: Option<Arc<dyn Describer>>,
    pub embedder: Option<Arc<dyn Embedder>>,
    /// Checked between entities; partial mutations are not rolled back.
    pub cancel: Option<Arc<AtomicBool>>,
}

enum ModifyOutcome {
    Modified,
    Rerouted { pruned: usize },
    /// No existing node matched; treat the new side as an insertion.
    Deferred(ChangedEntity),
}

/// Reconciles the graph against a commit range.
pub struct Evolver {
    options: EvolutionOptions,
    vcs: Box<dyn VcsProbe>,
    extractor: SemanticExtractor,
    router: SemanticRouter,
    embedder: Option<Arc<dyn Embedder>>,
    cache: SemanticCache,
    cancel: Option<Arc<AtomicBool>>,
}

impl Evolver {
    pub fn new(options: EvolutionOptions, externals: Externals) -> Result<Self, EvolveError> {
        let vcs: Box<dyn VcsProbe> = match externals.vcs {
            Some(vcs) => vcs,
            None => Box::new(GitCli::locate()?),
        };
        let describer = if options.use_llm {
            externals.describer
        } else {
            None
        };
        let cache = if options.cache.enabled {
            match &options.cache.path {
                Some(path) => SemanticCache::at(path.clone()),
                None => SemanticCache::for_repo(&options.repo_path),
            }
        } else {
            SemanticCache::disabled()
        };
        Ok(Self {
            extractor: SemanticExtractor::new(describer.clone(), options.semantic.max_snippet_chars),
            router: SemanticRouter::new(externals.embedder.clone(), describer),
            embedder: externals.embedder,
            cache,
            cancel: externals.cancel,
            vcs,
            options,
        })
    }

    fn cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::Relaxed))
    }

    /// Run the full pass. Per-entity failures warn and continue; VCS and
    /// store failures abort.
    pub fn evolve(&mut self, graph: &mut RepoGraph) -> Result<EvolutionResult, EvolveError> {
        let started = Instant::now();
        let mut result = EvolutionResult::default();

        let diff = DiffParser::new(self.vcs.as_ref(), &self.options.repo_path)
            .parse(&self.options.commit_range)?;
        if diff.is_empty() {
            result.duration_ms = started.elapsed().as_millis() as u64;
            return Ok(result);
        }

        let DiffResult {
            mut insertions,
            mut deletions,
            mut modifications,
            file_imports,
        } = diff;
        deletions.sort_by(|a, b| a.id.cmp(&b.id));
        modifications.sort_by(|a, b| a.old.id.cmp(&b.old.id));

        tracing::info!(
            deletions = deletions.len(),
            modifications = modifications.len(),
            insertions = insertions.len(),
            range = %self.options.commit_range,
            "evolution pass starting"
        );

        // Stage 1: deletions, with upward orphan pruning.
        for entity in &deletions {
            if self.cancelled() {
                break;
            }
            match self.delete_node(graph, &entity.id) {
                Ok((removed, pruned)) => {
                    if removed {
                        result.deleted += 1;
                    }
                    result.pruned_nodes += pruned;
                }
                Err(GraphError::Store(e)) => return Err(e.into()),
                Err(GraphError::Invariant(e)) => {
                    tracing::warn!(entity = %entity.id, error = %e, "skipping deletion");
                }
            }
        }
        self.cache.flush();

        // Stage 2: modifications.
        let mut deferred: Vec<ChangedEntity> = Vec::new();
        for pair in &modifications {
            if self.cancelled() {
                break;
            }
            match self.modify_entity(graph, &pair.old, &pair.new, &file_imports) {
                Ok(ModifyOutcome::Modified) => result.modified += 1,
                Ok(ModifyOutcome::Rerouted { pruned }) => {
                    result.rerouted += 1;
                    result.pruned_nodes += pruned;
                }
                Ok(ModifyOutcome::Deferred(entity)) => deferred.push(entity),
                Err(GraphError::Store(e)) => return Err(e.into()),
                Err(GraphError::Invariant(e)) => {
                    tracing::warn!(entity = %pair.old.id, error = %e, "skipping modification");
                }
            }
        }
        self.cache.flush();

        // Stage 3: insertions (including modifications that lost their node).
        insertions.extend(deferred);
        insertions.sort_by(|a, b| a.id.cmp(&b.id));
        for entity in &insertions {
            if self.cancelled() {
                break;
            }
            match self.insert_entity(graph, entity, None, &file_imports) {
                Ok(()) => result.inserted += 1,
                Err(GraphError::Store(e)) => return Err(e.into()),
                Err(GraphError::Invariant(e)) => {
                    tracing::warn!(entity = %entity.id, error = %e, "skipping insertion");
                }
            }
        }
        self.cache.flush();

        result.llm_calls = self.router.llm_calls();
        result.duration_ms = started.elapsed().as_millis() as u64;
        tracing::info!(?result, "evolution pass complete");
        Ok(result)
    }

    /// Idempotent deletion: an absent ID prunes nothing and proceeds.
    /// Cascade removal, then walk upward removing high-level ancestors that
    /// lost their last child.
    fn delete_node(&self, graph: &mut RepoGraph, id: &str) -> Result<(bool, usize), GraphError> {
        if !graph.has_node(id) {
            return Ok((false, 0));
        }
        let parent = graph.parent(id);
        graph.remove_node(id)?;
        let pruned = self.prune_orphans(graph, parent)?;
        Ok((true, pruned))
    }

    fn prune_orphans(
        &self,
        graph: &mut RepoGraph,
        mut current: Option<String>,
    ) -> Result<usize, GraphError> {
        let mut pruned = 0;
        while let Some(id) = current {
            let Some(node) = graph.get_node(&id) else {
                break;
            };
            if !node.is_high_level() || !graph.children(&id).is_empty() {
                break;
            }
            let next = graph.parent(&id);
            graph.remove_node(&id)?;
            tracing::debug!(node = %id, "pruned orphaned high-level node");
            pruned += 1;
            current = next;
        }
        Ok(pruned)
    }

    fn modify_entity(
        &mut self,
        graph: &mut RepoGraph,
        old: &ChangedEntity,
        new: &ChangedEntity,
        file_imports: &BTreeMap<String, Vec<ImportRecord>>,
    ) -> Result<ModifyOutcome, GraphError> {
        let Some(node_id) = locate_node(graph, old) else {
            return Ok(ModifyOutcome::Deferred(new.clone()));
        };

        let new_feature = self.extract_feature(new);
        let old_feature = graph.get_node(&node_id).map(|n| n.feature().clone());
        let drift = compute_drift(
            old_feature.as_ref(),
            &new_feature,
            self.embedder.as_deref(),
        );

        if drift > self.options.drift_threshold {
            tracing::debug!(entity = %node_id, drift, "drift above threshold, re-routing");
            let parent = graph.parent(&node_id);
            graph.remove_node(&node_id)?;
            let pruned = self.prune_orphans(graph, parent)?;
            self.insert_entity(graph, new, Some(new_feature), file_imports)?;
            Ok(ModifyOutcome::Rerouted { pruned })
        } else {
            // In-place update: feature + metadata only, incident edges kept.
            let source_text = self
                .options
                .include_source
                .then(|| new.source_code.clone());
            let node = LowLevelNode {
                id: node_id,
                feature: new_feature,
                metadata: metadata_of(new),
                source_text,
            };
            graph.update_node(repograph_core::Node::LowLevel(node))?;
            Ok(ModifyOutcome::Modified)
        }
    }

    /// Insert one entity: extract → route → node + parent edge → imports.
    /// A failed parent edge reverts the node so no half-inserted entity
    /// survives.
    fn insert_entity(
        &mut self,
        graph: &mut RepoGraph,
        entity: &ChangedEntity,
        feature: Option<SemanticFeature>,
        file_imports: &BTreeMap<String, Vec<ImportRecord>>,
    ) -> Result<(), GraphError> {
        let feature = feature.unwrap_or_else(|| self.extract_feature(entity));
        let parent = self.router.find_best_parent(graph, feature.description());

        let mut node = LowLevelNode::new(feature, metadata_of(entity));
        if self.options.include_source {
            node = node.with_source(entity.source_code.clone());
        }
        let id = node.id.clone();
        graph.add_low_level_node(node)?;

        if let Some(parent_id) = parent {
            let sibling_order = graph.children(&parent_id).len() as u32;
            if let Err(e) = graph.add_functional_edge(&parent_id, &id, None, Some(sibling_order)) {
                let _ = graph.remove_node(&id);
                return Err(e);
            }
        }

        if entity.entity_type == EntityKind::File
            && let Some(imports) = file_imports.get(&normalize_path(&entity.file_path))
        {
            self.inject_import_edges(graph, &id, &entity.file_path, imports);
        }
        Ok(())
    }

    /// Resolve relative imports against the file's directory and add import
    /// edges to targets already in the graph. Self-edges and pre-existing
    /// edges are silently ignored.
    fn inject_import_edges(
        &self,
        graph: &mut RepoGraph,
        source_id: &str,
        file_path: &Path,
        imports: &[ImportRecord],
    ) {
        let directory = file_path.parent().unwrap_or_else(|| Path::new(""));
        for import in imports {
            let Some(resolved) = resolve_relative_module(directory, &import.module) else {
                continue;
            };
            for extension in [".ts", ".tsx", ".js", ".jsx", ".py", ""] {
                let candidate = format!("{resolved}{extension}");
                let target_id = format!("{candidate}:file:{candidate}");
                if !graph.has_node(&target_id) {
                    continue;
                }
                if target_id != source_id
                    && !graph.has_dependency_edge(source_id, &target_id, DependencyType::Import)
                    && let Err(e) = graph.add_dependency_edge(
                        DependencyEdge::new(source_id, target_id.clone(), DependencyType::Import)
                            .at_line(import.line),
                    )
                {
                    tracing::warn!(source = source_id, target = %target_id, error = %e, "skipping import edge");
                }
                break;
            }
        }
    }

    fn extract_feature(&mut self, entity: &ChangedEntity) -> SemanticFeature {
        // File-level qualified names are paths; only code entities have an
        // enclosing scope worth naming.
        let parent = (entity.entity_type != EntityKind::File)
            .then(|| entity.qualified_name.rsplit_once('.'))
            .flatten()
            .map(|(parent, _)| parent);
        let request = ExtractRequest {
            kind: entity.entity_type,
            name: &entity.entity_name,
            file_path: &entity.file_path,
            source_text: Some(&entity.source_code),
            parent_qualified_name: parent,
        };
        self.extractor.extract(&request, &mut self.cache)
    }
}

/// Exact ID, then prefix match `filePath:entityType:entityName` so that
/// positional IDs from initial encoding (`…:<startLine>`) still resolve.
fn locate_node(graph: &RepoGraph, entity: &ChangedEntity) -> Option<String> {
    if graph.has_node(&entity.id) {
        return Some(entity.id.clone());
    }
    let prefix = format!("{}:", entity.id);
    graph.node_ids().into_iter().find(|id| id.starts_with(&prefix))
}

fn metadata_of(entity: &ChangedEntity) -> StructuralMetadata {
    StructuralMetadata {
        file_path: entity.file_path.clone(),
        kind: entity.entity_type,
        qualified_name: entity.qualified_name.clone(),
        start_line: entity.start_line,
        end_line: entity.end_line,
    }
}

/// Semantic drift in `[0, 1]`.
///
/// With an embedder: `1 − cosine(embed(old.description), embed(new.description))`.
/// Otherwise keyword-set Jaccard distance; when both keyword sets are empty,
/// token Jaccard over the descriptions; when everything is empty, 0.
/// No old feature at all means full drift.
pub fn compute_drift(
    old: Option<&SemanticFeature>,
    new: &SemanticFeature,
    embedder: Option<&dyn Embedder>,
) -> f64 {
    let Some(old) = old else {
        return 1.0;
    };
    if let Some(embedder) = embedder {
        match (
            embedder.embed(old.description()),
            embedder.embed(new.description()),
        ) {
            (Ok(a), Ok(b)) => return (1.0 - cosine_similarity(&a, &b)).clamp(0.0, 1.0),
            _ => {
                tracing::warn!("embedder failed, falling back to keyword Jaccard for drift");
            }
        }
    }

    let old_keywords: std::collections::BTreeSet<String> =
        old.keywords().iter().map(|k| k.to_lowercase()).collect();
    let new_keywords: std::collections::BTreeSet<String> =
        new.keywords().iter().map(|k| k.to_lowercase()).collect();

    if old_keywords.is_empty() && new_keywords.is_empty() {
        let old_description = old.description().trim();
        let new_description = new.description().trim();
        if old_description.is_empty() && new_description.is_empty() {
            return 0.0;
        }
        return 1.0 - token_jaccard(old_description, new_description);
    }

    let intersection = old_keywords.intersection(&new_keywords).count() as f64;
    let union = old_keywords.union(&new_keywords).count() as f64;
    1.0 - intersection / union
}

/// Resolve a relative module specifier against a directory, lexically.
/// Returns `None` for absolute/bare specifiers or paths escaping the repo.
fn resolve_relative_module(directory: &Path, module: &str) -> Option<String> {
    let mut segments: Vec<String> = normalize_path(directory)
        .split('/')
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect();

    if module.starts_with("./") || module.starts_with("../") {
        for part in module.split('/') {
            match part {
                "." | "" => {}
                ".." => {
                    segments.pop()?;
                }
                other => segments.push(other.to_string()),
            }
        }
    } else if module.starts_with('.') {
        // Python-style: one leading dot is the same package, each extra dot
        // climbs a level; the remainder is a dotted path.
        let dots = module.chars().take_while(|c| *c == '.').count();
        for _ in 1..dots {
            segments.pop()?;
        }
        for part in module[dots..].split('.').filter(|p| !p.is_empty()) {
            segments.push(part.to_string());
        }
    } else {
        return None;
    }
    Some(segments.join("/"))
}
