use repograph_core::model::{
    EntityKind, HighLevelNode, LowLevelNode, SemanticFeature, StructuralMetadata,
};
use repograph_core::RepoGraph;
use repograph_evolve::error::VcsError;
use repograph_evolve::evolver::{EvolutionOptions, Evolver, Externals};
use repograph_evolve::vcs::VcsProbe;
use repograph_core::model::normalize_path;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

struct FakeVcs {
    name_status: String,
    files: HashMap<(String, String), String>,
}

impl FakeVcs {
    fn new(name_status: &str) -> Self {
        Self {
            name_status: name_status.to_string(),
            files: HashMap::new(),
        }
    }

    fn file(mut self, rev: &str, path: &str, content: &str) -> Self {
        self.files
            .insert((rev.to_string(), path.to_string()), content.to_string());
        self
    }
}

impl VcsProbe for FakeVcs {
    fn head_sha(&self, _repo: &Path) -> Result<String, VcsError> {
        Ok("b".repeat(40))
    }

    fn current_branch(&self, _repo: &Path) -> Result<String, VcsError> {
        Ok("feature/x".to_string())
    }

    fn default_branch(&self, _repo: &Path) -> Result<String, VcsError> {
        Ok("main".to_string())
    }

    fn merge_base(&self, _repo: &Path, a: &str, _b: &str) -> Result<String, VcsError> {
        Ok(a.to_string())
    }

    fn name_status(&self, _repo: &Path, _range: &str) -> Result<String, VcsError> {
        Ok(self.name_status.clone())
    }

    fn file_at_revision(
        &self,
        _repo: &Path,
        rev: &str,
        path: &Path,
    ) -> Result<Option<Vec<u8>>, VcsError> {
        Ok(self
            .files
            .get(&(rev.to_string(), normalize_path(path)))
            .map(|s| s.clone().into_bytes()))
    }
}

fn evolver(vcs: FakeVcs) -> Evolver {
    evolver_with_threshold(vcs, 0.4)
}

fn evolver_with_threshold(vcs: FakeVcs, threshold: f64) -> Evolver {
    let mut options = EvolutionOptions::new("/fake/repo", "base..head");
    options.drift_threshold = threshold;
    options.cache.enabled = false;
    Evolver::new(
        options,
        Externals {
            vcs: Some(Box::new(vcs)),
            ..Externals::default()
        },
    )
    .unwrap()
}

fn feature(desc: &str, keywords: &[&str]) -> SemanticFeature {
    SemanticFeature::new(desc, keywords.iter().map(|s| s.to_string()).collect()).unwrap()
}

fn function_node(file: &str, name: &str, f: SemanticFeature) -> LowLevelNode {
    LowLevelNode::new(
        f,
        StructuralMetadata {
            file_path: PathBuf::from(file),
            kind: EntityKind::Function,
            qualified_name: name.to_string(),
            start_line: Some(1),
            end_line: Some(3),
        },
    )
}

fn file_node(file: &str, f: SemanticFeature) -> LowLevelNode {
    LowLevelNode::new(
        f,
        StructuralMetadata {
            file_path: PathBuf::from(file),
            kind: EntityKind::File,
            qualified_name: file.to_string(),
            start_line: Some(1),
            end_line: Some(10),
        },
    )
}

#[test]
fn test_empty_commit_range_is_a_no_op() {
    let mut graph = RepoGraph::in_memory();
    graph
        .add_high_level_node(HighLevelNode::for_directory("src", feature("src dir", &[])))
        .unwrap();
    let before = graph.stats();

    let mut evolver = evolver(FakeVcs::new(""));
    let result = evolver.evolve(&mut graph).unwrap();

    assert_eq!(result.inserted, 0);
    assert_eq!(result.deleted, 0);
    assert_eq!(result.modified, 0);
    assert_eq!(result.rerouted, 0);
    assert_eq!(result.pruned_nodes, 0);
    assert_eq!(result.llm_calls, 0);
    assert_eq!(graph.stats(), before);
}

#[test]
fn test_unsupported_language_file_ignored_entirely() {
    let mut graph = RepoGraph::in_memory();
    let vcs = FakeVcs::new("A\tdocs/notes.md\n").file("head", "docs/notes.md", "# notes");
    let result = evolver(vcs).evolve(&mut graph).unwrap();
    assert_eq!(result.inserted, 0);
    assert_eq!(graph.stats().nodes, 0);
}

#[test]
fn test_orphan_prune_after_last_child_deleted() {
    let mut graph = RepoGraph::in_memory();
    graph
        .add_high_level_node(HighLevelNode::for_directory(
            "src/legacy",
            feature("legacy parsing helpers", &[]),
        ))
        .unwrap();
    graph
        .add_low_level_node(function_node(
            "src/legacy/x.ts",
            "foo",
            feature("function foo in src/legacy/x.ts", &["foo"]),
        ))
        .unwrap();
    graph
        .add_functional_edge("src/legacy:dir", "src/legacy/x.ts:function:foo", None, None)
        .unwrap();

    let vcs = FakeVcs::new("D\tsrc/legacy/x.ts\n")
        .file("base", "src/legacy/x.ts", "export function foo() {}\n");
    let result = evolver(vcs).evolve(&mut graph).unwrap();

    assert_eq!(result.deleted, 1);
    assert!(result.pruned_nodes >= 1);
    assert!(!graph.has_node("src/legacy/x.ts:function:foo"));
    assert!(!graph.has_node("src/legacy:dir"));
    // Fixpoint: no childless high-level node survives the stage.
    for id in graph.node_ids() {
        if graph.get_node(&id).unwrap().is_high_level() {
            assert!(!graph.children(&id).is_empty());
        }
    }
}

#[test]
fn test_insertion_routes_to_best_parent() {
    let mut graph = RepoGraph::in_memory();
    graph
        .add_high_level_node(HighLevelNode::for_directory(
            "src/auth",
            feature("function validate login in src/auth", &[]),
        ))
        .unwrap();
    graph
        .add_high_level_node(HighLevelNode::for_directory(
            "src/render",
            feature("html template layout engine", &[]),
        ))
        .unwrap();

    let vcs = FakeVcs::new("A\tsrc/auth/login.ts\n").file(
        "head",
        "src/auth/login.ts",
        "export function validateLogin() {}\n",
    );
    let result = evolver(vcs).evolve(&mut graph).unwrap();

    // File entity + function entity.
    assert_eq!(result.inserted, 2);
    let parent = graph.parent("src/auth/login.ts:function:validateLogin");
    assert_eq!(parent, Some("src/auth:dir".to_string()));
}

#[test]
fn test_drift_reroute_moves_entity() {
    let mut graph = RepoGraph::in_memory();
    graph
        .add_high_level_node(HighLevelNode::for_directory(
            "src/legacy",
            feature("legacy configuration parsing", &[]),
        ))
        .unwrap();
    graph
        .add_high_level_node(HighLevelNode::for_directory(
            "src/helpers",
            feature("function helpers in src", &[]),
        ))
        .unwrap();
    // The file node keeps src/legacy populated so only the reroute moves.
    graph
        .add_low_level_node(file_node(
            "src/x.ts",
            feature("file x.ts in src/x.ts", &["ts"]),
        ))
        .unwrap();
    graph
        .add_low_level_node(function_node(
            "src/x.ts",
            "foo",
            feature("legacy config reader", &["legacy", "parser"]),
        ))
        .unwrap();
    graph
        .add_functional_edge("src/legacy:dir", "src/x.ts:file:src/x.ts", None, None)
        .unwrap();
    graph
        .add_functional_edge("src/legacy:dir", "src/x.ts:function:foo", None, None)
        .unwrap();

    let vcs = FakeVcs::new("M\tsrc/x.ts\n")
        .file("base", "src/x.ts", "export function foo() { return 1; }\n")
        .file("head", "src/x.ts", "export function foo() { return 2; }\n");
    let result = evolver(vcs).evolve(&mut graph).unwrap();

    // Heuristic keywords for `foo` share nothing with ["legacy", "parser"]:
    // drift 1.0 > 0.4, so the entity re-routes to the best-matching parent.
    assert_eq!(result.rerouted, 1);
    assert_eq!(
        graph.parent("src/x.ts:function:foo"),
        Some("src/helpers:dir".to_string())
    );
}

#[test]
fn test_drift_at_threshold_updates_in_place() {
    // Old keywords {get} vs heuristic {get, data}: drift = 1 − 1/2 = 0.5,
    // exactly representable, so the boundary comparison is precise.
    let setup = || {
        let mut graph = RepoGraph::in_memory();
        graph
            .add_high_level_node(HighLevelNode::for_directory(
                "src/api",
                feature("api handlers", &[]),
            ))
            .unwrap();
        graph
            .add_low_level_node(function_node(
                "src/api/d.ts",
                "getData",
                feature("fetches data", &["get"]),
            ))
            .unwrap();
        graph
            .add_functional_edge("src/api:dir", "src/api/d.ts:function:getData", None, None)
            .unwrap();
        graph
    };
    let vcs = || {
        FakeVcs::new("M\tsrc/api/d.ts\n")
            .file("base", "src/api/d.ts", "export function getData() { return 1; }\n")
            .file("head", "src/api/d.ts", "export function getData() { return 2; }\n")
    };

    // Exactly at the threshold: strict `>` means in-place.
    let mut graph = setup();
    let result = evolver_with_threshold(vcs(), 0.5).evolve(&mut graph).unwrap();
    assert_eq!(result.modified, 1);
    assert_eq!(result.rerouted, 0);
    assert_eq!(
        graph.parent("src/api/d.ts:function:getData"),
        Some("src/api:dir".to_string())
    );

    // Just below: reroutes.
    let mut graph = setup();
    let result = evolver_with_threshold(vcs(), 0.4).evolve(&mut graph).unwrap();
    assert_eq!(result.rerouted, 1);
}

#[test]
fn test_in_place_update_preserves_edges_and_refreshes_feature() {
    let mut graph = RepoGraph::in_memory();
    graph
        .add_high_level_node(HighLevelNode::for_directory(
            "src/api",
            feature("api handlers", &[]),
        ))
        .unwrap();
    graph
        .add_low_level_node(function_node(
            "src/api/d.ts",
            "getData",
            feature("old description", &["get", "data"]),
        ))
        .unwrap();
    graph
        .add_functional_edge("src/api:dir", "src/api/d.ts:function:getData", None, None)
        .unwrap();

    let vcs = FakeVcs::new("M\tsrc/api/d.ts\n")
        .file("base", "src/api/d.ts", "export function getData() { return 1; }\n")
        .file("head", "src/api/d.ts", "export function getData() { return 2; }\n");
    let result = evolver(vcs).evolve(&mut graph).unwrap();

    // Heuristic keywords {get, data} equal the stored ones: drift 0.
    assert_eq!(result.modified, 1);
    assert_eq!(result.rerouted, 0);
    let node = graph.get_node("src/api/d.ts:function:getData").unwrap();
    assert_eq!(
        node.feature().description(),
        "function getData in src/api/d.ts"
    );
    assert_eq!(
        graph.parent("src/api/d.ts:function:getData"),
        Some("src/api:dir".to_string())
    );
}

#[test]
fn test_modification_without_existing_node_becomes_insertion() {
    let mut graph = RepoGraph::in_memory();
    let vcs = FakeVcs::new("M\tsrc/new.ts\n")
        .file("base", "src/new.ts", "export function f() { return 1; }\n")
        .file("head", "src/new.ts", "export function f() { return 2; }\n");
    let result = evolver(vcs).evolve(&mut graph).unwrap();

    // Neither the file nor the function existed: both insert.
    assert_eq!(result.inserted, 2);
    assert_eq!(result.modified, 0);
    assert!(graph.has_node("src/new.ts:function:f"));
}

#[test]
fn test_positional_id_from_initial_encoding_still_matches() {
    let mut graph = RepoGraph::in_memory();
    let positional = LowLevelNode::with_positional_id(
        feature("fetches data", &["get", "data"]),
        StructuralMetadata {
            file_path: PathBuf::from("src/api/d.ts"),
            kind: EntityKind::Function,
            qualified_name: "getData".to_string(),
            start_line: Some(7),
            end_line: Some(9),
        },
    );
    assert_eq!(positional.id, "src/api/d.ts:function:getData:7");
    graph.add_low_level_node(positional).unwrap();

    let vcs = FakeVcs::new("M\tsrc/api/d.ts\n")
        .file("base", "src/api/d.ts", "export function getData() { return 1; }\n")
        .file("head", "src/api/d.ts", "export function getData() { return 2; }\n");
    let result = evolver(vcs).evolve(&mut graph).unwrap();

    assert_eq!(result.modified, 1);
    // The node keeps its positional identity; no duplicate appears.
    assert!(graph.has_node("src/api/d.ts:function:getData:7"));
    assert!(!graph.has_node("src/api/d.ts:function:getData"));
}

#[test]
fn test_import_dependency_injected_once() {
    let mut graph = RepoGraph::in_memory();
    graph
        .add_low_level_node(file_node("src/b.ts", feature("file b.ts in src/b.ts", &[])))
        .unwrap();

    let vcs = FakeVcs::new("A\tsrc/a.ts\n").file("head", "src/a.ts", "import './b';\n");
    let result = evolver(vcs).evolve(&mut graph).unwrap();

    assert_eq!(result.inserted, 1);
    let deps = graph.dependencies("src/a.ts:file:src/a.ts");
    assert_eq!(deps, vec!["src/b.ts:file:src/b.ts".to_string()]);
}

#[test]
fn test_import_to_missing_target_is_skipped() {
    let mut graph = RepoGraph::in_memory();
    let vcs = FakeVcs::new("A\tsrc/a.ts\n").file("head", "src/a.ts", "import './nowhere';\n");
    evolver(vcs).evolve(&mut graph).unwrap();
    assert!(graph.dependencies("src/a.ts:file:src/a.ts").is_empty());
}

#[test]
fn test_counters_accumulate_across_stages() {
    let mut graph = RepoGraph::in_memory();
    graph
        .add_high_level_node(HighLevelNode::for_directory(
            "src/old",
            feature("old area", &[]),
        ))
        .unwrap();
    graph
        .add_low_level_node(function_node(
            "src/old/gone.ts",
            "bye",
            feature("function bye in src/old/gone.ts", &["bye"]),
        ))
        .unwrap();
    graph
        .add_functional_edge("src/old:dir", "src/old/gone.ts:function:bye", None, None)
        .unwrap();

    let vcs = FakeVcs::new("D\tsrc/old/gone.ts\nA\tsrc/fresh.ts\n")
        .file("base", "src/old/gone.ts", "export function bye() {}\n")
        .file("head", "src/fresh.ts", "export function hi() {}\n");
    let result = evolver(vcs).evolve(&mut graph).unwrap();

    assert_eq!(result.deleted, 1);
    assert!(result.pruned_nodes >= 1);
    assert_eq!(result.inserted, 2);
    assert_eq!(result.llm_calls, 0);
}
