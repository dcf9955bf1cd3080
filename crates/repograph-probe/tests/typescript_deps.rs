use repograph_probe::calls::extract_call_sites;
use repograph_probe::imports::ImportKind;
use repograph_probe::probe;
use std::path::Path;

#[test]
fn test_es_import_module() {
    let source = "import { login } from './auth';\n";
    let result = probe(source, "typescript", Path::new("a.ts"));
    assert_eq!(result.imports.len(), 1);
    assert_eq!(result.imports[0].module, "./auth");
    assert_eq!(result.imports[0].kind, ImportKind::Import);
    assert_eq!(result.imports[0].line, 1);
}

#[test]
fn test_require_import() {
    let source = "const fs = require('fs');\n";
    let result = probe(source, "javascript", Path::new("a.js"));
    assert_eq!(result.imports.len(), 1);
    assert_eq!(result.imports[0].module, "fs");
    assert_eq!(result.imports[0].kind, ImportKind::Require);
}

#[test]
fn test_member_call_yields_trailing_identifier() {
    let source = "function go() { a.b.c(); }";
    let calls = extract_call_sites(source, "typescript", Path::new("a.ts"));
    let symbols: Vec<&str> = calls.iter().map(|c| c.callee_symbol.as_str()).collect();
    assert!(symbols.contains(&"c"));
    let c = calls.iter().find(|c| c.callee_symbol == "c").unwrap();
    assert_eq!(c.caller_entity, "go");
}

#[test]
fn test_optional_chaining_prefix_stripped() {
    let source = "function go() { obj?.method(); }";
    let calls = extract_call_sites(source, "typescript", Path::new("a.ts"));
    assert!(calls.iter().any(|c| c.callee_symbol == "method"));
    assert!(calls.iter().all(|c| !c.callee_symbol.contains("?.")));
}

#[test]
fn test_new_expression() {
    let source = "const x = new Client();";
    let calls = extract_call_sites(source, "typescript", Path::new("a.ts"));
    assert!(calls.iter().any(|c| c.callee_symbol == "Client"));
}

#[test]
fn test_generic_instantiation_unwraps() {
    let source = "const x = new Registry<string>();";
    let calls = extract_call_sites(source, "typescript", Path::new("a.ts"));
    assert!(calls.iter().any(|c| c.callee_symbol == "Registry"));
}

#[test]
fn test_module_level_call_has_empty_caller() {
    let source = "setup();";
    let calls = extract_call_sites(source, "javascript", Path::new("a.js"));
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].callee_symbol, "setup");
    assert_eq!(calls[0].caller_entity, "");
    assert_eq!(calls[0].caller_file, Path::new("a.js"));
}

#[test]
fn test_method_caller_is_qualified() {
    let source = r#"
class Svc {
    run() { helper(); }
}
"#;
    let calls = extract_call_sites(source, "typescript", Path::new("a.ts"));
    let helper = calls.iter().find(|c| c.callee_symbol == "helper").unwrap();
    assert_eq!(helper.caller_entity, "Svc.run");
}
