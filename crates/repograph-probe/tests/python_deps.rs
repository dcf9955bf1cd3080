use repograph_probe::calls::extract_call_sites;
use repograph_probe::imports::ImportKind;
use repograph_probe::probe;
use std::path::Path;

#[test]
fn test_plain_import() {
    let result = probe("import os.path\n", "python", Path::new("a.py"));
    assert_eq!(result.imports.len(), 1);
    assert_eq!(result.imports[0].module, "os.path");
    assert_eq!(result.imports[0].kind, ImportKind::Import);
}

#[test]
fn test_from_import() {
    let result = probe("from collections import deque\n", "python", Path::new("a.py"));
    assert_eq!(result.imports.len(), 1);
    assert_eq!(result.imports[0].module, "collections");
    assert_eq!(result.imports[0].kind, ImportKind::From);
}

#[test]
fn test_relative_from_import() {
    let result = probe("from .utils import helper\n", "python", Path::new("pkg/a.py"));
    assert_eq!(result.imports[0].module, ".utils");
    assert_eq!(result.imports[0].kind, ImportKind::From);
}

#[test]
fn test_aliased_import_keeps_real_module() {
    let result = probe("import numpy as np\n", "python", Path::new("a.py"));
    assert_eq!(result.imports[0].module, "numpy");
}

#[test]
fn test_multiple_imports_one_statement() {
    let result = probe("import json, sys\n", "python", Path::new("a.py"));
    let modules: Vec<&str> = result.imports.iter().map(|i| i.module.as_str()).collect();
    assert_eq!(modules, vec!["json", "sys"]);
}

#[test]
fn test_attribute_call_yields_trailing_name() {
    let source = "def go():\n    client.session.get(url)\n";
    let calls = extract_call_sites(source, "python", Path::new("a.py"));
    let get = calls.iter().find(|c| c.callee_symbol == "get").unwrap();
    assert_eq!(get.caller_entity, "go");
}

#[test]
fn test_rust_use_declaration() {
    let result = probe(
        "use std::collections::{HashMap, HashSet};\nuse serde::Serialize as Ser;\n",
        "rust",
        Path::new("a.rs"),
    );
    let modules: Vec<&str> = result.imports.iter().map(|i| i.module.as_str()).collect();
    assert_eq!(modules, vec!["std::collections", "serde::Serialize"]);
}

#[test]
fn test_go_import_specs() {
    let source = "package main\n\nimport (\n\t\"fmt\"\n\t\"net/http\"\n)\n";
    let result = probe(source, "go", Path::new("main.go"));
    let modules: Vec<&str> = result.imports.iter().map(|i| i.module.as_str()).collect();
    assert_eq!(modules, vec!["fmt", "net/http"]);
}

#[test]
fn test_java_import() {
    let source = "import java.util.List;\n\nclass A {}\n";
    let result = probe(source, "java", Path::new("A.java"));
    assert_eq!(result.imports[0].module, "java.util.List");
}
