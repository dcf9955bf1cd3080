//! Extract code entities (files, classes, functions, methods, modules) from
//! syntax trees, in source order.

use crate::imports::{self, ImportRecord};
use crate::languages::{self, Language};
use repograph_core::model::EntityKind;
use std::path::Path;

/// One extracted entity: span, qualified name, and source slice.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityRecord {
    pub kind: EntityKind,
    pub name: String,
    /// Enclosing class/function names joined with `.`.
    pub qualified_name: String,
    /// 1-indexed inclusive.
    pub start_line: u32,
    pub end_line: u32,
    pub source_slice: String,
}

/// Everything the probe yields for one buffer.
#[derive(Debug, Default)]
pub struct ProbeResult {
    pub entities: Vec<EntityRecord>,
    pub imports: Vec<ImportRecord>,
}

/// Probe a source buffer under a named grammar.
///
/// Unsupported tags and parse failures yield an empty result, never an
/// error; the caller treats such files as opaque.
pub fn probe(source: &str, language_tag: &str, path: &Path) -> ProbeResult {
    let Some(language) = Language::from_tag(language_tag) else {
        return ProbeResult::default();
    };
    let Some(tree) = languages::parse(source, language) else {
        tracing::debug!(file = %path.display(), "parse failed, treating file as opaque");
        return ProbeResult::default();
    };
    ProbeResult {
        entities: extract_entities(&tree, source, language),
        imports: imports::collect(&tree, source, language),
    }
}

/// An enclosing scope while walking: name plus whether it is class-like
/// (which turns directly nested functions into methods).
struct Scope {
    name: String,
    is_class: bool,
}

fn qualify(scope: &[Scope], name: &str) -> String {
    if scope.is_empty() {
        name.to_string()
    } else {
        let mut parts: Vec<&str> = scope.iter().map(|s| s.name.as_str()).collect();
        parts.push(name);
        parts.join(".")
    }
}

fn record(
    node: &tree_sitter::Node,
    source: &str,
    name: &str,
    kind: EntityKind,
    scope: &[Scope],
) -> EntityRecord {
    EntityRecord {
        kind,
        name: name.to_string(),
        qualified_name: qualify(scope, name),
        start_line: node.start_position().row as u32 + 1,
        end_line: node.end_position().row as u32 + 1,
        source_slice: source[node.byte_range()].to_string(),
    }
}

fn field_text<'a>(node: &tree_sitter::Node, field: &str, source: &'a str) -> Option<&'a str> {
    node.child_by_field_name(field)
        .map(|n| &source[n.byte_range()])
}

pub(crate) fn extract_entities(
    tree: &tree_sitter::Tree,
    source: &str,
    language: Language,
) -> Vec<EntityRecord> {
    let mut out = Vec::new();
    let mut scope = Vec::new();
    let root = tree.root_node();
    match language {
        Language::TypeScript | Language::JavaScript => {
            walk_js(&root, source, &mut scope, &mut out);
        }
        Language::Python => walk_python(&root, source, &mut scope, &mut out),
        Language::Rust => walk_rust(&root, source, &mut scope, &mut out),
        Language::Go => walk_go(&root, source, &mut scope, &mut out),
        Language::Java => walk_java(&root, source, &mut scope, &mut out),
    }
    out
}

fn walk_js(
    node: &tree_sitter::Node,
    source: &str,
    scope: &mut Vec<Scope>,
    out: &mut Vec<EntityRecord>,
) {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        match child.kind() {
            "function_declaration" | "generator_function_declaration" => {
                if let Some(name) = field_text(&child, "name", source) {
                    out.push(record(&child, source, name, EntityKind::Function, scope));
                    scope.push(Scope {
                        name: name.to_string(),
                        is_class: false,
                    });
                    if let Some(body) = child.child_by_field_name("body") {
                        walk_js(&body, source, scope, out);
                    }
                    scope.pop();
                }
            }
            "class_declaration" | "abstract_class_declaration" => {
                if let Some(name) = field_text(&child, "name", source) {
                    out.push(record(&child, source, name, EntityKind::Class, scope));
                    scope.push(Scope {
                        name: name.to_string(),
                        is_class: true,
                    });
                    if let Some(body) = child.child_by_field_name("body") {
                        walk_js(&body, source, scope, out);
                    }
                    scope.pop();
                }
            }
            "interface_declaration" | "type_alias_declaration" | "enum_declaration" => {
                if let Some(name) = field_text(&child, "name", source) {
                    out.push(record(&child, source, name, EntityKind::Class, scope));
                }
            }
            "method_definition" => {
                if let Some(name) = field_text(&child, "name", source) {
                    out.push(record(&child, source, name, EntityKind::Method, scope));
                    scope.push(Scope {
                        name: name.to_string(),
                        is_class: false,
                    });
                    if let Some(body) = child.child_by_field_name("body") {
                        walk_js(&body, source, scope, out);
                    }
                    scope.pop();
                }
            }
            // Arrow/function bound to a named declarator adopts the
            // declarator's name: const foo = () => {}
            "lexical_declaration" | "variable_declaration" => {
                let mut inner = child.walk();
                for decl in child.children(&mut inner) {
                    if decl.kind() != "variable_declarator" {
                        continue;
                    }
                    let Some(value) = decl.child_by_field_name("value") else {
                        continue;
                    };
                    if !matches!(
                        value.kind(),
                        "arrow_function" | "function_expression" | "function"
                    ) {
                        continue;
                    }
                    if let Some(name) = field_text(&decl, "name", source) {
                        out.push(record(&decl, source, name, EntityKind::Function, scope));
                        scope.push(Scope {
                            name: name.to_string(),
                            is_class: false,
                        });
                        walk_js(&value, source, scope, out);
                        scope.pop();
                    }
                }
            }
            _ => walk_js(&child, source, scope, out),
        }
    }
}

fn walk_python(
    node: &tree_sitter::Node,
    source: &str,
    scope: &mut Vec<Scope>,
    out: &mut Vec<EntityRecord>,
) {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        match child.kind() {
            "function_definition" => {
                if let Some(name) = field_text(&child, "name", source) {
                    let kind = if scope.last().is_some_and(|s| s.is_class) {
                        EntityKind::Method
                    } else {
                        EntityKind::Function
                    };
                    out.push(record(&child, source, name, kind, scope));
                    scope.push(Scope {
                        name: name.to_string(),
                        is_class: false,
                    });
                    if let Some(body) = child.child_by_field_name("body") {
                        walk_python(&body, source, scope, out);
                    }
                    scope.pop();
                }
            }
            "class_definition" => {
                if let Some(name) = field_text(&child, "name", source) {
                    out.push(record(&child, source, name, EntityKind::Class, scope));
                    scope.push(Scope {
                        name: name.to_string(),
                        is_class: true,
                    });
                    if let Some(body) = child.child_by_field_name("body") {
                        walk_python(&body, source, scope, out);
                    }
                    scope.pop();
                }
            }
            // decorated_definition wraps the real def; recurse through it
            _ => walk_python(&child, source, scope, out),
        }
    }
}

fn walk_rust(
    node: &tree_sitter::Node,
    source: &str,
    scope: &mut Vec<Scope>,
    out: &mut Vec<EntityRecord>,
) {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        match child.kind() {
            "function_item" => {
                if let Some(name) = field_text(&child, "name", source) {
                    let kind = if scope.last().is_some_and(|s| s.is_class) {
                        EntityKind::Method
                    } else {
                        EntityKind::Function
                    };
                    out.push(record(&child, source, name, kind, scope));
                    scope.push(Scope {
                        name: name.to_string(),
                        is_class: false,
                    });
                    if let Some(body) = child.child_by_field_name("body") {
                        walk_rust(&body, source, scope, out);
                    }
                    scope.pop();
                }
            }
            "struct_item" | "enum_item" | "type_item" | "union_item" => {
                if let Some(name) = field_text(&child, "name", source) {
                    out.push(record(&child, source, name, EntityKind::Class, scope));
                }
            }
            "trait_item" => {
                if let Some(name) = field_text(&child, "name", source) {
                    out.push(record(&child, source, name, EntityKind::Class, scope));
                    scope.push(Scope {
                        name: name.to_string(),
                        is_class: true,
                    });
                    if let Some(body) = child.child_by_field_name("body") {
                        walk_rust(&body, source, scope, out);
                    }
                    scope.pop();
                }
            }
            "impl_item" => {
                // Functions inside the impl qualify under the type name;
                // the type itself is emitted at its struct/enum item.
                if let Some(type_name) = field_text(&child, "type", source) {
                    let type_name = type_name.split('<').next().unwrap_or(type_name).trim();
                    scope.push(Scope {
                        name: type_name.to_string(),
                        is_class: true,
                    });
                    if let Some(body) = child.child_by_field_name("body") {
                        walk_rust(&body, source, scope, out);
                    }
                    scope.pop();
                }
            }
            "mod_item" => {
                if let Some(name) = field_text(&child, "name", source) {
                    out.push(record(&child, source, name, EntityKind::Module, scope));
                    scope.push(Scope {
                        name: name.to_string(),
                        is_class: false,
                    });
                    if let Some(body) = child.child_by_field_name("body") {
                        walk_rust(&body, source, scope, out);
                    }
                    scope.pop();
                }
            }
            _ => walk_rust(&child, source, scope, out),
        }
    }
}

fn walk_go(
    node: &tree_sitter::Node,
    source: &str,
    scope: &mut Vec<Scope>,
    out: &mut Vec<EntityRecord>,
) {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        match child.kind() {
            "function_declaration" => {
                if let Some(name) = field_text(&child, "name", source) {
                    out.push(record(&child, source, name, EntityKind::Function, scope));
                }
            }
            "method_declaration" => {
                if let Some(name) = field_text(&child, "name", source) {
                    // Receiver type qualifies the method: (s *Server) → Server
                    let receiver = child
                        .child_by_field_name("receiver")
                        .and_then(|r| find_descendant_kind(&r, "type_identifier"))
                        .map(|n| source[n.byte_range()].to_string());
                    match receiver {
                        Some(recv) => {
                            scope.push(Scope {
                                name: recv,
                                is_class: true,
                            });
                            out.push(record(&child, source, name, EntityKind::Method, scope));
                            scope.pop();
                        }
                        None => {
                            out.push(record(&child, source, name, EntityKind::Method, scope));
                        }
                    }
                }
            }
            "type_spec" => {
                if let Some(name) = field_text(&child, "name", source) {
                    out.push(record(&child, source, name, EntityKind::Class, scope));
                }
            }
            _ => walk_go(&child, source, scope, out),
        }
    }
}

fn walk_java(
    node: &tree_sitter::Node,
    source: &str,
    scope: &mut Vec<Scope>,
    out: &mut Vec<EntityRecord>,
) {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        match child.kind() {
            "class_declaration" | "interface_declaration" | "enum_declaration" => {
                if let Some(name) = field_text(&child, "name", source) {
                    out.push(record(&child, source, name, EntityKind::Class, scope));
                    scope.push(Scope {
                        name: name.to_string(),
                        is_class: true,
                    });
                    if let Some(body) = child.child_by_field_name("body") {
                        walk_java(&body, source, scope, out);
                    }
                    scope.pop();
                }
            }
            "method_declaration" | "constructor_declaration" => {
                if let Some(name) = field_text(&child, "name", source) {
                    out.push(record(&child, source, name, EntityKind::Method, scope));
                    scope.push(Scope {
                        name: name.to_string(),
                        is_class: false,
                    });
                    if let Some(body) = child.child_by_field_name("body") {
                        walk_java(&body, source, scope, out);
                    }
                    scope.pop();
                }
            }
            _ => walk_java(&child, source, scope, out),
        }
    }
}

fn find_descendant_kind<'t>(
    node: &tree_sitter::Node<'t>,
    kind: &str,
) -> Option<tree_sitter::Node<'t>> {
    if node.kind() == kind {
        return Some(*node);
    }
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if let Some(found) = find_descendant_kind(&child, kind) {
            return Some(found);
        }
    }
    None
}
