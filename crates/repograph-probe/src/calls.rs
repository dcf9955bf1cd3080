//! Call-site extraction: which symbols a file's entities invoke.

use crate::languages::{self, Language};
use std::path::{Path, PathBuf};

/// One call site, attributed to its enclosing entity.
#[derive(Debug, Clone, PartialEq)]
pub struct CallSite {
    pub callee_symbol: String,
    pub caller_file: PathBuf,
    /// Qualified name of the enclosing entity; empty at module level.
    pub caller_entity: String,
    pub line: u32,
}

/// Extract call sites from a source buffer. Unsupported tags and parse
/// failures yield an empty list.
pub fn extract_call_sites(source: &str, language_tag: &str, path: &Path) -> Vec<CallSite> {
    let Some(language) = Language::from_tag(language_tag) else {
        return Vec::new();
    };
    let Some(tree) = languages::parse(source, language) else {
        return Vec::new();
    };
    let mut out = Vec::new();
    let mut scope = Vec::new();
    walk(&tree.root_node(), source, language, path, &mut scope, &mut out);
    out
}

fn walk(
    node: &tree_sitter::Node,
    source: &str,
    language: Language,
    path: &Path,
    scope: &mut Vec<String>,
    out: &mut Vec<CallSite>,
) {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if let Some(symbol) = callee_symbol(&child, source, language) {
            out.push(CallSite {
                callee_symbol: symbol,
                caller_file: path.to_path_buf(),
                caller_entity: scope.join("."),
                line: child.start_position().row as u32 + 1,
            });
        }
        let pushed = scope_name(&child, source, language);
        if let Some(name) = pushed {
            scope.push(name);
            walk(&child, source, language, path, scope, out);
            scope.pop();
        } else {
            walk(&child, source, language, path, scope, out);
        }
    }
}

/// Name this node contributes to the qualified caller scope, if any.
fn scope_name(node: &tree_sitter::Node, source: &str, language: Language) -> Option<String> {
    let named = |field: &str| {
        node.child_by_field_name(field)
            .map(|n| source[n.byte_range()].to_string())
    };
    match language {
        Language::TypeScript | Language::JavaScript => match node.kind() {
            "function_declaration"
            | "generator_function_declaration"
            | "class_declaration"
            | "abstract_class_declaration"
            | "method_definition" => named("name"),
            "variable_declarator" => {
                let is_fn = node.child_by_field_name("value").is_some_and(|v| {
                    matches!(v.kind(), "arrow_function" | "function_expression" | "function")
                });
                if is_fn { named("name") } else { None }
            }
            _ => None,
        },
        Language::Python => match node.kind() {
            "function_definition" | "class_definition" => named("name"),
            _ => None,
        },
        Language::Rust => match node.kind() {
            "function_item" | "trait_item" | "mod_item" => named("name"),
            "impl_item" => named("type").map(|t| t.split('<').next().unwrap_or(&t).to_string()),
            _ => None,
        },
        Language::Go => match node.kind() {
            "function_declaration" | "method_declaration" => named("name"),
            _ => None,
        },
        Language::Java => match node.kind() {
            "class_declaration"
            | "interface_declaration"
            | "enum_declaration"
            | "method_declaration"
            | "constructor_declaration" => named("name"),
            _ => None,
        },
    }
}

/// Extract the callee symbol from a call-like node, or `None`.
///
/// Member expressions `a.b.c()` yield the trailing identifier `c`; an
/// optional-chaining `?.` prefix is stripped; `new X()` and `new X<T>()`
/// both yield `X`.
fn callee_symbol(node: &tree_sitter::Node, source: &str, language: Language) -> Option<String> {
    let text = |n: tree_sitter::Node| source[n.byte_range()].to_string();
    match language {
        Language::TypeScript | Language::JavaScript => match node.kind() {
            "call_expression" => {
                let function = node.child_by_field_name("function")?;
                match function.kind() {
                    "identifier" => Some(text(function)),
                    "member_expression" => function
                        .child_by_field_name("property")
                        .map(|p| text(p).trim_start_matches("?.").to_string()),
                    _ => None,
                }
            }
            "new_expression" => {
                let constructor = node.child_by_field_name("constructor")?;
                let name = text(constructor);
                Some(name.split('<').next().unwrap_or(&name).to_string())
            }
            _ => None,
        },
        Language::Python => match node.kind() {
            "call" => {
                let function = node.child_by_field_name("function")?;
                match function.kind() {
                    "identifier" => Some(text(function)),
                    "attribute" => function.child_by_field_name("attribute").map(text),
                    _ => None,
                }
            }
            _ => None,
        },
        Language::Rust => match node.kind() {
            "call_expression" => {
                let function = node.child_by_field_name("function")?;
                match function.kind() {
                    "identifier" => Some(text(function)),
                    "field_expression" => function.child_by_field_name("field").map(text),
                    "scoped_identifier" => function.child_by_field_name("name").map(text),
                    _ => None,
                }
            }
            _ => None,
        },
        Language::Go => match node.kind() {
            "call_expression" => {
                let function = node.child_by_field_name("function")?;
                match function.kind() {
                    "identifier" => Some(text(function)),
                    "selector_expression" => function.child_by_field_name("field").map(text),
                    _ => None,
                }
            }
            _ => None,
        },
        Language::Java => match node.kind() {
            "method_invocation" => node.child_by_field_name("name").map(text),
            "object_creation_expression" => node.child_by_field_name("type").map(|t| {
                let name = text(t);
                name.split('<').next().unwrap_or(&name).to_string()
            }),
            _ => None,
        },
    }
}
