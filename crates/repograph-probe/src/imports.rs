//! Import record extraction.

use crate::languages::Language;
use serde::{Deserialize, Serialize};

/// How the module was brought in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportKind {
    Import,
    From,
    Require,
}

/// One import statement in a file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportRecord {
    pub module: String,
    pub kind: ImportKind,
    /// 1-indexed line of the statement.
    pub line: u32,
}

pub(crate) fn collect(
    tree: &tree_sitter::Tree,
    source: &str,
    language: Language,
) -> Vec<ImportRecord> {
    let grammar = language.grammar();
    let mut out = Vec::new();
    walk(&tree.root_node(), source, language, grammar.import_kinds, &mut out);
    out
}

fn walk(
    node: &tree_sitter::Node,
    source: &str,
    language: Language,
    import_kinds: &[&str],
    out: &mut Vec<ImportRecord>,
) {
    if import_kinds.contains(&node.kind()) {
        parse_import(node, source, language, out);
    }
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        walk(&child, source, language, import_kinds, out);
    }
}

fn line_of(node: &tree_sitter::Node) -> u32 {
    node.start_position().row as u32 + 1
}

fn strip_quotes(text: &str) -> &str {
    text.trim_matches(|c| c == '"' || c == '\'' || c == '`')
}

fn parse_import(
    node: &tree_sitter::Node,
    source: &str,
    language: Language,
    out: &mut Vec<ImportRecord>,
) {
    match language {
        Language::TypeScript | Language::JavaScript => match node.kind() {
            "import_statement" => {
                if let Some(src) = node.child_by_field_name("source") {
                    out.push(ImportRecord {
                        module: strip_quotes(&source[src.byte_range()]).to_string(),
                        kind: ImportKind::Import,
                        line: line_of(node),
                    });
                }
            }
            "call_expression" => {
                let is_require = node
                    .child_by_field_name("function")
                    .is_some_and(|f| &source[f.byte_range()] == "require");
                if is_require
                    && let Some(args) = node.child_by_field_name("arguments")
                    && let Some(arg) = args.named_child(0)
                    && arg.kind() == "string"
                {
                    out.push(ImportRecord {
                        module: strip_quotes(&source[arg.byte_range()]).to_string(),
                        kind: ImportKind::Require,
                        line: line_of(node),
                    });
                }
            }
            _ => {}
        },
        Language::Python => match node.kind() {
            "import_statement" => {
                // import a.b, c as d → modules a.b and c
                let mut cursor = node.walk();
                for child in node.named_children(&mut cursor) {
                    match child.kind() {
                        "dotted_name" => out.push(ImportRecord {
                            module: source[child.byte_range()].to_string(),
                            kind: ImportKind::Import,
                            line: line_of(node),
                        }),
                        "aliased_import" => {
                            if let Some(name) = child.child_by_field_name("name") {
                                out.push(ImportRecord {
                                    module: source[name.byte_range()].to_string(),
                                    kind: ImportKind::Import,
                                    line: line_of(node),
                                });
                            }
                        }
                        _ => {}
                    }
                }
            }
            "import_from_statement" => {
                if let Some(module) = node.child_by_field_name("module_name") {
                    out.push(ImportRecord {
                        module: source[module.byte_range()].to_string(),
                        kind: ImportKind::From,
                        line: line_of(node),
                    });
                }
            }
            _ => {}
        },
        Language::Rust => {
            if let Some(argument) = node.child_by_field_name("argument") {
                let text = &source[argument.byte_range()];
                // use a::b::{c, d} → a::b; use a::b as c → a::b
                let module = text
                    .split("::{")
                    .next()
                    .unwrap_or(text)
                    .split(" as ")
                    .next()
                    .unwrap_or(text)
                    .trim();
                out.push(ImportRecord {
                    module: module.to_string(),
                    kind: ImportKind::Import,
                    line: line_of(node),
                });
            }
        }
        Language::Go => {
            if let Some(path) = node.child_by_field_name("path") {
                out.push(ImportRecord {
                    module: strip_quotes(&source[path.byte_range()]).to_string(),
                    kind: ImportKind::Import,
                    line: line_of(node),
                });
            }
        }
        Language::Java => {
            let text = source[node.byte_range()]
                .trim_start_matches("import")
                .trim_start()
                .trim_start_matches("static")
                .trim()
                .trim_end_matches(';')
                .trim();
            if !text.is_empty() {
                out.push(ImportRecord {
                    module: text.to_string(),
                    kind: ImportKind::Import,
                    line: line_of(node),
                });
            }
        }
    }
}
