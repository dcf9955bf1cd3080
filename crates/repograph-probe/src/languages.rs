//! Language detection and tree-sitter grammar access.

use repograph_core::model::EntityKind;

/// Supported programming languages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Language {
    TypeScript,
    JavaScript,
    Python,
    Rust,
    Go,
    Java,
}

/// Grammar handle for a language: the parser language plus the node-kind
/// tables driving extraction.
pub struct Grammar {
    pub language: tree_sitter::Language,
    /// Syntax node kind → the entity kind it produces.
    pub entity_kinds: &'static [(&'static str, EntityKind)],
    /// Node kinds that carry import information.
    pub import_kinds: &'static [&'static str],
}

impl Language {
    /// Resolve a language tag (`"typescript"`, `"python"`, …).
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "typescript" => Some(Self::TypeScript),
            "javascript" => Some(Self::JavaScript),
            "python" => Some(Self::Python),
            "rust" => Some(Self::Rust),
            "go" => Some(Self::Go),
            "java" => Some(Self::Java),
            _ => None,
        }
    }

    /// Detect language from file extension.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext {
            "ts" | "tsx" => Some(Self::TypeScript),
            "js" | "jsx" | "mjs" | "cjs" => Some(Self::JavaScript),
            "py" => Some(Self::Python),
            "rs" => Some(Self::Rust),
            "go" => Some(Self::Go),
            "java" => Some(Self::Java),
            _ => None,
        }
    }

    pub fn tag(&self) -> &'static str {
        match self {
            Self::TypeScript => "typescript",
            Self::JavaScript => "javascript",
            Self::Python => "python",
            Self::Rust => "rust",
            Self::Go => "go",
            Self::Java => "java",
        }
    }

    /// Get the tree-sitter Language for parsing.
    pub fn ts_language(&self) -> tree_sitter::Language {
        match self {
            Self::TypeScript => tree_sitter_typescript::LANGUAGE_TSX.into(),
            Self::JavaScript => tree_sitter_javascript::LANGUAGE.into(),
            Self::Python => tree_sitter_python::LANGUAGE.into(),
            Self::Rust => tree_sitter_rust::LANGUAGE.into(),
            Self::Go => tree_sitter_go::LANGUAGE.into(),
            Self::Java => tree_sitter_java::LANGUAGE.into(),
        }
    }

    /// The grammar tables for this language.
    pub fn grammar(&self) -> Grammar {
        match self {
            Self::TypeScript | Self::JavaScript => Grammar {
                language: self.ts_language(),
                entity_kinds: &[
                    ("function_declaration", EntityKind::Function),
                    ("generator_function_declaration", EntityKind::Function),
                    ("class_declaration", EntityKind::Class),
                    ("abstract_class_declaration", EntityKind::Class),
                    ("interface_declaration", EntityKind::Class),
                    ("type_alias_declaration", EntityKind::Class),
                    ("enum_declaration", EntityKind::Class),
                    ("method_definition", EntityKind::Method),
                ],
                import_kinds: &["import_statement", "call_expression"],
            },
            Self::Python => Grammar {
                language: self.ts_language(),
                entity_kinds: &[
                    ("function_definition", EntityKind::Function),
                    ("class_definition", EntityKind::Class),
                ],
                import_kinds: &["import_statement", "import_from_statement"],
            },
            Self::Rust => Grammar {
                language: self.ts_language(),
                entity_kinds: &[
                    ("function_item", EntityKind::Function),
                    ("struct_item", EntityKind::Class),
                    ("enum_item", EntityKind::Class),
                    ("trait_item", EntityKind::Class),
                    ("type_item", EntityKind::Class),
                    ("mod_item", EntityKind::Module),
                ],
                import_kinds: &["use_declaration"],
            },
            Self::Go => Grammar {
                language: self.ts_language(),
                entity_kinds: &[
                    ("function_declaration", EntityKind::Function),
                    ("method_declaration", EntityKind::Method),
                    ("type_spec", EntityKind::Class),
                ],
                import_kinds: &["import_spec"],
            },
            Self::Java => Grammar {
                language: self.ts_language(),
                entity_kinds: &[
                    ("class_declaration", EntityKind::Class),
                    ("interface_declaration", EntityKind::Class),
                    ("enum_declaration", EntityKind::Class),
                    ("method_declaration", EntityKind::Method),
                    ("constructor_declaration", EntityKind::Method),
                ],
                import_kinds: &["import_declaration"],
            },
        }
    }
}

/// Parse a source buffer, returning `None` on grammar or parse failure.
pub(crate) fn parse(source: &str, language: Language) -> Option<tree_sitter::Tree> {
    let mut parser = tree_sitter::Parser::new();
    if parser.set_language(&language.ts_language()).is_err() {
        return None;
    }
    parser.parse(source.as_bytes(), None)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_tag() {
        assert_eq!(Language::from_tag("typescript"), Some(Language::TypeScript));
        assert_eq!(Language::from_tag("cobol"), None);
    }

    #[test]
    fn test_from_extension() {
        assert_eq!(Language::from_extension("tsx"), Some(Language::TypeScript));
        assert_eq!(Language::from_extension("mjs"), Some(Language::JavaScript));
        assert_eq!(Language::from_extension("md"), None);
    }

    #[test]
    fn test_grammar_tables_nonempty() {
        for lang in [
            Language::TypeScript,
            Language::JavaScript,
            Language::Python,
            Language::Rust,
            Language::Go,
            Language::Java,
        ] {
            let grammar = lang.grammar();
            assert!(!grammar.entity_kinds.is_empty());
            assert!(!grammar.import_kinds.is_empty());
        }
    }
}
