//! Tree-sitter extraction with per-language dispatch tables.
//!
//! One generic walker serves every code language; the tables name the node
//! kinds that delimit chunks. Class bodies are walked again so methods become
//! chunks of their own; uncaptured top-level statements are grouped into
//! `module` chunks so imports and constants stay retrievable.

use crate::model::chunk::ChunkKind;
use crate::model::language::LanguageKind;
use crate::parse::{Draft, stem};
use anyhow::{Result, anyhow};
use tree_sitter::{Node, Parser};

struct LangSpec {
    class_kinds: &'static [&'static str],
    function_kinds: &'static [&'static str],
    method_kinds: &'static [&'static str],
    /// Wrapper nodes whose first matching child decides the kind while the
    /// chunk spans the wrapper (decorators, export statements).
    unwrap_kinds: &'static [&'static str],
}

static PYTHON: LangSpec = LangSpec {
    class_kinds: &["class_definition"],
    function_kinds: &["function_definition"],
    method_kinds: &[],
    unwrap_kinds: &["decorated_definition"],
};

static JAVA: LangSpec = LangSpec {
    class_kinds: &["class_declaration", "interface_declaration", "enum_declaration"],
    function_kinds: &[],
    method_kinds: &["method_declaration", "constructor_declaration"],
    unwrap_kinds: &[],
};

static JAVASCRIPT: LangSpec = LangSpec {
    class_kinds: &["class_declaration"],
    function_kinds: &["function_declaration", "generator_function_declaration"],
    method_kinds: &["method_definition"],
    unwrap_kinds: &["export_statement"],
};

static TYPESCRIPT: LangSpec = LangSpec {
    class_kinds: &[
        "class_declaration",
        "interface_declaration",
        "enum_declaration",
    ],
    function_kinds: &["function_declaration", "generator_function_declaration"],
    method_kinds: &["method_definition"],
    unwrap_kinds: &["export_statement"],
};

static GO: LangSpec = LangSpec {
    class_kinds: &["type_declaration"],
    function_kinds: &["function_declaration"],
    method_kinds: &["method_declaration"],
    unwrap_kinds: &[],
};

static RUST: LangSpec = LangSpec {
    class_kinds: &["struct_item", "enum_item", "trait_item", "impl_item"],
    function_kinds: &["function_item"],
    method_kinds: &[],
    unwrap_kinds: &[],
};

static C: LangSpec = LangSpec {
    class_kinds: &["struct_specifier"],
    function_kinds: &["function_definition"],
    method_kinds: &[],
    unwrap_kinds: &[],
};

static CPP: LangSpec = LangSpec {
    class_kinds: &["class_specifier", "struct_specifier"],
    function_kinds: &["function_definition"],
    method_kinds: &[],
    unwrap_kinds: &["template_declaration"],
};

fn spec_for(lang: LanguageKind) -> Option<&'static LangSpec> {
    match lang {
        LanguageKind::Python => Some(&PYTHON),
        LanguageKind::Java => Some(&JAVA),
        LanguageKind::JavaScript => Some(&JAVASCRIPT),
        LanguageKind::TypeScript => Some(&TYPESCRIPT),
        LanguageKind::Go => Some(&GO),
        LanguageKind::Rust => Some(&RUST),
        LanguageKind::C => Some(&C),
        LanguageKind::Cpp => Some(&CPP),
        LanguageKind::Jsp | LanguageKind::Xml => None,
    }
}

fn set_language(parser: &mut Parser, lang: LanguageKind, path: &str) -> Result<()> {
    match lang {
        LanguageKind::Python => parser.set_language(&tree_sitter_python::LANGUAGE.into())?,
        LanguageKind::Java => parser.set_language(&tree_sitter_java::LANGUAGE.into())?,
        LanguageKind::JavaScript => {
            parser.set_language(&tree_sitter_javascript::LANGUAGE.into())?
        }
        LanguageKind::TypeScript => {
            if path.ends_with(".tsx") {
                parser.set_language(&tree_sitter_typescript::LANGUAGE_TSX.into())?
            } else {
                parser.set_language(&tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into())?
            }
        }
        LanguageKind::Go => parser.set_language(&tree_sitter_go::LANGUAGE.into())?,
        LanguageKind::Rust => parser.set_language(&tree_sitter_rust::LANGUAGE.into())?,
        LanguageKind::C => parser.set_language(&tree_sitter_c::LANGUAGE.into())?,
        LanguageKind::Cpp => parser.set_language(&tree_sitter_cpp::LANGUAGE.into())?,
        LanguageKind::Jsp | LanguageKind::Xml => {
            return Err(anyhow!("no tree-sitter table for {lang}"));
        }
    }
    Ok(())
}

/// Parse `text` and return drafts in source order.
pub(crate) fn extract(lang: LanguageKind, path: &str, text: &str) -> Result<Vec<Draft>> {
    let spec = spec_for(lang).ok_or_else(|| anyhow!("extract: unsupported language {lang}"))?;

    let mut parser = Parser::new();
    set_language(&mut parser, lang, path)?;
    let tree = parser
        .parse(text, None)
        .ok_or_else(|| anyhow!("tree-sitter returned no tree for {path}"))?;

    let root = tree.root_node();
    let mut drafts = Vec::new();
    let mut module_run: Option<(usize, usize)> = None;

    let mut cursor = root.walk();
    for child in root.named_children(&mut cursor) {
        let (node, effective) = unwrap_node(child, spec);
        if let Some(kind) = classify(effective.kind(), spec, false) {
            flush_module_run(&mut module_run, path, &mut drafts);
            push_draft(&mut drafts, kind, name_of(effective, text), node);
            if kind == ChunkKind::Class {
                walk_members(effective, spec, text, &mut drafts);
            }
        } else {
            let (s, e) = line_range(node);
            module_run = Some(match module_run {
                Some((rs, _)) => (rs, e),
                None => (s, e),
            });
        }
    }
    flush_module_run(&mut module_run, path, &mut drafts);

    // Error-tolerant grammars still hand back a tree for garbage input; only
    // trust the result when it found real entities.
    let found_entities = drafts.iter().any(|d| d.kind != ChunkKind::Module);
    if root.has_error() && !found_entities {
        return Err(anyhow!("syntax errors and no extractable entities"));
    }

    drafts.sort_by_key(|d| (d.start_line, d.end_line));
    Ok(drafts)
}

/// Emit method chunks for entities nested in a class-like container.
fn walk_members(container: Node<'_>, spec: &LangSpec, text: &str, drafts: &mut Vec<Draft>) {
    let body = container
        .child_by_field_name("body")
        .unwrap_or(container);
    let mut cursor = body.walk();
    for child in body.named_children(&mut cursor) {
        let (node, effective) = unwrap_node(child, spec);
        match classify(effective.kind(), spec, true) {
            Some(ChunkKind::Class) => {
                push_draft(drafts, ChunkKind::Class, name_of(effective, text), node);
                walk_members(effective, spec, text, drafts);
            }
            Some(_) => {
                push_draft(drafts, ChunkKind::Method, name_of(effective, text), node);
            }
            None => {}
        }
    }
}

/// Map a node kind to a chunk kind. Inside a class, functions become methods.
fn classify(kind: &str, spec: &LangSpec, in_class: bool) -> Option<ChunkKind> {
    if spec.class_kinds.contains(&kind) {
        return Some(ChunkKind::Class);
    }
    if spec.function_kinds.contains(&kind) {
        return Some(if in_class {
            ChunkKind::Method
        } else {
            ChunkKind::Function
        });
    }
    if spec.method_kinds.contains(&kind) {
        return Some(ChunkKind::Method);
    }
    None
}

/// Resolve wrapper nodes (decorators, exports) to the wrapped declaration
/// while keeping the wrapper's span for the chunk.
fn unwrap_node<'t>(node: Node<'t>, spec: &LangSpec) -> (Node<'t>, Node<'t>) {
    if spec.unwrap_kinds.contains(&node.kind()) {
        let mut cursor = node.walk();
        for child in node.named_children(&mut cursor) {
            if classify(child.kind(), spec, false).is_some() {
                return (node, child);
            }
        }
    }
    (node, node)
}

/// Best-effort symbol name. Tries the `name` field, then the declarator chain
/// (C/C++), then the `type` field (Rust impl blocks), then the first
/// identifier-like child.
fn name_of(node: Node<'_>, text: &str) -> String {
    if let Some(n) = node.child_by_field_name("name") {
        return node_text(n, text);
    }
    if let Some(d) = node.child_by_field_name("declarator") {
        if d.kind().ends_with("identifier") {
            return node_text(d, text);
        }
        return name_of(d, text);
    }
    if let Some(t) = node.child_by_field_name("type") {
        if t.kind().ends_with("identifier") {
            return node_text(t, text);
        }
    }
    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        if child.kind().ends_with("identifier") {
            return node_text(child, text);
        }
        // Go: type_declaration -> type_spec -> name
        if child.kind() == "type_spec" {
            return name_of(child, text);
        }
    }
    String::from("anonymous")
}

fn node_text(node: Node<'_>, text: &str) -> String {
    node.utf8_text(text.as_bytes())
        .unwrap_or("anonymous")
        .to_string()
}

fn line_range(node: Node<'_>) -> (usize, usize) {
    (node.start_position().row + 1, node.end_position().row + 1)
}

fn push_draft(drafts: &mut Vec<Draft>, kind: ChunkKind, name: String, node: Node<'_>) {
    let (start_line, end_line) = line_range(node);
    drafts.push(Draft {
        kind,
        name,
        start_line,
        end_line,
    });
}

fn flush_module_run(run: &mut Option<(usize, usize)>, path: &str, drafts: &mut Vec<Draft>) {
    if let Some((start_line, end_line)) = run.take() {
        drafts.push(Draft {
            kind: ChunkKind::Module,
            name: format!("{}#module{}", stem(path), drafts.len()),
            start_line,
            end_line,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn java_classes_and_methods_become_chunks() {
        let src = r#"
package shop;

import java.util.List;

public class Foo {
    public void checkout(List items) { }
}

class Bar {
    int total() { return 0; }
}
"#;
        let drafts = extract(LanguageKind::Java, "src/A.java", src).unwrap();
        let classes: Vec<_> = drafts
            .iter()
            .filter(|d| d.kind == ChunkKind::Class)
            .map(|d| d.name.as_str())
            .collect();
        assert_eq!(classes, vec!["Foo", "Bar"]);

        let methods: Vec<_> = drafts
            .iter()
            .filter(|d| d.kind == ChunkKind::Method)
            .map(|d| d.name.as_str())
            .collect();
        assert_eq!(methods, vec!["checkout", "total"]);

        // package + import statements group into one module draft
        assert!(drafts.iter().any(|d| d.kind == ChunkKind::Module));
    }

    #[test]
    fn python_decorated_function_spans_the_decorator() {
        let src = "import os\n\n@cached\ndef load():\n    return os.environ\n";
        let drafts = extract(LanguageKind::Python, "load.py", src).unwrap();
        let func = drafts
            .iter()
            .find(|d| d.kind == ChunkKind::Function)
            .unwrap();
        assert_eq!(func.name, "load");
        assert_eq!(func.start_line, 3); // includes @cached
    }

    #[test]
    fn python_methods_are_tagged_method() {
        let src = "class Cart:\n    def add(self, item):\n        pass\n";
        let drafts = extract(LanguageKind::Python, "cart.py", src).unwrap();
        assert!(drafts
            .iter()
            .any(|d| d.kind == ChunkKind::Method && d.name == "add"));
    }

    #[test]
    fn go_types_and_funcs() {
        let src = "package main\n\ntype Order struct {\n\tID int\n}\n\nfunc Total(o Order) int {\n\treturn o.ID\n}\n";
        let drafts = extract(LanguageKind::Go, "main.go", src).unwrap();
        assert!(drafts
            .iter()
            .any(|d| d.kind == ChunkKind::Class && d.name == "Order"));
        assert!(drafts
            .iter()
            .any(|d| d.kind == ChunkKind::Function && d.name == "Total"));
    }

    #[test]
    fn garbage_without_entities_is_an_error() {
        let src = "%%%% not (valid { java\n";
        assert!(extract(LanguageKind::Java, "bad.java", src).is_err());
    }
}
