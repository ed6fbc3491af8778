//! ES module and declaration-file scanner.
//!
//! Reads the export surface a module *declares*: named exports (clause and
//! declaration forms, including ambient `declare` wrapping in `.d.ts` files),
//! default exports in both the keyword and `export { X as default }`
//! spellings, and TypeScript `export =` assignments.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use rustc_hash::FxHashSet;
use streaming_iterator::StreamingIterator;
use tracing::debug;
use tree_sitter::{Node, Parser, Query, QueryCursor};

use crate::errors::ScanError;

use super::types::{DeclaredExport, DeclaredSurface, ScannedExportKind};

const CLAUSE_QUERY: &str = r#"
(export_statement
  (export_clause
    (export_specifier) @specifier))
"#;

pub struct EsmScanner {
    parser: Parser,
    clause_query: Query,
}

impl EsmScanner {
    pub fn new() -> Result<Self, ScanError> {
        let language = tree_sitter_typescript::LANGUAGE_TYPESCRIPT;
        let mut parser = Parser::new();
        parser.set_language(&language.into())?;
        let clause_query = Query::new(&language.into(), CLAUSE_QUERY)?;
        Ok(Self {
            parser,
            clause_query,
        })
    }

    pub fn scan_file(&mut self, path: &Path) -> Result<DeclaredSurface, ScanError> {
        let source = fs::read_to_string(path).map_err(|source| ScanError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        self.scan(&source)
    }

    pub fn scan(&mut self, source: &str) -> Result<DeclaredSurface, ScanError> {
        let tree = self.parser.parse(source, None).ok_or_else(|| ScanError::Parse {
            message: "tree-sitter produced no tree".to_string(),
        })?;
        let root = tree.root_node();

        let callables = collect_callables(root, source);

        let mut named: BTreeMap<String, ScannedExportKind> = BTreeMap::new();
        let mut has_default = false;
        let mut export_assignment = false;

        // Clause form: `export { Parser, Language as Lang, X as default }`.
        let mut cursor = QueryCursor::new();
        let mut matches = cursor.matches(&self.clause_query, root, source.as_bytes());
        while let Some(m) = matches.next() {
            for capture in m.captures {
                let specifier = capture.node;
                let Some(name_node) = specifier.child_by_field_name("name") else {
                    continue;
                };
                let local = node_text(name_node, source);
                let exported = specifier
                    .child_by_field_name("alias")
                    .map(|alias| node_text(alias, source))
                    .unwrap_or(local);
                if exported == "default" {
                    has_default = true;
                } else if !exported.is_empty() {
                    let kind = if callables.contains(local) {
                        ScannedExportKind::Callable
                    } else {
                        ScannedExportKind::Unknown
                    };
                    upgrade(&mut named, exported, kind);
                }
            }
        }

        // Keyword and declaration forms, walked per export statement so the
        // `default` keyword and `export =` token are visible.
        walk(root, &mut |node| {
            if node.kind() != "export_statement" {
                return;
            }
            let mut is_default = false;
            let mut is_assignment = false;
            for i in 0..node.child_count() {
                match node.child(i).map(|c| c.kind()) {
                    Some("default") => is_default = true,
                    Some("=") => is_assignment = true,
                    _ => {}
                }
            }
            if is_assignment {
                export_assignment = true;
                return;
            }
            if is_default {
                has_default = true;
                // The declaration, if any, is the default value, not a named
                // export.
                return;
            }
            collect_declared(node, source, &mut named);
        });

        let surface = DeclaredSurface {
            has_default,
            named: named
                .into_iter()
                .map(|(name, kind)| DeclaredExport { name, kind })
                .collect(),
            export_assignment,
        };
        debug!(
            target: "modshape::scan",
            named = surface.named.len(),
            has_default = surface.has_default,
            export_assignment = surface.export_assignment,
            "esm scan complete"
        );
        Ok(surface)
    }
}

/// Exported declarations directly under an export statement, peeling any
/// ambient `declare` wrapping on the way down. Stops at the declaration
/// itself: bindings inside a function or class body are not exports.
fn collect_declared(
    statement: Node,
    source: &str,
    named: &mut BTreeMap<String, ScannedExportKind>,
) {
    fn descend(node: Node, source: &str, named: &mut BTreeMap<String, ScannedExportKind>) {
        match node.kind() {
            "class_declaration" | "function_declaration" | "abstract_class_declaration" => {
                if let Some(name) = node.child_by_field_name("name") {
                    upgrade(
                        named,
                        node_text(name, source),
                        ScannedExportKind::Callable,
                    );
                }
            }
            "variable_declarator" => {
                let Some(name) = node.child_by_field_name("name") else {
                    return;
                };
                let kind = node
                    .child_by_field_name("value")
                    .map(|value| {
                        if is_callable_kind(value.kind()) {
                            ScannedExportKind::Callable
                        } else {
                            ScannedExportKind::Unknown
                        }
                    })
                    .unwrap_or(ScannedExportKind::Unknown);
                upgrade(named, node_text(name, source), kind);
            }
            _ => {
                for i in 0..node.child_count() {
                    if let Some(child) = node.child(i) {
                        descend(child, source, named);
                    }
                }
            }
        }
    }
    descend(statement, source, named);
}

/// Names of classes and functions declared anywhere in the file, ambient or
/// not. Clause exports resolve against these.
fn collect_callables(root: Node, source: &str) -> FxHashSet<String> {
    let mut callables = FxHashSet::default();
    walk(root, &mut |node| {
        if matches!(
            node.kind(),
            "class_declaration" | "function_declaration" | "abstract_class_declaration"
        ) {
            if let Some(name) = node.child_by_field_name("name") {
                callables.insert(node_text(name, source).to_string());
            }
        }
    });
    callables
}

fn upgrade(named: &mut BTreeMap<String, ScannedExportKind>, name: &str, kind: ScannedExportKind) {
    match named.get(name) {
        Some(ScannedExportKind::Callable) => {}
        _ => {
            named.insert(name.to_string(), kind);
        }
    }
}

fn walk(node: Node, visit: &mut impl FnMut(Node)) {
    visit(node);
    for i in 0..node.child_count() {
        if let Some(child) = node.child(i) {
            walk(child, visit);
        }
    }
}

fn node_text<'a>(node: Node, source: &'a str) -> &'a str {
    node.utf8_text(source.as_bytes()).unwrap_or("")
}

fn is_callable_kind(kind: &str) -> bool {
    matches!(
        kind,
        "class" | "function_expression" | "arrow_function" | "generator_function"
    )
}
