//! CommonJS export scanner.
//!
//! Extracts the export surface a CommonJS module would present at runtime by
//! reading its source: `exports.X = …` and `module.exports.X = …`
//! assignments, `Object.defineProperty(exports, …)` calls (both the
//! `__esModule` marker and getter-style re-exports), and wholesale
//! `module.exports = {…}` replacement. Applies assignments in source order
//! with last-wins semantics, and honors the detach rule: after
//! `module.exports` is replaced, plain `exports.X = …` writes go to the
//! detached object and are invisible to consumers.

use std::fs;
use std::path::Path;

use rustc_hash::FxHashSet;
use streaming_iterator::StreamingIterator;
use tracing::debug;
use tree_sitter::{Node, Parser, Query, QueryCursor};

use crate::errors::ScanError;
use crate::host::{DefaultBinding, ESMODULE_FLAG};

use super::types::{ScannedExportKind, ScannedSurface};

const ASSIGN_QUERY: &str = r#"
(assignment_expression
  left: (member_expression
    object: (identifier) @object
    property: (property_identifier) @key)
  right: (_) @value) @assign
"#;

const MEMBER_ASSIGN_QUERY: &str = r#"
(assignment_expression
  left: (member_expression
    object: (member_expression
      object: (identifier) @root
      property: (property_identifier) @object)
    property: (property_identifier) @key)
  right: (_) @value) @assign
"#;

const DEFINE_QUERY: &str = r#"
(call_expression
  function: (member_expression
    object: (identifier) @callee
    property: (property_identifier) @method)
  arguments: (arguments
    (identifier) @target
    (string) @key
    (object) @descriptor)) @call
"#;

const DECL_QUERY: &str = r#"
(class_declaration name: (identifier) @class)
(function_declaration name: (identifier) @function)
(variable_declarator
  name: (identifier) @variable
  value: (_) @variable_value)
"#;

/// Static classification of an assigned value.
#[derive(Debug, Clone, PartialEq)]
enum ValueClass {
    /// The exports object itself (`exports` or `module.exports`).
    SelfReference,
    /// A class or function.
    Callable,
    /// An identifier naming a locally declared callable.
    Alias(String),
    Bool(bool),
    /// `undefined` or `void 0`: assigned but not defined.
    UndefinedValue,
    Unknown,
}

/// One observed write to the export surface, tagged with its source position
/// so writes apply in order.
#[derive(Debug)]
enum ExportEvent {
    /// `exports.key = value` or `Object.defineProperty(exports, "key", …)`.
    ExportsProp { key: String, value: ValueClass },
    /// `module.exports.key = value`; writes through, even after replacement.
    ModuleExportsProp { key: String, value: ValueClass },
    /// `module.exports = …` replacement with any object-literal fields.
    Replace { fields: Vec<(String, ValueClass)> },
}

pub struct CjsScanner {
    parser: Parser,
    assign_query: Query,
    member_assign_query: Query,
    define_query: Query,
    decl_query: Query,
}

impl CjsScanner {
    pub fn new() -> Result<Self, ScanError> {
        let language = tree_sitter_javascript::LANGUAGE;
        let mut parser = Parser::new();
        parser.set_language(&language.into())?;

        let assign_query = Query::new(&language.into(), ASSIGN_QUERY)?;
        let member_assign_query = Query::new(&language.into(), MEMBER_ASSIGN_QUERY)?;
        let define_query = Query::new(&language.into(), DEFINE_QUERY)?;
        let decl_query = Query::new(&language.into(), DECL_QUERY)?;

        Ok(Self {
            parser,
            assign_query,
            member_assign_query,
            define_query,
            decl_query,
        })
    }

    pub fn scan_file(&mut self, path: &Path) -> Result<ScannedSurface, ScanError> {
        let source = fs::read_to_string(path).map_err(|source| ScanError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        self.scan(&source)
    }

    pub fn scan(&mut self, source: &str) -> Result<ScannedSurface, ScanError> {
        let tree = self.parser.parse(source, None).ok_or_else(|| ScanError::Parse {
            message: "tree-sitter produced no tree".to_string(),
        })?;
        let root = tree.root_node();

        let callables = self.collect_callables(root, source);

        let mut events: Vec<(usize, ExportEvent)> = Vec::new();
        self.collect_assignments(root, source, &callables, &mut events);
        self.collect_member_assignments(root, source, &callables, &mut events);
        self.collect_defines(root, source, &callables, &mut events);
        events.sort_by_key(|(position, _)| *position);

        let surface = fold_events(events);
        debug!(
            target: "modshape::scan",
            exports = surface.exports.len(),
            flag = surface.esmodule_flag,
            replaced = surface.replaced_module_exports,
            "cjs scan complete"
        );
        Ok(surface)
    }

    /// Names of locally declared classes and functions, used to classify
    /// identifier right-hand sides.
    fn collect_callables(&self, root: Node, source: &str) -> FxHashSet<String> {
        let mut callables = FxHashSet::default();
        let mut cursor = QueryCursor::new();
        let mut matches = cursor.matches(&self.decl_query, root, source.as_bytes());
        while let Some(m) = matches.next() {
            let mut variable: Option<&str> = None;
            let mut variable_callable = false;
            for capture in m.captures {
                let capture_name = &self.decl_query.capture_names()[capture.index as usize];
                let text = node_text(capture.node, source);
                match *capture_name {
                    "class" | "function" => {
                        callables.insert(text.to_string());
                    }
                    "variable" => variable = Some(text),
                    "variable_value" => {
                        variable_callable = is_callable_kind(capture.node.kind());
                    }
                    _ => {}
                }
            }
            if let (Some(name), true) = (variable, variable_callable) {
                callables.insert(name.to_string());
            }
        }
        callables
    }

    /// `exports.key = value` assignments, plus `module.exports = value`
    /// replacement (the left side is `module.exports`, which this pattern
    /// sees as object `module`, key `exports`).
    fn collect_assignments(
        &self,
        root: Node,
        source: &str,
        callables: &FxHashSet<String>,
        events: &mut Vec<(usize, ExportEvent)>,
    ) {
        let mut cursor = QueryCursor::new();
        let mut matches = cursor.matches(&self.assign_query, root, source.as_bytes());
        while let Some(m) = matches.next() {
            let mut object = "";
            let mut key = "";
            let mut value: Option<Node> = None;
            let mut position = 0usize;
            for capture in m.captures {
                let capture_name = &self.assign_query.capture_names()[capture.index as usize];
                match *capture_name {
                    "object" => object = node_text(capture.node, source),
                    "key" => key = node_text(capture.node, source),
                    "value" => value = Some(capture.node),
                    "assign" => position = capture.node.start_byte(),
                    _ => {}
                }
            }
            let Some(value) = value else { continue };

            if object == "exports" {
                events.push((
                    position,
                    ExportEvent::ExportsProp {
                        key: key.to_string(),
                        value: classify_value(value, source, callables),
                    },
                ));
            } else if object == "module" && key == "exports" {
                events.push((
                    position,
                    ExportEvent::Replace {
                        fields: object_literal_fields(value, source, callables),
                    },
                ));
            }
        }
    }

    /// `module.exports.key = value` assignments.
    fn collect_member_assignments(
        &self,
        root: Node,
        source: &str,
        callables: &FxHashSet<String>,
        events: &mut Vec<(usize, ExportEvent)>,
    ) {
        let mut cursor = QueryCursor::new();
        let mut matches = cursor.matches(&self.member_assign_query, root, source.as_bytes());
        while let Some(m) = matches.next() {
            let mut root_name = "";
            let mut object = "";
            let mut key = "";
            let mut value: Option<Node> = None;
            let mut position = 0usize;
            for capture in m.captures {
                let capture_name =
                    &self.member_assign_query.capture_names()[capture.index as usize];
                match *capture_name {
                    "root" => root_name = node_text(capture.node, source),
                    "object" => object = node_text(capture.node, source),
                    "key" => key = node_text(capture.node, source),
                    "value" => value = Some(capture.node),
                    "assign" => position = capture.node.start_byte(),
                    _ => {}
                }
            }
            if root_name != "module" || object != "exports" {
                continue;
            }
            let Some(value) = value else { continue };
            events.push((
                position,
                ExportEvent::ModuleExportsProp {
                    key: key.to_string(),
                    value: classify_value(value, source, callables),
                },
            ));
        }
    }

    /// `Object.defineProperty(exports, "key", descriptor)` calls. The
    /// descriptor's `value` classifies like an assignment; a `get` descriptor
    /// is a defined export of unknown shape.
    fn collect_defines(
        &self,
        root: Node,
        source: &str,
        callables: &FxHashSet<String>,
        events: &mut Vec<(usize, ExportEvent)>,
    ) {
        let mut cursor = QueryCursor::new();
        let mut matches = cursor.matches(&self.define_query, root, source.as_bytes());
        while let Some(m) = matches.next() {
            let mut callee = "";
            let mut method = "";
            let mut target = "";
            let mut key = "";
            let mut descriptor: Option<Node> = None;
            let mut position = 0usize;
            for capture in m.captures {
                let capture_name = &self.define_query.capture_names()[capture.index as usize];
                match *capture_name {
                    "callee" => callee = node_text(capture.node, source),
                    "method" => method = node_text(capture.node, source),
                    "target" => target = node_text(capture.node, source),
                    "key" => key = node_text(capture.node, source),
                    "descriptor" => descriptor = Some(capture.node),
                    "call" => position = capture.node.start_byte(),
                    _ => {}
                }
            }
            if callee != "Object" || method != "defineProperty" || target != "exports" {
                continue;
            }
            let Some(descriptor) = descriptor else { continue };
            events.push((
                position,
                ExportEvent::ExportsProp {
                    key: strip_quotes(key).to_string(),
                    value: descriptor_class(descriptor, source, callables),
                },
            ));
        }
    }
}

fn node_text<'a>(node: Node, source: &'a str) -> &'a str {
    node.utf8_text(source.as_bytes()).unwrap_or("")
}

fn strip_quotes(text: &str) -> &str {
    text.trim_matches(|c| c == '"' || c == '\'')
}

fn is_callable_kind(kind: &str) -> bool {
    matches!(
        kind,
        "class"
            | "class_expression"
            | "function"
            | "function_expression"
            | "arrow_function"
            | "generator_function"
    )
}

fn classify_value(mut node: Node, source: &str, callables: &FxHashSet<String>) -> ValueClass {
    // A chained assignment classifies as its ultimate right-hand side.
    while node.kind() == "assignment_expression" {
        match node.child_by_field_name("right") {
            Some(right) => node = right,
            None => return ValueClass::Unknown,
        }
    }

    let kind = node.kind();
    if is_callable_kind(kind) {
        return ValueClass::Callable;
    }
    match kind {
        "identifier" => {
            let text = node_text(node, source);
            match text {
                "exports" => ValueClass::SelfReference,
                "undefined" => ValueClass::UndefinedValue,
                name if callables.contains(name) => ValueClass::Alias(name.to_string()),
                _ => ValueClass::Unknown,
            }
        }
        "member_expression" => {
            if node_text(node, source) == "module.exports" {
                ValueClass::SelfReference
            } else {
                ValueClass::Unknown
            }
        }
        "true" => ValueClass::Bool(true),
        "false" => ValueClass::Bool(false),
        // `void 0`
        "unary_expression" => {
            if node_text(node, source).starts_with("void") {
                ValueClass::UndefinedValue
            } else {
                ValueClass::Unknown
            }
        }
        _ => ValueClass::Unknown,
    }
}

/// Fields of a `module.exports = {…}` object literal. A non-literal
/// replacement contributes no named exports.
fn object_literal_fields(
    node: Node,
    source: &str,
    callables: &FxHashSet<String>,
) -> Vec<(String, ValueClass)> {
    if node.kind() != "object" {
        return Vec::new();
    }
    let mut fields = Vec::new();
    for i in 0..node.named_child_count() {
        let Some(child) = node.named_child(i) else { continue };
        match child.kind() {
            "pair" => {
                let Some(key) = child.child_by_field_name("key") else { continue };
                let Some(value) = child.child_by_field_name("value") else { continue };
                fields.push((
                    strip_quotes(node_text(key, source)).to_string(),
                    classify_value(value, source, callables),
                ));
            }
            "shorthand_property_identifier" => {
                let name = node_text(child, source);
                let class = if callables.contains(name) {
                    ValueClass::Alias(name.to_string())
                } else {
                    ValueClass::Unknown
                };
                fields.push((name.to_string(), class));
            }
            _ => {}
        }
    }
    fields
}

fn descriptor_class(descriptor: Node, source: &str, callables: &FxHashSet<String>) -> ValueClass {
    for i in 0..descriptor.named_child_count() {
        let Some(child) = descriptor.named_child(i) else { continue };
        if child.kind() != "pair" {
            continue;
        }
        let Some(key) = child.child_by_field_name("key") else { continue };
        match strip_quotes(node_text(key, source)) {
            "value" => {
                return child
                    .child_by_field_name("value")
                    .map(|value| classify_value(value, source, callables))
                    .unwrap_or(ValueClass::Unknown);
            }
            "get" => return ValueClass::Unknown,
            _ => {}
        }
    }
    ValueClass::UndefinedValue
}

fn fold_events(events: Vec<(usize, ExportEvent)>) -> ScannedSurface {
    let mut surface = ScannedSurface::default();
    for (_, event) in events {
        match event {
            ExportEvent::ExportsProp { key, value } => {
                if !surface.replaced_module_exports {
                    apply_prop(&mut surface, key, value);
                }
            }
            ExportEvent::ModuleExportsProp { key, value } => {
                apply_prop(&mut surface, key, value);
            }
            ExportEvent::Replace { fields } => {
                surface.replaced_module_exports = true;
                surface.esmodule_flag = false;
                surface.default_binding = DefaultBinding::Absent;
                surface.exports.clear();
                for (key, value) in fields {
                    apply_prop(&mut surface, key, value);
                }
            }
        }
    }
    surface
}

fn apply_prop(surface: &mut ScannedSurface, key: String, value: ValueClass) {
    if key == ESMODULE_FLAG {
        surface.esmodule_flag = matches!(value, ValueClass::Bool(true));
        return;
    }
    if key == "default" {
        surface.default_binding = match value {
            ValueClass::SelfReference => DefaultBinding::SelfReference,
            ValueClass::Alias(name) => DefaultBinding::Alias(name),
            ValueClass::UndefinedValue => DefaultBinding::Absent,
            _ => DefaultBinding::Stub,
        };
        return;
    }
    match value {
        ValueClass::UndefinedValue => {
            surface.exports.remove(&key);
        }
        ValueClass::Callable | ValueClass::Alias(_) => {
            surface.exports.insert(key, ScannedExportKind::Callable);
        }
        ValueClass::SelfReference | ValueClass::Bool(_) | ValueClass::Unknown => {
            surface.exports.insert(key, ScannedExportKind::Unknown);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scan(source: &str) -> ScannedSurface {
        CjsScanner::new().unwrap().scan(source).unwrap()
    }

    #[test]
    fn scans_a_transpiled_bundle() {
        let surface = scan(
            r#"
"use strict";
Object.defineProperty(exports, "__esModule", { value: true });
exports.Language = exports.Parser = void 0;
class Parser {
    static init() { return Promise.resolve(); }
}
exports.Parser = Parser;
class Language {
    static load(path) { return Promise.resolve(); }
}
exports.Language = Language;
"#,
        );
        assert!(surface.esmodule_flag);
        assert_eq!(surface.default_binding, DefaultBinding::Absent);
        assert_eq!(surface.names(), ["Language", "Parser"]);
        assert_eq!(surface.exports["Parser"], ScannedExportKind::Callable);
        assert_eq!(surface.exports["Language"], ScannedExportKind::Callable);
    }

    #[test]
    fn detects_the_self_reference_default_patch() {
        let surface = scan(
            r#"
Object.defineProperty(exports, "__esModule", { value: true });
class Parser {}
exports.Parser = Parser;
exports.default = exports;
"#,
        );
        assert_eq!(surface.default_binding, DefaultBinding::SelfReference);
    }

    #[test]
    fn detects_default_aliasing_a_named_export() {
        let surface = scan(
            r#"
class Parser {}
exports.Parser = Parser;
exports.default = Parser;
"#,
        );
        assert_eq!(surface.default_binding, DefaultBinding::Alias("Parser".into()));
    }

    #[test]
    fn void_preamble_does_not_define_exports() {
        let surface = scan("exports.default = exports.Parser = void 0;\n");
        assert_eq!(surface.default_binding, DefaultBinding::Absent);
        assert!(surface.exports.is_empty());
    }

    #[test]
    fn getter_reexports_count_as_defined_exports() {
        let surface = scan(
            r#"
Object.defineProperty(exports, "Parser", { enumerable: true, get: function () { return parser_1.Parser; } });
"#,
        );
        assert_eq!(surface.exports["Parser"], ScannedExportKind::Unknown);
    }

    #[test]
    fn module_exports_replacement_discards_earlier_writes() {
        let surface = scan(
            r#"
exports.__esModule = true;
exports.old = function () {};
module.exports = { probe: () => {}, version: "1.0.0" };
exports.ignored = function () {};
module.exports.patched = function () {};
"#,
        );
        assert!(surface.replaced_module_exports);
        assert!(!surface.esmodule_flag);
        assert_eq!(surface.names(), ["patched", "probe", "version"]);
        assert_eq!(surface.exports["probe"], ScannedExportKind::Callable);
        assert_eq!(surface.exports["version"], ScannedExportKind::Unknown);
        assert_eq!(surface.exports["patched"], ScannedExportKind::Callable);
    }

    #[test]
    fn module_exports_self_reference_via_member_write() {
        let surface = scan(
            r#"
class Parser {}
module.exports.Parser = Parser;
module.exports.default = module.exports;
"#,
        );
        assert_eq!(surface.default_binding, DefaultBinding::SelfReference);
        assert_eq!(surface.exports["Parser"], ScannedExportKind::Callable);
    }

    #[test]
    fn arrow_and_var_callables_classify() {
        let surface = scan(
            r#"
const make = () => {};
exports.make = make;
exports.inline = function () {};
exports.flagged = true;
"#,
        );
        assert_eq!(surface.exports["make"], ScannedExportKind::Callable);
        assert_eq!(surface.exports["inline"], ScannedExportKind::Callable);
        assert_eq!(surface.exports["flagged"], ScannedExportKind::Unknown);
    }

    #[test]
    fn unparseable_garbage_still_yields_a_surface() {
        // Error nodes are tolerated; the scan reports what it can see.
        let surface = scan("exports.ok = function () {}; ]]][[");
        assert_eq!(surface.exports["ok"], ScannedExportKind::Callable);
    }
}
