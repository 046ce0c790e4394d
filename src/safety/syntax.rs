//! Syntax checks for proposed and applied file content.
//!
//! Source languages go through tree-sitter; JSON and YAML through their serde
//! parsers. File types with no parser here are accepted as-is.

use std::cell::RefCell;
use std::path::Path;

use tree_sitter::{Language, Node, Parser, Tree};

use crate::error::{Result, TidyError};

/// A thread's parser for one grammar, or why the grammar failed to load.
type ParserSlot = RefCell<std::result::Result<Parser, String>>;

fn load_parser(name: &str, language: Language) -> ParserSlot {
    let mut parser = Parser::new();
    RefCell::new(match parser.set_language(&language) {
        Ok(()) => Ok(parser),
        Err(e) => {
            log::error!("Failed to load the {} grammar: {}", name, e);
            Err(format!("{} grammar unavailable: {}", name, e))
        }
    })
}

thread_local! {
    static RUST_PARSER: ParserSlot = load_parser("Rust", tree_sitter_rust::LANGUAGE.into());
    static PYTHON_PARSER: ParserSlot = load_parser("Python", tree_sitter_python::LANGUAGE.into());
    static JS_PARSER: ParserSlot = load_parser("JavaScript", tree_sitter_javascript::LANGUAGE.into());
    static TS_PARSER: ParserSlot = load_parser("TypeScript", tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into());
    static TSX_PARSER: ParserSlot = load_parser("TSX", tree_sitter_typescript::LANGUAGE_TSX.into());
    static GO_PARSER: ParserSlot = load_parser("Go", tree_sitter_go::LANGUAGE.into());
}

fn parse_with(slot: &ParserSlot, content: &str) -> std::result::Result<Tree, String> {
    match &mut *slot.borrow_mut() {
        Ok(parser) => parser
            .parse(content, None)
            .ok_or_else(|| "parser produced no tree".to_string()),
        Err(reason) => Err(reason.clone()),
    }
}

/// Which parser a file goes through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyntaxKind {
    Rust,
    Python,
    JavaScript,
    TypeScript,
    Tsx,
    Go,
    Json,
    Yaml,
    Unsupported,
}

impl SyntaxKind {
    pub fn from_path(path: &Path) -> Self {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();
        match ext.as_str() {
            "rs" => SyntaxKind::Rust,
            "py" | "pyi" => SyntaxKind::Python,
            "js" | "mjs" | "cjs" | "jsx" => SyntaxKind::JavaScript,
            "ts" | "mts" | "cts" => SyntaxKind::TypeScript,
            "tsx" => SyntaxKind::Tsx,
            "go" => SyntaxKind::Go,
            "json" => SyntaxKind::Json,
            "yml" | "yaml" => SyntaxKind::Yaml,
            _ => SyntaxKind::Unsupported,
        }
    }
}

/// Check that `content` parses as the language implied by `path`.
pub fn check_syntax(path: &Path, content: &str) -> Result<()> {
    let kind = SyntaxKind::from_path(path);
    let outcome = match kind {
        SyntaxKind::Unsupported => Ok(()),
        SyntaxKind::Json => serde_json::from_str::<serde_json::Value>(content)
            .map(|_| ())
            .map_err(|e| e.to_string()),
        SyntaxKind::Yaml => serde_yaml::from_str::<serde_yaml::Value>(content)
            .map(|_| ())
            .map_err(|e| e.to_string()),
        _ => check_tree_sitter(kind, content),
    };
    outcome.map_err(|reason| TidyError::Validation(format!("{}: {}", path.display(), reason)))
}

pub fn is_valid(path: &Path, content: &str) -> bool {
    check_syntax(path, content).is_ok()
}

fn check_tree_sitter(kind: SyntaxKind, content: &str) -> std::result::Result<(), String> {
    let tree = match kind {
        SyntaxKind::Rust => RUST_PARSER.with(|p| parse_with(p, content)),
        SyntaxKind::Python => PYTHON_PARSER.with(|p| parse_with(p, content)),
        SyntaxKind::JavaScript => JS_PARSER.with(|p| parse_with(p, content)),
        SyntaxKind::TypeScript => TS_PARSER.with(|p| parse_with(p, content)),
        SyntaxKind::Tsx => TSX_PARSER.with(|p| parse_with(p, content)),
        SyntaxKind::Go => GO_PARSER.with(|p| parse_with(p, content)),
        _ => return Ok(()),
    }?;

    let root = tree.root_node();
    if !root.has_error() {
        return Ok(());
    }
    match first_error(root) {
        Some(node) => {
            let pos = node.start_position();
            Err(format!("syntax error at line {}, column {}", pos.row + 1, pos.column + 1))
        }
        None => Err("syntax errors detected".to_string()),
    }
}

/// Depth-first search for the first ERROR or MISSING node.
fn first_error(node: Node<'_>) -> Option<Node<'_>> {
    if node.is_error() || node.is_missing() {
        return Some(node);
    }
    if !node.has_error() {
        return None;
    }
    let mut cursor = node.walk();
    let children: Vec<Node<'_>> = node.children(&mut cursor).collect();
    children.into_iter().find_map(first_error)
}
