//! Syntax check for generated TSX/JSX
//!
//! Stands in for the transpile step: safety-valid code that the TSX grammar
//! cannot parse would fail to load in the sandbox anyway.

use crate::error::CompileError;
use tree_sitter::{Language, Node, Parser};

/// Maximum diagnostics reported per candidate
const MAX_DIAGNOSTICS: usize = 10;
/// Maximum characters of offending source quoted per diagnostic
const SNIPPET_LEN: usize = 40;

/// Tree-sitter backed syntax checker
#[derive(Debug, Clone, Copy, Default)]
pub struct SyntaxChecker;

impl SyntaxChecker {
    /// Create new checker instance
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Parse code and report error/missing nodes
    ///
    /// # Errors
    /// - `CompileError::Syntax` with one line per error node
    /// - `CompileError::ParserUnavailable` if the grammar cannot be loaded
    pub fn check(&self, code: &str) -> Result<(), CompileError> {
        let language: Language = tree_sitter_typescript::LANGUAGE_TSX.into();
        let mut parser = Parser::new();
        parser
            .set_language(&language)
            .map_err(|e| CompileError::ParserUnavailable(e.to_string()))?;

        let tree = parser.parse(code, None).ok_or(CompileError::ParseAborted)?;
        let root = tree.root_node();
        if !root.has_error() {
            return Ok(());
        }

        let mut broken: Vec<Node<'_>> = Vec::new();
        let mut stack = vec![root];
        while let Some(node) = stack.pop() {
            if node.is_error() || node.is_missing() {
                broken.push(node);
                continue;
            }
            if node.has_error() {
                let mut cursor = node.walk();
                stack.extend(node.children(&mut cursor));
            }
        }
        broken.sort_by_key(Node::start_byte);

        let diagnostics: Vec<String> = broken
            .iter()
            .take(MAX_DIAGNOSTICS)
            .map(|node| describe(*node, code))
            .collect();

        tracing::debug!(errors = broken.len(), "Syntax check failed");
        Err(CompileError::Syntax(diagnostics))
    }
}

fn describe(node: Node<'_>, code: &str) -> String {
    let pos = node.start_position();
    if node.is_missing() {
        return format!("line {}:{}: missing `{}`", pos.row + 1, pos.column + 1, node.kind());
    }

    let text = node.utf8_text(code.as_bytes()).unwrap_or_default();
    let snippet: String = text.split_whitespace().collect::<Vec<_>>().join(" ");
    let snippet: String = snippet.chars().take(SNIPPET_LEN).collect();
    format!("line {}:{}: unexpected syntax near `{}`", pos.row + 1, pos.column + 1, snippet)
}
