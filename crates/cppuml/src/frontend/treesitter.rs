//! Tree-sitter front-end
//!
//! Parses a unit with tree-sitter-cpp, hands the concrete syntax tree to the
//! lowering pass and turns `ERROR`/`MISSING` nodes into diagnostics.

use std::path::Path;

use tracing::{debug, span, Level};
use tree_sitter::{Node, Parser, Tree};

use super::lower::Lowering;
use super::SearchPaths;
use crate::core::{Diagnostic, ParsedUnit, Severity, SyntaxProvider, UmlError};

/// Upper bound on syntax diagnostics reported for one unit
pub(super) const MAX_DIAGNOSTICS: usize = 64;

const SNIPPET_LEN: usize = 40;

/// C++ front-end backed by tree-sitter-cpp
///
/// Headers reached through `#include` are parsed as well so that names they
/// declare can be resolved; their nodes carry their own file ids. Macros are
/// not expanded.
#[derive(Debug, Clone, Copy, Default)]
pub struct TreeSitterProvider;

impl TreeSitterProvider {
    pub fn new() -> Self {
        Self
    }

    /// Parse `source` as if it were the contents of `path`
    pub fn parse_str(
        &self,
        path: &Path,
        source: &str,
        flags: &[String],
    ) -> Result<ParsedUnit, UmlError> {
        let parse_span = span!(Level::DEBUG, "treesitter_parse", path = %path.display());
        let _enter = parse_span.enter();

        let mut parser = new_parser().map_err(|message| UmlError::provider_failure(path, message))?;
        let tree = parser
            .parse(source, None)
            .ok_or_else(|| UmlError::provider_failure(path, "parser produced no tree"))?;

        let search = SearchPaths::from_flags(flags);
        let mut lowering = Lowering::new(&mut parser, &search, path);
        lowering.lower_main(source, &tree);
        let parsed = lowering.finish();

        debug!(
            nodes = parsed.tree.node_count(),
            files = parsed.tree.file_count(),
            diagnostics = parsed.diagnostics.len(),
            "Lowered syntax tree"
        );
        Ok(parsed)
    }
}

impl SyntaxProvider for TreeSitterProvider {
    fn parse(&self, path: &Path, flags: &[String]) -> Result<ParsedUnit, UmlError> {
        let source = std::fs::read_to_string(path)
            .map_err(|e| UmlError::provider_failure(path, e.to_string()))?;
        self.parse_str(path, &source, flags)
    }

    fn name(&self) -> &'static str {
        "tree-sitter-cpp"
    }
}

fn new_parser() -> Result<Parser, String> {
    let mut parser = Parser::new();
    parser
        .set_language(&tree_sitter_cpp::LANGUAGE.into())
        .map_err(|e| format!("failed to load C++ grammar: {}", e))?;
    Ok(parser)
}

pub(super) fn parse_source(parser: &mut Parser, source: &str) -> Option<Tree> {
    parser.parse(source, None)
}

/// Report error and missing nodes of `root`, in source order
pub(super) fn collect_diagnostics(
    root: Node<'_>,
    file_name: &str,
    source: &str,
    out: &mut Vec<Diagnostic>,
) {
    let mut stack = vec![root];
    while let Some(node) = stack.pop() {
        if out.len() >= MAX_DIAGNOSTICS {
            return;
        }
        let message = if node.is_missing() {
            format!("missing `{}`", node.kind())
        } else if node.is_error() {
            let text = node.utf8_text(source.as_bytes()).unwrap_or("");
            let snippet: String = normalize(text).chars().take(SNIPPET_LEN).collect();
            format!("syntax error near `{}`", snippet)
        } else {
            if node.has_error() {
                let mut cursor = node.walk();
                let children: Vec<Node<'_>> = node.children(&mut cursor).collect();
                stack.extend(children.into_iter().rev());
            }
            continue;
        };
        let position = node.start_position();
        out.push(Diagnostic {
            file: file_name.to_string(),
            line: position.row as u32 + 1,
            column: position.column as u32 + 1,
            severity: Severity::Error,
            message,
        });
    }
}

/// Collapse whitespace runs into single spaces
pub(super) fn normalize(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
