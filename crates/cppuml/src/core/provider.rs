//! Syntax-tree provider abstraction
//!
//! A provider turns one source unit into a [`SyntaxTree`] and computes the
//! canonical identities the extraction engine relies on.

use std::path::Path;

use super::{Diagnostic, SyntaxTree, UmlError};

/// Output of a successful parse
#[derive(Debug, Clone)]
pub struct ParsedUnit {
    pub tree: SyntaxTree,
    pub diagnostics: Vec<Diagnostic>,
}

impl ParsedUnit {
    pub fn new(tree: SyntaxTree) -> Self {
        Self {
            tree,
            diagnostics: Vec::new(),
        }
    }

    pub fn with_diagnostics(mut self, diagnostics: Vec<Diagnostic>) -> Self {
        self.diagnostics = diagnostics;
        self
    }
}

/// Core trait for syntax-tree providers
///
/// `flags` are compiler-style arguments passed through opaquely. Only a unit
/// for which no tree can be produced is an error; recoverable syntax errors
/// are reported as diagnostics.
pub trait SyntaxProvider: Send + Sync {
    fn parse(&self, path: &Path, flags: &[String]) -> Result<ParsedUnit, UmlError>;

    /// Get the name of this provider
    fn name(&self) -> &'static str;
}
