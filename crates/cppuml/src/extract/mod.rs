//! Model extraction for a single translation unit
//!
//! [`extract_unit`] is the per-unit entry point: it asks a provider for a
//! tree, surfaces the provider's diagnostics and runs the [`Engine`].

mod engine;
mod types;

pub use engine::{extract_tree, Engine};
pub use types::build_type;

use std::path::Path;

use tracing::{info, span, warn, Level};

use crate::core::{ParsedUnit, SyntaxProvider, TranslationUnit, UmlError};

/// Extract the model of the unit at `path`
///
/// A provider failure concerns this unit only; diagnostics never block
/// extraction.
pub fn extract_unit<P: SyntaxProvider + ?Sized>(
    provider: &P,
    path: &Path,
    flags: &[String],
) -> Result<TranslationUnit, UmlError> {
    let unit_span = span!(Level::INFO, "extract_unit", path = %path.display());
    let _enter = unit_span.enter();

    let parsed = provider.parse(path, flags)?;
    Ok(extract_parsed(parsed))
}

/// Run the engine over an already parsed unit
pub fn extract_parsed(parsed: ParsedUnit) -> TranslationUnit {
    for diagnostic in &parsed.diagnostics {
        warn!(%diagnostic, "Provider diagnostic");
    }
    let mut unit = extract_tree(&parsed.tree);
    unit.diagnostics = parsed.diagnostics;
    info!(
        classes = unit.class_count(),
        diagnostics = unit.diagnostics.len(),
        "Unit extracted"
    );
    unit
}
