//! cppuml - Turn C++ class declarations into PlantUML class diagrams
//!
//! Each source file is parsed into a provider-neutral syntax tree, walked by
//! the extraction engine into a per-unit class model, merged across units by
//! canonical identity and rendered as PlantUML text.
//!
//! # Quick Start
//!
//! ```rust
//! use cppuml::extract_source;
//! use cppuml::render::PlantUmlRenderer;
//!
//! let unit = extract_source(
//!     "point.cpp",
//!     "struct Point { double x; double y; double distance() const; };",
//! )
//! .unwrap();
//! let text = PlantUmlRenderer::new().render_unit(&unit);
//! assert!(text.contains("struct Point {"));
//! assert!(text.contains("+ double distance() const"));
//! ```
//!
//! # Advanced Usage
//!
//! For more control, drive the stages yourself:
//!
//! ```rust,no_run
//! use std::path::PathBuf;
//! use cppuml::prelude::*;
//!
//! let pipeline = Pipeline::treesitter()
//!     .with_resolve_config(ResolveConfig::new().with_member_relations(MemberRelationPolicy::Ownership))
//!     .with_render_config(RenderConfig::new().with_title("Shapes").with_namespace_groups(true));
//!
//! let paths = vec![PathBuf::from("src/shape.cpp"), PathBuf::from("src/circle.cpp")];
//! let flags = vec!["-Iinclude".to_string()];
//! let report = pipeline.extract_all(&paths, &flags);
//! let project = pipeline.resolve(report.units);
//! let diagram = pipeline.render(&project).unwrap();
//! ```

pub mod core;
pub mod extract;
pub mod frontend;
pub mod pipeline;
pub mod render;
pub mod resolve;

pub use core::*;

use std::path::{Path, PathBuf};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::core::{
        Access, Class, ClassKind, MemberRelationPolicy, Project, RenderConfig, Renderer,
        ResolveConfig, SyntaxProvider, TranslationUnit, UmlError,
    };
    pub use crate::frontend::TreeSitterProvider;
    pub use crate::pipeline::{ExtractionReport, Pipeline};
    pub use crate::render::PlantUmlRenderer;
}

/// Extract the class model of one source file
///
/// `flags` are compiler-style flags; include directories (`-I`, `-iquote`)
/// are honoured and everything else is ignored.
///
/// # Example
/// ```rust,no_run
/// let unit = cppuml::extract_file("src/widget.cpp", &["-Iinclude".to_string()]).unwrap();
/// for (_, class) in unit.classes() {
///     println!("{}", class.name);
/// }
/// ```
pub fn extract_file(path: impl AsRef<Path>, flags: &[String]) -> Result<TranslationUnit, UmlError> {
    extract::extract_unit(&frontend::TreeSitterProvider::new(), path.as_ref(), flags)
}

/// Extract the class model of in-memory source text
///
/// # Example
/// ```rust
/// let unit = cppuml::extract_source("a.cpp", "class A {}; class B : public A {};").unwrap();
/// assert_eq!(unit.class_count(), 2);
/// ```
pub fn extract_source(name: &str, source: &str) -> Result<TranslationUnit, UmlError> {
    let parsed = frontend::TreeSitterProvider::new().parse_str(Path::new(name), source, &[])?;
    Ok(extract::extract_parsed(parsed))
}

/// Generate a PlantUML diagram for a set of source files
///
/// Units that fail are logged and skipped; the call fails only when every
/// unit failed or the title is invalid.
///
/// # Example
/// ```rust,no_run
/// use std::path::PathBuf;
///
/// let paths = vec![PathBuf::from("a.cpp"), PathBuf::from("b.cpp")];
/// let diagram = cppuml::generate(&paths, &[], "Model").unwrap();
/// std::fs::write("model.puml", diagram).unwrap();
/// ```
pub fn generate(paths: &[PathBuf], flags: &[String], title: &str) -> Result<String, UmlError> {
    pipeline::Pipeline::treesitter()
        .with_render_config(RenderConfig::new().with_title(title))
        .run(paths, flags)
}
