//! End-to-end pipeline
//!
//! Units are extracted independently and in parallel, joined in input order,
//! resolved once and rendered once:
//! Provider → Engine (per unit) → join → Resolver → Renderer

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use rayon::prelude::*;
use tracing::{info, span, warn, Level};

use crate::core::{Project, RenderConfig, ResolveConfig, SyntaxProvider, TranslationUnit, UmlError};
use crate::extract::extract_unit;
use crate::frontend::TreeSitterProvider;
use crate::render::PlantUmlRenderer;
use crate::resolve::resolve;

/// Outcome of extracting a batch of units
#[derive(Debug, Default)]
pub struct ExtractionReport {
    /// Successfully extracted units, in input order
    pub units: Vec<TranslationUnit>,
    /// Units whose provider failed, in input order
    pub failures: Vec<(PathBuf, UmlError)>,
}

impl ExtractionReport {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Provider plus configuration for every stage after it
pub struct Pipeline<P: SyntaxProvider> {
    provider: P,
    resolve_config: ResolveConfig,
    render_config: RenderConfig,
}

impl Pipeline<TreeSitterProvider> {
    /// Pipeline over the tree-sitter front-end with default configuration
    pub fn treesitter() -> Self {
        Self::new(TreeSitterProvider::new())
    }
}

impl<P: SyntaxProvider> Pipeline<P> {
    pub fn new(provider: P) -> Self {
        Self {
            provider,
            resolve_config: ResolveConfig::default(),
            render_config: RenderConfig::default(),
        }
    }

    pub fn with_resolve_config(mut self, config: ResolveConfig) -> Self {
        self.resolve_config = config;
        self
    }

    pub fn with_render_config(mut self, config: RenderConfig) -> Self {
        self.render_config = config;
        self
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// Extract every unit in parallel
    ///
    /// A failing unit never aborts the others.
    pub fn extract_all(&self, paths: &[PathBuf], flags: &[String]) -> ExtractionReport {
        let extract_span = span!(Level::INFO, "extract_all", units = paths.len());
        let _enter = extract_span.enter();

        let results: Vec<(PathBuf, Result<TranslationUnit, UmlError>)> = paths
            .par_iter()
            .map(|path| (path.clone(), extract_unit(&self.provider, path, flags)))
            .collect();

        let mut report = ExtractionReport::default();
        for (path, result) in results {
            match result {
                Ok(unit) => report.units.push(unit),
                Err(error) => {
                    warn!(path = %path.display(), %error, "Unit extraction failed");
                    report.failures.push((path, error));
                }
            }
        }
        info!(
            extracted = report.units.len(),
            failed = report.failures.len(),
            "Extraction finished"
        );
        report
    }

    pub fn resolve(&self, units: Vec<TranslationUnit>) -> Project {
        resolve(units, &self.resolve_config)
    }

    pub fn render(&self, project: &Project) -> Result<String, UmlError> {
        self.render_config.validate()?;
        Ok(PlantUmlRenderer::with_config(self.render_config.clone()).render_project(project))
    }

    /// Render `project` into `out`
    pub fn write<W: io::Write>(&self, project: &Project, out: &mut W) -> Result<(), UmlError> {
        PlantUmlRenderer::with_config(self.render_config.clone()).write_project(project, out)
    }

    /// Render `project` into a new file at `path`
    ///
    /// The file is only created once the configuration is known to be valid.
    pub fn write_file(&self, project: &Project, path: &Path) -> Result<(), UmlError> {
        self.render_config.validate()?;
        let mut file = fs::File::create(path)?;
        self.write(project, &mut file)
    }

    /// Extract, resolve and render `paths`
    ///
    /// Fails only when configuration is invalid or no unit could be
    /// extracted; individual failures are logged and skipped.
    pub fn run(&self, paths: &[PathBuf], flags: &[String]) -> Result<String, UmlError> {
        self.render_config.validate()?;
        let project = self.run_project(paths, flags)?.0;
        self.render(&project)
    }

    /// Extract and resolve `paths`, returning the project and the failures
    pub fn run_project(
        &self,
        paths: &[PathBuf],
        flags: &[String],
    ) -> Result<(Project, Vec<(PathBuf, UmlError)>), UmlError> {
        let report = self.extract_all(paths, flags);
        if report.units.is_empty() && !report.failures.is_empty() {
            return Err(UmlError::NoUnits);
        }
        Ok((self.resolve(report.units), report.failures))
    }

    /// Extract a single unit
    pub fn extract(&self, path: &Path, flags: &[String]) -> Result<TranslationUnit, UmlError> {
        extract_unit(&self.provider, path, flags)
    }
}
